use indexmap::IndexMap;

use crate::record::{DepVerdict, PluginRecord};

#[derive(Copy, Clone, Eq, PartialEq)]
enum Mark {
    Unmarked,
    Temporary,
    Permanent,
}

/// A directed graph over plug-ins with `depVerdict == Yes`: one node per plug-in, one
/// edge per declared dependency, pointing from the dependency to its dependant
/// (spec.md §4.4).
pub struct DependencyGraph {
    /// Insertion order is the node's `graphId`.
    nodes: Vec<String>,
    /// `edges[i]` holds the dependencies (parents) of node `i`, as node indices.
    edges: Vec<Vec<usize>>,
}

#[derive(Debug, Eq, PartialEq)]
pub struct DependencyCycle;

impl DependencyGraph {
    /// Builds the graph and assigns each included record a fresh `graph_id`.
    pub fn build(registry: &mut IndexMap<String, PluginRecord>) -> Self {
        let mut nodes = Vec::new();
        let mut index_of = std::collections::HashMap::new();

        for (name, record) in registry.iter() {
            if record.dep_verdict == DepVerdict::Yes {
                index_of.insert(name.clone(), nodes.len());
                nodes.push(name.clone());
            }
        }

        let mut edges = vec![Vec::new(); nodes.len()];
        for (i, name) in nodes.iter().enumerate() {
            for dep in &registry[name].info.dependencies {
                if let Some(&dep_idx) = index_of.get(&dep.name) {
                    edges[i].push(dep_idx);
                }
            }
        }

        for (name, &idx) in &index_of {
            registry[name].graph_id = Some(idx);
        }

        Self { nodes, edges }
    }

    /// Depth-first post-order traversal with three-color marking (spec.md §4.4).
    /// Returns a valid load order, or `DependencyCycle` on the first back-edge found.
    pub fn topological_sort(&self) -> Result<Vec<String>, DependencyCycle> {
        let mut marks = vec![Mark::Unmarked; self.nodes.len()];
        let mut output = Vec::with_capacity(self.nodes.len());

        for start in 0..self.nodes.len() {
            if marks[start] == Mark::Unmarked {
                self.visit(start, &mut marks, &mut output)?;
            }
        }

        Ok(output)
    }

    fn visit(
        &self,
        n: usize,
        marks: &mut [Mark],
        output: &mut Vec<String>,
    ) -> Result<(), DependencyCycle> {
        match marks[n] {
            Mark::Permanent => return Ok(()),
            Mark::Temporary => return Err(DependencyCycle),
            Mark::Unmarked => {}
        }

        marks[n] = Mark::Temporary;
        for &parent in &self.edges[n] {
            self.visit(parent, marks, output)?;
        }
        marks[n] = Mark::Permanent;
        output.push(self.nodes[n].clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynlib::DynamicLibrary;
    use plugin_defs::{DependencySpec, PluginMetadata};
    use semver::Version;

    fn meta(name: &str, deps: &[&str]) -> PluginMetadata {
        PluginMetadata {
            api: Version::new(1, 0, 0),
            name: name.to_string(),
            pretty_name: name.to_string(),
            version: Version::new(1, 0, 0),
            author: String::new(),
            url: String::new(),
            license: String::new(),
            copyright: String::new(),
            dependencies: deps
                .iter()
                .map(|d| DependencySpec {
                    name: d.to_string(),
                    version: Version::new(1, 0, 0),
                })
                .collect(),
        }
    }

    fn yes_record(name: &str, deps: &[&str]) -> PluginRecord {
        let mut record = PluginRecord::new(
            name.to_string(),
            format!("/plugins/{name}.so").into(),
            DynamicLibrary::new(),
            meta(name, deps),
        );
        record.dep_verdict = DepVerdict::Yes;
        record
    }

    #[test]
    fn linear_chain_orders_dependencies_first() {
        let mut registry = IndexMap::new();
        registry.insert("a".to_string(), yes_record("a", &[]));
        registry.insert("b".to_string(), yes_record("b", &["a"]));
        registry.insert("c".to_string(), yes_record("c", &["b"]));

        let graph = DependencyGraph::build(&mut registry);
        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_respects_partial_order() {
        let mut registry = IndexMap::new();
        registry.insert("a".to_string(), yes_record("a", &[]));
        registry.insert("b".to_string(), yes_record("b", &["a"]));
        registry.insert("c".to_string(), yes_record("c", &["a"]));
        registry.insert("d".to_string(), yes_record("d", &["b", "c"]));

        let graph = DependencyGraph::build(&mut registry);
        let order = graph.topological_sort().unwrap();
        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn direct_cycle_is_detected() {
        let mut registry = IndexMap::new();
        registry.insert("a".to_string(), yes_record("a", &["b"]));
        registry.insert("b".to_string(), yes_record("b", &["a"]));

        let graph = DependencyGraph::build(&mut registry);
        assert_eq!(graph.topological_sort(), Err(DependencyCycle));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut registry = IndexMap::new();
        registry.insert("a".to_string(), yes_record("a", &["a"]));

        let graph = DependencyGraph::build(&mut registry);
        assert_eq!(graph.topological_sort(), Err(DependencyCycle));
    }
}
