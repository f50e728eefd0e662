use std::collections::HashSet;

use indexmap::IndexMap;
use plugin_defs::version_compatible;

use crate::record::{DepVerdict, PluginRecord};

/// Outcome of a single `check` call (spec.md §4.3). `NotFound`/`BadVersion` carry the
/// record's own path, matching the C original's "carrying the record's path" detail.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CheckOutcome {
    Success,
    NotFound {
        path: std::path::PathBuf,
        missing: String,
    },
    BadVersion {
        path: std::path::PathBuf,
        dependency: String,
    },
}

/// Walks the dependency graph of `name`, memoizing each visited record's `dep_verdict`.
///
/// A name already on the current call stack (a cyclic back-reference) is treated as
/// satisfied for the purposes of *this* edge — the resolver does not detect cycles,
/// that is the job of `DependencyGraph`'s topological sort (spec.md §4.3, §4.4). The
/// `visiting` set is what makes that "treat cycles as satisfied" behavior terminate
/// instead of recursing forever: it is local to one top-level `check` call and is never
/// persisted on the record.
pub fn check(name: &str, registry: &mut IndexMap<String, PluginRecord>) -> CheckOutcome {
    let mut visiting = HashSet::new();
    check_inner(name, registry, &mut visiting)
}

fn check_inner(
    name: &str,
    registry: &mut IndexMap<String, PluginRecord>,
    visiting: &mut HashSet<String>,
) -> CheckOutcome {
    if visiting.contains(name) {
        return CheckOutcome::Success;
    }

    match registry.get(name).map(|r| r.dep_verdict) {
        Some(DepVerdict::Yes) => return CheckOutcome::Success,
        Some(DepVerdict::No) => {
            // Re-derive rather than default to NotFound: a memoized No can equally have
            // come from a BadVersion failure further down this same record's own
            // dependency list, and the caller needs the real cause to pick the right
            // Outcome (spec.md §6, §8 scenario 4).
            return registry[name].dep_failure.clone().unwrap_or_else(|| {
                let path = registry[name].path.clone();
                CheckOutcome::NotFound {
                    path,
                    missing: name.to_string(),
                }
            });
        }
        Some(DepVerdict::Unknown) => {}
        None => {
            return CheckOutcome::NotFound {
                path: std::path::PathBuf::new(),
                missing: name.to_string(),
            }
        }
    }

    visiting.insert(name.to_string());

    let deps = registry[name].info.dependencies.clone();
    let own_path = registry[name].path.clone();

    for dep in &deps {
        let Some(dep_record) = registry.get(&dep.name) else {
            let outcome = CheckOutcome::NotFound {
                path: own_path,
                missing: dep.name.clone(),
            };
            registry[name].dep_verdict = DepVerdict::No;
            registry[name].dep_failure = Some(outcome.clone());
            visiting.remove(name);
            return outcome;
        };

        if !version_compatible(&dep_record.info.version, &dep.version) {
            let outcome = CheckOutcome::BadVersion {
                path: own_path,
                dependency: dep.name.clone(),
            };
            registry[name].dep_verdict = DepVerdict::No;
            registry[name].dep_failure = Some(outcome.clone());
            visiting.remove(name);
            return outcome;
        }

        let outcome = check_inner(&dep.name, registry, visiting);
        if outcome != CheckOutcome::Success {
            registry[name].dep_verdict = DepVerdict::No;
            registry[name].dep_failure = Some(outcome.clone());
            visiting.remove(name);
            return outcome;
        }
    }

    registry[name].dep_verdict = DepVerdict::Yes;
    visiting.remove(name);
    CheckOutcome::Success
}
