use std::path::{Path, PathBuf};
use std::sync::Mutex;

use indexmap::{IndexMap, IndexSet};
use konst::primitive::parse_u64;
use konst::unwrap_ctx;
use once_cell::sync::Lazy;
use plugin_defs::{is_valid_identifier, version_compatible, Outcome, PluginMetadata};
use semver::Version;

use crate::dynlib::DynamicLibrary;
use crate::graph::DependencyGraph;
use crate::logger::{self, LogSinkConfig};
use crate::plugin_trait::{PluginCreate, PluginRef};
use crate::record::{DepVerdict, PluginRecord, PluginState};
use crate::resolver::{self, CheckOutcome};
use crate::router::route_to_manager;
use crate::search;

/// The host's expected plug-in API version, derived from this crate's own version —
/// the same `konst`-based trick the teacher uses for `plugin-base::API_VERSION`.
pub const HOST_API_VERSION: Version = Version::new(
    unwrap_ctx!(parse_u64(env!("CARGO_PKG_VERSION_MAJOR"))),
    unwrap_ctx!(parse_u64(env!("CARGO_PKG_VERSION_MINOR"))),
    unwrap_ctx!(parse_u64(env!("CARGO_PKG_VERSION_PATCH"))),
);

/// Faults that are reported to the caller's callback rather than aborting the call
/// (spec.md §4.7 "Reported, then skipped").
#[derive(Debug)]
pub enum Report {
    NameAlreadyExists { path: PathBuf },
    InvalidName { path: PathBuf, name: String },
    CannotParseMetadata { path: PathBuf, detail: String },
    ListFilesError { dir: PathBuf, detail: String },
    DependencyNotFound { path: PathBuf, missing: String },
    DependencyBadVersion { path: PathBuf, dependency: String },
    UnloadFailed { name: String, detail: String },
}

pub type Reporter<'a> = dyn FnMut(Report) + 'a;

static MANAGER: Lazy<Mutex<PluginManager>> = Lazy::new(|| Mutex::new(PluginManager::new()));

/// The process-wide accessor (spec.md §4.6 "exactly one manager exists per host
/// process"). A host that wants an owned, non-singleton instance can construct
/// `PluginManager::new()` directly instead — the only hard requirement is single-writer
/// discipline (spec.md Design Notes).
pub fn manager() -> &'static Mutex<PluginManager> {
    &MANAGER
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("plugin '{0}' not found")]
    NotFound(String),
}

pub struct PluginManager {
    registry: IndexMap<String, PluginRecord>,
    load_order: Vec<String>,
    locations: IndexSet<PathBuf>,
    log_sink: LogSinkConfig,
    main_plugin: Option<String>,
    app_directory: PathBuf,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            registry: IndexMap::new(),
            load_order: Vec::new(),
            locations: IndexSet::new(),
            log_sink: LogSinkConfig::default(),
            main_plugin: None,
            app_directory: std::env::current_dir().unwrap_or_default(),
        }
    }

    pub fn host_api_version(&self) -> Version {
        HOST_API_VERSION
    }

    pub fn app_directory(&self) -> &Path {
        &self.app_directory
    }

    pub fn set_app_directory(&mut self, dir: impl Into<PathBuf>) {
        self.app_directory = dir.into();
    }

    pub fn set_log_sink(&mut self, config: LogSinkConfig) {
        self.log_sink = config;
    }

    pub fn register_main_plugin(&mut self, name: impl Into<String>) {
        self.main_plugin = Some(name.into());
    }

    // ---- Phase 1: search -------------------------------------------------------

    /// Idempotent and cumulative: may be called repeatedly for different roots
    /// (spec.md §2, §4.6).
    pub fn search(&mut self, dir: &Path, recursive: bool, reporter: &mut Reporter) -> Outcome {
        let (candidates, walk_err) = search::find_candidates(dir, recursive);

        let mut installed_any = false;
        for path in candidates {
            if self.try_install(&path, reporter) {
                installed_any = true;
            }
        }

        if let Some(err) = walk_err {
            reporter(Report::ListFilesError {
                dir: dir.to_path_buf(),
                detail: err.to_string(),
            });
            if !installed_any {
                return Outcome::ListFilesError;
            }
        }

        if installed_any {
            self.locations.insert(dir.to_path_buf());
            Outcome::Success
        } else {
            Outcome::NothingFound
        }
    }

    /// Loads `path`, checks for the three required exports, decodes metadata, and
    /// installs a record. Returns whether a record was installed.
    fn try_install(&mut self, path: &Path, reporter: &mut Reporter) -> bool {
        let mut library = DynamicLibrary::new();
        if library.load(path).is_err() {
            return false;
        }
        if !library.has_symbol("name")
            || !library.has_symbol("metadata")
            || !library.has_symbol("createPlugin")
        {
            // Silently skipped: not a plug-in (spec.md §4.7).
            return false;
        }

        let name = match unsafe { read_c_bytes(&library, "name") } {
            Some(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => s.to_string(),
                Err(_) => return false,
            },
            None => return false,
        };

        // spec.md §3/§8 invariant 2: the registry key is unique and an ASCII identifier.
        // The exported `name` symbol is what actually keys the registry, so it — not just
        // the JSON `name` field decoded below — must satisfy that grammar.
        if !is_valid_identifier(&name) {
            reporter(Report::InvalidName {
                path: path.to_path_buf(),
                name,
            });
            return false;
        }

        if self.registry.contains_key(&name) {
            reporter(Report::NameAlreadyExists { path: path.to_path_buf() });
            return false;
        }

        let metadata_bytes = match unsafe { read_c_bytes(&library, "metadata") } {
            Some(bytes) => bytes.to_vec(),
            None => return false,
        };

        let info = match PluginMetadata::decode(&metadata_bytes, &HOST_API_VERSION) {
            Ok(info) => info,
            Err(e) => {
                reporter(Report::CannotParseMetadata {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                });
                return false;
            }
        };

        // spec.md §6 schema: the JSON `name` field is required to equal the exported
        // `name` symbol.
        if info.name != name {
            reporter(Report::InvalidName {
                path: path.to_path_buf(),
                name: info.name,
            });
            return false;
        }

        self.registry
            .insert(name.clone(), PluginRecord::new(name, path.to_path_buf(), library, info));
        true
    }

    // ---- Phase 2: load ----------------------------------------------------------

    /// Re-entrant: a second call repeats the resolver pass, the graph build, the sort,
    /// and activation — records already activated keep their instances (spec.md §4.6).
    pub fn load(&mut self, try_to_continue: bool, reporter: &mut Reporter) -> Outcome {
        for record in self.registry.values_mut() {
            record.reset_for_new_load_pass();
        }

        let names: Vec<String> = self.registry.keys().cloned().collect();
        for name in &names {
            if self.registry[name].dep_verdict != DepVerdict::Unknown {
                continue;
            }
            match resolver::check(name, &mut self.registry) {
                CheckOutcome::Success => {}
                CheckOutcome::NotFound { path, missing } => {
                    reporter(Report::DependencyNotFound { path, missing });
                    if !try_to_continue {
                        return Outcome::DependencyNotFound;
                    }
                }
                CheckOutcome::BadVersion { path, dependency } => {
                    reporter(Report::DependencyBadVersion { path, dependency });
                    if !try_to_continue {
                        return Outcome::DependencyBadVersion;
                    }
                }
            }
        }

        for (name, record) in self.registry.iter_mut() {
            record.state = if record.dep_verdict == DepVerdict::Yes {
                PluginState::DepsChecked { satisfied: true }
            } else {
                PluginState::DepsChecked { satisfied: false }
            };
            let _ = name;
        }

        let graph = DependencyGraph::build(&mut self.registry);
        let order = match graph.topological_sort() {
            Ok(order) => order,
            Err(_) => return Outcome::DependencyCycle,
        };

        for name in &order {
            self.activate(name);
        }
        self.load_order = order;

        if let Some(main_name) = self.main_plugin.clone() {
            if let Some(record) = self.registry.get(&main_name) {
                if let Some(instance) = &record.instance {
                    instance.main_plugin_exec();
                }
            }
        }

        Outcome::Success
    }

    fn activate(&mut self, name: &str) {
        if self.registry[name].instance.is_some() {
            return; // already activated; `loaded()` runs exactly once per plug-in.
        }

        let dep_names = self.registry[name].info.dependencies.clone();
        let mut dep_instances: Vec<PluginRef<'static>> = Vec::with_capacity(dep_names.len());
        for dep in &dep_names {
            let Some(dep_record) = self.registry.get(&dep.name) else {
                return;
            };
            let Some(instance) = &dep_record.instance else {
                return;
            };
            dep_instances.push(crate::plugin_trait::reborrow(instance));
        }

        let create = unsafe { self.registry[name].library.get::<PluginCreate>("createPlugin") };
        let Ok(create) = create else {
            return;
        };

        let instance_ptr = unsafe {
            create(route_to_manager, dep_instances.as_ptr(), dep_instances.len())
        };
        if instance_ptr.is_null() {
            return;
        }
        let instance = unsafe { Box::from_raw(instance_ptr) };
        instance.loaded();

        let record = self.registry.get_mut(name).unwrap();
        record.instance = Some(instance);
        record.state = PluginState::Activated;
    }

    // ---- Phase 3: unload ----------------------------------------------------------

    /// Terminal: walks the last load order in reverse, then drains any record never
    /// included in it (spec.md §4.6).
    pub fn unload(&mut self, reporter: &mut Reporter) -> Outcome {
        let mut all_clean = true;

        let mut ordered: Vec<String> = self.load_order.drain(..).collect();
        ordered.reverse();
        let mut remaining: Vec<String> = self
            .registry
            .keys()
            .filter(|n| !ordered.contains(n))
            .cloned()
            .collect();
        ordered.append(&mut remaining);

        for name in ordered {
            if let Some(mut record) = self.registry.swap_remove(&name) {
                if let Some(instance) = record.instance.take() {
                    instance.about_to_be_unloaded();
                    drop(instance);
                }
                match record.library.unload() {
                    Ok(_) => {}
                    Err(e) => {
                        all_clean = false;
                        reporter(Report::UnloadFailed {
                            name,
                            detail: e.to_string(),
                        });
                    }
                }
            }
        }

        self.locations.clear();

        if all_clean {
            Outcome::Success
        } else {
            Outcome::UnloadNotAll
        }
    }

    // ---- Introspection ------------------------------------------------------------

    pub fn count(&self) -> usize {
        self.registry.len()
    }

    pub fn list(&self) -> Vec<String> {
        self.registry.keys().cloned().collect()
    }

    pub fn locations(&self) -> Vec<PathBuf> {
        self.locations.iter().cloned().collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    pub fn has_version(&self, name: &str, min_version: &Version) -> bool {
        self.registry
            .get(name)
            .is_some_and(|r| version_compatible(&r.info.version, min_version))
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.registry.get(name).is_some_and(PluginRecord::is_loaded)
    }

    pub fn info(&self, name: &str) -> Option<PluginMetadata> {
        self.registry.get(name).map(|r| r.info.clone())
    }

    /// A typed, non-owning handle to `name`'s activated instance, or `None` if it isn't
    /// registered or hasn't been activated yet (spec.md §4.6 `pluginObject(name)`).
    pub fn plugin_object(&self, name: &str) -> Option<PluginRef<'_>> {
        self.registry
            .get(name)?
            .instance
            .as_deref()
            .map(|instance| instance.reborrow())
    }

    pub fn log_sink(&self) -> &LogSinkConfig {
        &self.log_sink
    }

    pub fn log_callback(&self) -> Option<logger::LogCallback> {
        logger::callback_for(&self.log_sink)
    }
}

/// Reads a C-style null-terminated byte string out of a static `&'static [u8]` symbol.
unsafe fn read_c_bytes<'a>(library: &'a DynamicLibrary, symbol: &str) -> Option<&'a [u8]> {
    let sym = library.get::<&'a [u8]>(symbol).ok()?;
    let bytes: &[u8] = *sym;
    let nul = bytes.iter().position(|&b| b == 0)?;
    Some(&bytes[..nul])
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugin_defs::DependencySpec;

    /// Builds a record with a never-loaded `DynamicLibrary`: enough to exercise the
    /// resolver/graph/reporting phases of `load`/`unload` without a real `dlopen` (the
    /// same in-memory-fixture approach `resolver.rs` and `graph.rs` already use).
    /// Activation itself is a no-op against it — `activate` bails out as soon as it fails
    /// to resolve `createPlugin` — so these tests exercise ordering and fault reporting,
    /// not instance construction.
    fn record(name: &str, deps: &[(&str, Version)]) -> PluginRecord {
        let info = PluginMetadata {
            api: HOST_API_VERSION,
            name: name.to_string(),
            pretty_name: name.to_string(),
            version: Version::new(1, 0, 0),
            author: String::new(),
            url: String::new(),
            license: String::new(),
            copyright: String::new(),
            dependencies: deps
                .iter()
                .map(|(n, v)| DependencySpec {
                    name: n.to_string(),
                    version: v.clone(),
                })
                .collect(),
        };
        PluginRecord::new(
            name.to_string(),
            format!("/plugins/{name}.so").into(),
            DynamicLibrary::new(),
            info,
        )
    }

    fn manager_with(records: Vec<PluginRecord>) -> PluginManager {
        let mut mgr = PluginManager::new();
        for r in records {
            mgr.registry.insert(r.name.clone(), r);
        }
        mgr
    }

    #[test]
    fn linear_chain_loads_in_dependency_order() {
        let mut mgr = manager_with(vec![
            record("a", &[]),
            record("b", &[("a", Version::new(1, 0, 0))]),
            record("c", &[("b", Version::new(1, 0, 0))]),
        ]);
        let mut reports = Vec::new();
        let mut reporter = |r: Report| reports.push(r);
        let outcome = mgr.load(true, &mut reporter);
        assert_eq!(outcome, Outcome::Success);
        assert!(reports.is_empty());
        assert_eq!(mgr.load_order, vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_respects_partial_order() {
        let mut mgr = manager_with(vec![
            record("a", &[]),
            record("b", &[("a", Version::new(1, 0, 0))]),
            record("c", &[("a", Version::new(1, 0, 0))]),
            record(
                "d",
                &[("b", Version::new(1, 0, 0)), ("c", Version::new(1, 0, 0))],
            ),
        ]);
        let mut reporter = |_: Report| {};
        let outcome = mgr.load(true, &mut reporter);
        assert_eq!(outcome, Outcome::Success);
        let pos = |n: &str| mgr.load_order.iter().position(|x| x == n).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn missing_dependency_aborts_when_not_continuing() {
        let mut mgr = manager_with(vec![record("x", &[("y", Version::new(1, 0, 0))])]);
        let mut reports = Vec::new();
        let mut reporter = |r: Report| reports.push(r);
        let outcome = mgr.load(false, &mut reporter);
        assert_eq!(outcome, Outcome::DependencyNotFound);
        assert!(matches!(reports.as_slice(), [Report::DependencyNotFound { .. }]));
        assert!(mgr.load_order.is_empty());
    }

    #[test]
    fn missing_dependency_continues_when_requested() {
        let mut mgr = manager_with(vec![
            record("a", &[]),
            record("x", &[("y", Version::new(1, 0, 0))]),
        ]);
        let mut reports = Vec::new();
        let mut reporter = |r: Report| reports.push(r);
        let outcome = mgr.load(true, &mut reporter);
        assert_eq!(outcome, Outcome::Success);
        assert!(matches!(reports.as_slice(), [Report::DependencyNotFound { .. }]));
        assert_eq!(mgr.load_order, vec!["a"]);
    }

    #[test]
    fn memoized_bad_version_is_recovered_on_revisit() {
        // "a" fails on its own dependency "b" (BadVersion). "c" depends on "a" with a
        // version that IS compatible with a's declared version, so checking "c" recurses
        // into a's already-memoized failure. The recovered outcome must still name "b",
        // not collapse to a generic NotFound against "a" itself.
        let mut mgr = manager_with(vec![
            record("b", &[]),
            record("a", &[("b", Version::new(2, 0, 0))]),
            record("c", &[("a", Version::new(1, 0, 0))]),
        ]);
        let mut reports = Vec::new();
        let mut reporter = |r: Report| reports.push(r);
        let outcome = mgr.load(true, &mut reporter);
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(reports.len(), 2);
        for report in &reports {
            match report {
                Report::DependencyBadVersion { dependency, .. } => assert_eq!(dependency, "b"),
                other => panic!("unexpected report: {other:?}"),
            }
        }
    }

    #[test]
    fn cycle_is_detected_and_aborts_load() {
        let mut mgr = manager_with(vec![
            record("a", &[("b", Version::new(1, 0, 0))]),
            record("b", &[("a", Version::new(1, 0, 0))]),
        ]);
        let mut reporter = |_: Report| {};
        let outcome = mgr.load(true, &mut reporter);
        assert_eq!(outcome, Outcome::DependencyCycle);
    }

    #[test]
    fn unload_tears_down_in_reverse_load_order() {
        let mut mgr = manager_with(vec![
            record("a", &[]),
            record("b", &[("a", Version::new(1, 0, 0))]),
        ]);
        let mut reporter = |_: Report| {};
        assert_eq!(mgr.load(true, &mut reporter), Outcome::Success);
        assert_eq!(mgr.load_order, vec!["a", "b"]);

        let mut reports = Vec::new();
        let mut reporter = |r: Report| reports.push(r);
        let outcome = mgr.unload(&mut reporter);
        assert_eq!(outcome, Outcome::Success);
        assert!(reports.is_empty());
        assert_eq!(mgr.count(), 0);
    }

    #[test]
    fn reentrant_load_reevaluates_unactivated_records() {
        let mut mgr = manager_with(vec![record("x", &[("y", Version::new(1, 0, 0))])]);
        let mut reporter = |_: Report| {};
        assert_eq!(mgr.load(true, &mut reporter), Outcome::Success);
        assert!(mgr.load_order.is_empty());

        mgr.registry.insert("y".to_string(), record("y", &[]));
        let outcome = mgr.load(true, &mut reporter);
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(mgr.load_order, vec!["y", "x"]);
    }
}
