use std::path::PathBuf;

use plugin_defs::PluginMetadata;

use crate::dynlib::DynamicLibrary;
use crate::plugin_trait::PluginObject;
use crate::resolver::CheckOutcome;

/// Three-valued dependency verdict (spec.md §3, §4.3, Design Notes).
///
/// `Unknown` is the signal to perform the resolver check on first visit; it must be
/// reset before every new `load` pass so re-entrant `load` calls re-evaluate faults.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DepVerdict {
    Unknown,
    Yes,
    No,
}

/// Per-plug-in lifecycle state (spec.md §4.6 "State machine per plug-in").
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PluginState {
    Discovered,
    DepsChecked { satisfied: bool },
    Activated,
    UnloadPending,
}

/// One discovered candidate, owned exclusively by the manager (spec.md §3).
pub struct PluginRecord {
    pub name: String,
    pub path: PathBuf,
    pub library: DynamicLibrary,
    pub info: PluginMetadata,
    pub instance: Option<Box<PluginObject>>,
    pub dep_verdict: DepVerdict,
    /// The outcome that produced `dep_verdict == No`, kept so a memoized re-visit can
    /// report the *original* failure (NotFound vs. BadVersion) instead of reducing every
    /// re-visit to a generic "not found" (spec.md §6 outcome codes, §8 scenario 4).
    pub dep_failure: Option<CheckOutcome>,
    /// `None` corresponds to the spec's `graphId = -1` ("not included").
    pub graph_id: Option<usize>,
    pub state: PluginState,
}

impl PluginRecord {
    pub fn new(name: String, path: PathBuf, library: DynamicLibrary, info: PluginMetadata) -> Self {
        Self {
            name,
            path,
            library,
            info,
            instance: None,
            dep_verdict: DepVerdict::Unknown,
            dep_failure: None,
            graph_id: None,
            state: PluginState::Discovered,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.library.loaded() && self.instance.is_some()
    }

    pub fn reset_for_new_load_pass(&mut self) {
        self.graph_id = None;
        if self.instance.is_none() {
            self.dep_verdict = DepVerdict::Unknown;
            self.dep_failure = None;
            self.state = PluginState::Discovered;
        }
    }
}
