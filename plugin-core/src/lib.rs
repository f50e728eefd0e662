//! The plug-in lifecycle engine: discovery, metadata decoding, dependency resolution,
//! load ordering, activation, and the request router — see `spec.md` / `SPEC_FULL.md`
//! at the workspace root for the full contract.

#[macro_use]
extern crate log;

pub use abi_stable;
pub use log::{debug, error, info, trace, warn};
pub use semver;

pub mod dynlib;
pub mod graph;
pub mod logger;
mod plugin_trait;
pub mod manager;
pub mod record;
pub mod resolver;
pub mod router;
pub mod search;

pub use dynlib::{DynamicLibrary, LibraryError};
pub use graph::{DependencyCycle, DependencyGraph};
pub use manager::{manager, Error, PluginManager, Report, Reporter, HOST_API_VERSION};
pub use plugin_trait::{Plugin, PluginCreate, PluginObject, PluginRef, Plugin_TO, RouterFn};
pub use record::{DepVerdict, PluginRecord, PluginState};
pub use resolver::CheckOutcome;
pub use router::{RequestCode, RouterCode};
