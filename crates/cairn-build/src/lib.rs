//! Cairn build orchestration
//!
//! Turns the component manifests of a source tree into build actions for an
//! external make-like engine:
//! - Component model and `component.toml` manifests
//! - Component graph arena and manifest discovery
//! - Dependency resolution with on-demand fetching
//! - Transitive include paths and link libraries
//! - Build engines (in-memory recording, GNU make)
//! - The build session that ties them together

pub mod component;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod graph;
pub mod makefile;
pub mod manifest;
pub mod paths;
mod resolver;
pub mod session;

// Re-export main types
pub use component::{is_conventional_name, Component, ComponentKind};
pub use discovery::{Discovery, DiscoveryReport};
pub use engine::{ActionHandle, BuildAction, BuildEngine, RecordingEngine};
pub use error::{BuildError, BuildResult};
pub use graph::{AlreadyRegistered, ComponentGraph, ComponentId, ComponentState};
pub use makefile::{MakefileEngine, MAKEFILE_NAME};
pub use manifest::{ComponentDecl, ComponentManifest, KindName};
pub use paths::{include_paths, link_plan, LinkLibrary, LinkPlan};
pub use session::{BuildSession, BuildStats, FetchReport, ALL_ALIAS, TESTS_ALIAS};

// Re-export cairn-package types for convenience
pub use cairn_package::{Fetch, FetchOutcome, Fetcher};
