//! Cairn Configuration System
//!
//! Loads the project configuration (`cairn.toml`) that sits at the root of a
//! multi-component source tree:
//! - Layout: where build directories, fetched dependencies and the install
//!   prefix live
//! - Discovery: manifest file name and ignored directories
//! - Engine: which make-like program runs the generated rules
//! - The dependency descriptor table
//!
//! # Configuration Hierarchy
//!
//! Later sources override earlier ones:
//! 1. Project config (`cairn.toml`, found by walking up from the start directory)
//! 2. Environment variables (`CAIRN_*`)
//! 3. CLI flags (handled by the caller)
//!
//! # Example
//!
//! ```no_run
//! use cairn_config::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::new().load_from_directory(Path::new(".")).unwrap();
//! println!("building into {}", config.layout.build_dir.display());
//! ```

pub mod layout;
pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid dependency table: {0}")]
    Descriptor(#[from] cairn_package::PackageError),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// File name of the project configuration
pub const CONFIG_FILE_NAME: &str = "cairn.toml";

pub use layout::Layout;
pub use loader::{Config, ConfigLoader};
pub use project::{DiscoveryConfig, EngineConfig, LayoutConfig, ProjectConfig};
