//! Cairn dependency handling
//!
//! Everything cairn needs to materialize external dependencies:
//! - Dependency descriptors from the `[dependencies]` table of `cairn.toml`
//! - The fetcher, which turns a descriptor into clone/download/install commands
//! - The subprocess runner capability those commands go through
//! - The fetch lockfile (`cairn.lock`)

pub mod descriptor;
pub mod fetcher;
pub mod lockfile;
pub mod runner;

pub use descriptor::{
    DependencyDescriptor, DescriptorSpec, DescriptorTable, FetchSource, GitReference,
    PackageManager,
};
pub use fetcher::{Fetch, FetchOutcome, Fetcher};
pub use lockfile::{FetchLock, LockedDependency, LOCKFILE_NAME};
pub use runner::{CommandOutput, CommandRunner, ShellCommand, SystemRunner};

use std::path::PathBuf;

/// Descriptor and lockfile errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Failed to parse: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid descriptor for dependency '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PackageError>;

/// Errors raised while fetching a dependency or running one of its commands
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("command `{command}` failed with exit code {exit_code}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("post-fetch command `{command}` failed with exit code {exit_code}")]
    HookFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("failed to run `{command}`: {error}")]
    Spawn { command: String, error: String },

    #[error("I/O error at {path}: {error}")]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },
}

impl FetchError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            error,
        }
    }

    /// Exit code of the failing command, if a command ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_code, .. } | Self::HookFailed { exit_code, .. } => {
                Some(*exit_code)
            }
            Self::Spawn { .. } | Self::Io { .. } => None,
        }
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
