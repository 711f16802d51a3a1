/// Build system error types
use cairn_package::FetchError;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to read manifest at {path}: {error}")]
    ManifestReadError { path: PathBuf, error: String },

    #[error("Invalid manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("Target not found: {target}")]
    TargetNotFound { target: String },

    #[error("Dependency not found: {name} (required by {required_by}): {reason}")]
    DependencyNotFound {
        name: String,
        required_by: String,
        reason: String,
    },

    #[error("Failed to fetch dependency '{name}': {source}")]
    Fetch {
        name: String,
        #[source]
        source: FetchError,
    },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Build engine error: {message}")]
    Engine {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] cairn_config::ConfigError),

    #[error("Lockfile error: {0}")]
    Lockfile(#[from] cairn_package::PackageError),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Create a manifest read error
    pub fn manifest_read(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::ManifestReadError {
            path: path.into(),
            error: error.to_string(),
        }
    }

    /// Create an invalid manifest error
    pub fn invalid_manifest(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a target not found error
    pub fn target_not_found(target: impl Into<String>) -> Self {
        Self::TargetNotFound {
            target: target.into(),
        }
    }

    /// Create a dependency not found error
    pub fn dependency_not_found(
        name: impl Into<String>,
        required_by: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DependencyNotFound {
            name: name.into(),
            required_by: required_by.into(),
            reason: reason.into(),
        }
    }

    /// Create a build engine error
    pub fn engine(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::Engine {
            message: message.into(),
            exit_code,
        }
    }

    /// Whether this error stems from user input or configuration rather than a failing command
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::TargetNotFound { .. }
                | Self::DependencyNotFound { .. }
                | Self::InvalidManifest { .. }
                | Self::Config(_)
        )
    }
}
