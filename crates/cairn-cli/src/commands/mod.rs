pub mod build;
pub mod fetch;
pub mod list;
pub mod plan;

use anyhow::{Context, Result};
use cairn_build::BuildSession;
use cairn_config::{Config, ConfigLoader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load cairn.toml starting from `dir` (or the current directory)
pub fn load_config(dir: Option<&Path>) -> Result<Config> {
    let start = match dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let config = ConfigLoader::new()
        .load_from_directory(&start)
        .with_context(|| format!("Failed to load configuration from {}", start.display()))?;
    debug!(
        root = %config.project_root().display(),
        project = config.project_name().unwrap_or("<unnamed>"),
        "loaded configuration"
    );
    Ok(config)
}

/// Open a session and discover the project
pub fn open_session(config: &Config) -> Result<BuildSession> {
    BuildSession::open(config).with_context(|| {
        format!(
            "Failed to discover components under {}",
            config.project_root().display()
        )
    })
}

/// Path shown to the user: relative to the project root when possible
pub fn shown(config: &Config, path: &Path) -> String {
    config
        .layout
        .relative_to_root(path)
        .filter(|rel| !rel.is_empty())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn shown_all(config: &Config, paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| shown(config, p)).collect()
}
