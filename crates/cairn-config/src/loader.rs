//! Configuration Loader
//!
//! Finds `cairn.toml`, applies `CAIRN_*` environment overrides and resolves
//! the layout against the project root.

use crate::layout::Layout;
use crate::project::ProjectConfig;
use crate::{ConfigError, ConfigResult, CONFIG_FILE_NAME};
use cairn_package::DescriptorTable;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Skip `CAIRN_*` overrides
    ignore_env: bool,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub layout: Layout,
    pub descriptors: DescriptorTable,
    /// The cairn.toml that was loaded, if any
    pub config_file: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not apply environment variable overrides
    pub fn without_env(mut self) -> Self {
        self.ignore_env = true;
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to the first cairn.toml; that directory is
    /// the project root. Without one, `start_dir` is the root and defaults apply.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        match Self::find_config_file(start_dir) {
            Some(path) => self.load_from_file(&path),
            None => {
                debug!(start = %start_dir.display(), "no {} found, using defaults", CONFIG_FILE_NAME);
                self.finish(ProjectConfig::default(), start_dir.to_path_buf(), None)
            }
        }
    }

    /// Load configuration from a specific cairn.toml
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let project = ProjectConfig::load_from_file(config_path)?;
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| ConfigError::NotFound(config_path.to_path_buf()))?;
        debug!(file = %config_path.display(), "loaded project configuration");
        self.finish(project, root, Some(config_path.to_path_buf()))
    }

    /// Walk up from `start_dir` looking for cairn.toml
    pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
        start_dir
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    fn finish(
        &self,
        project: ProjectConfig,
        root: PathBuf,
        config_file: Option<PathBuf>,
    ) -> ConfigResult<Config> {
        let project = if self.ignore_env {
            project
        } else {
            Self::apply_env_overrides(project)?
        };
        project.validate()?;

        let layout = Layout::new(root, &project.layout);
        let descriptors = project.descriptors()?;

        Ok(Config {
            project,
            layout,
            descriptors,
            config_file,
        })
    }

    /// Apply `CAIRN_*` environment overrides
    fn apply_env_overrides(mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Ok(dir) = env::var("CAIRN_BUILD_DIR") {
            config.layout.build_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("CAIRN_DEPS_DIR") {
            config.layout.deps_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = env::var("CAIRN_INSTALL_PREFIX") {
            config.layout.install_prefix = PathBuf::from(prefix);
        }
        if let Ok(program) = env::var("CAIRN_ENGINE") {
            config.engine.program = program;
        }
        if let Ok(jobs) = env::var("CAIRN_JOBS") {
            let jobs = jobs.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                field: "CAIRN_JOBS".to_string(),
                reason: format!("'{}' is not a number", jobs),
            })?;
            config.engine.jobs = Some(jobs);
        }
        Ok(config)
    }
}

impl Config {
    pub fn project_root(&self) -> &Path {
        &self.layout.project_root
    }

    pub fn project_name(&self) -> Option<&str> {
        self.project.project_name()
    }

    /// Whether a cairn.toml was found
    pub fn is_project(&self) -> bool {
        self.config_file.is_some()
    }
}
