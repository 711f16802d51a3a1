//! Project Configuration (cairn.toml)

use crate::{ConfigError, ConfigResult};
use cairn_package::{DescriptorSpec, DescriptorTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default manifest file name looked for in every directory
pub const DEFAULT_MANIFEST: &str = "component.toml";

/// Project configuration from cairn.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectMetadata>,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Dependency descriptor table
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, DescriptorSpec>,
}

/// Project metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Directory layout, relative to the project root
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct LayoutConfig {
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    #[serde(default = "default_deps_dir")]
    pub deps_dir: PathBuf,

    /// Installed headers live in `<prefix>/include`, libraries in `<prefix>/lib`
    #[serde(default = "default_install_prefix")]
    pub install_prefix: PathBuf,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_deps_dir() -> PathBuf {
    PathBuf::from("deps")
}

fn default_install_prefix() -> PathBuf {
    PathBuf::from("build/install")
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            build_dir: default_build_dir(),
            deps_dir: default_deps_dir(),
            install_prefix: default_install_prefix(),
        }
    }
}

/// Discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Directories skipped during the walk, as exact paths relative to the project root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
}

fn default_manifest() -> String {
    DEFAULT_MANIFEST.to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            ignore: Vec::new(),
        }
    }
}

/// Build engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Make-like program that executes the generated rules
    #[serde(default = "default_engine_program")]
    pub program: String,

    /// Parallel jobs handed to the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

fn default_engine_program() -> String {
    "make".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_engine_program(),
            jobs: None,
        }
    }
}

impl ProjectConfig {
    /// Parse and validate a configuration string
    pub fn parse(content: &str, file: &Path) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: file.to_path_buf(),
            error: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;
        Self::parse(&content, path)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(project) = &self.project {
            if project.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "project.name".to_string(),
                    reason: "name cannot be empty".to_string(),
                });
            }
        }

        if self.discovery.manifest.is_empty() || self.discovery.manifest.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                field: "discovery.manifest".to_string(),
                reason: format!("'{}' must be a plain file name", self.discovery.manifest),
            });
        }

        if self.engine.program.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "engine.program".to_string(),
                reason: "program cannot be empty".to_string(),
            });
        }

        if self.engine.jobs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "engine.jobs".to_string(),
                reason: "jobs must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Validated dependency descriptors
    pub fn descriptors(&self) -> ConfigResult<DescriptorTable> {
        Ok(DescriptorTable::from_specs(&self.dependencies)?)
    }

    pub fn project_name(&self) -> Option<&str> {
        self.project.as_ref().map(|p| p.name.as_str())
    }
}
