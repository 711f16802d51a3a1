//! Absolute project layout

use crate::project::LayoutConfig;
use std::path::{Path, PathBuf};

/// Every directory cairn reads from or writes to, resolved against the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub project_root: PathBuf,
    /// Per-component build directories live under here
    pub build_dir: PathBuf,
    /// Fetched dependencies land at `<deps_dir>/<name>`
    pub deps_dir: PathBuf,
    pub install_prefix: PathBuf,
    /// Installed headers root
    pub include_dir: PathBuf,
    /// Installed libraries root
    pub lib_dir: PathBuf,
}

impl Layout {
    pub fn new(project_root: impl Into<PathBuf>, config: &LayoutConfig) -> Self {
        let project_root = project_root.into();
        let resolve = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                project_root.join(path)
            }
        };
        let install_prefix = resolve(&config.install_prefix);

        Self {
            build_dir: resolve(&config.build_dir),
            deps_dir: resolve(&config.deps_dir),
            include_dir: install_prefix.join("include"),
            lib_dir: install_prefix.join("lib"),
            install_prefix,
            project_root,
        }
    }

    /// Layout with default directory names
    pub fn with_defaults(project_root: impl Into<PathBuf>) -> Self {
        Self::new(project_root, &LayoutConfig::default())
    }

    /// Build directory of one component
    pub fn component_build_dir(&self, component: &str) -> PathBuf {
        self.build_dir.join(component)
    }

    /// Checkout directory of one fetched dependency
    pub fn dependency_dir(&self, dependency: &str) -> PathBuf {
        self.deps_dir.join(dependency)
    }

    /// Path relative to the project root, with `/` separators
    pub fn relative_to_root(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.project_root).ok()?;
        Some(
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = Layout::with_defaults("/work/proj");
        assert_eq!(layout.build_dir, PathBuf::from("/work/proj/build"));
        assert_eq!(layout.deps_dir, PathBuf::from("/work/proj/deps"));
        assert_eq!(layout.include_dir, PathBuf::from("/work/proj/build/install/include"));
        assert_eq!(layout.lib_dir, PathBuf::from("/work/proj/build/install/lib"));
        assert_eq!(
            layout.component_build_dir("core"),
            PathBuf::from("/work/proj/build/core")
        );
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let config = LayoutConfig {
            install_prefix: PathBuf::from("/usr/local"),
            ..LayoutConfig::default()
        };
        let layout = Layout::new("/work/proj", &config);
        assert_eq!(layout.include_dir, PathBuf::from("/usr/local/include"));
    }

    #[test]
    fn test_relative_to_root() {
        let layout = Layout::with_defaults("/work/proj");
        assert_eq!(
            layout.relative_to_root(Path::new("/work/proj/libs/core")),
            Some("libs/core".to_string())
        );
        assert_eq!(
            layout.relative_to_root(Path::new("/work/proj")),
            Some(String::new())
        );
        assert_eq!(layout.relative_to_root(Path::new("/elsewhere")), None);
    }
}
