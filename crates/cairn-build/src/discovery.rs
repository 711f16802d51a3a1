//! Manifest discovery
//!
//! Walks a directory tree, loads every component manifest it finds and
//! registers the declared components. Discovery never emits build actions, so
//! it can run again over a freshly fetched dependency without side effects on
//! components that are already known.

use crate::error::{BuildError, BuildResult};
use crate::graph::ComponentGraph;
use crate::manifest::ComponentManifest;
use cairn_config::{DiscoveryConfig, Layout};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directory walker that feeds the component graph
#[derive(Debug, Clone)]
pub struct Discovery {
    project_root: PathBuf,
    build_root: PathBuf,
    manifest_name: String,
    /// Exact paths relative to the project root
    ignore: BTreeSet<String>,
}

/// What one walk found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Manifests loaded, in walk order
    pub manifests: Vec<PathBuf>,
    /// Newly registered component names
    pub registered: Vec<String>,
    /// Names rejected because a different manifest declared them first
    pub duplicates: Vec<String>,
}

impl DiscoveryReport {
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }
}

impl Discovery {
    pub fn new(layout: &Layout, config: &DiscoveryConfig) -> Self {
        Self {
            project_root: layout.project_root.clone(),
            build_root: layout.build_dir.clone(),
            manifest_name: config.manifest.clone(),
            ignore: config.ignore.iter().map(|p| normalize(p)).collect(),
        }
    }

    /// Ignore one more directory, given relative to the project root
    pub fn ignore(mut self, relative: impl AsRef<str>) -> Self {
        self.ignore.insert(normalize(relative.as_ref()));
        self
    }

    pub fn manifest_name(&self) -> &str {
        &self.manifest_name
    }

    /// Walk `root` and register every component found
    ///
    /// Components already in the graph from the same manifest are skipped
    /// silently; a name claimed by a different manifest is reported with a
    /// warning and the first registration is kept.
    pub fn discover(&self, root: &Path, graph: &mut ComponentGraph) -> BuildResult<DiscoveryReport> {
        let mut report = DiscoveryReport::default();
        if !root.is_dir() {
            debug!(root = %root.display(), "nothing to discover");
            return Ok(report);
        }

        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_pruned(entry));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                BuildError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() || entry.file_name() != self.manifest_name.as_str() {
                continue;
            }

            let manifest_path = entry.path();
            debug!(manifest = %manifest_path.display(), "loading manifest");
            let components = ComponentManifest::from_file(manifest_path)?
                .into_components(manifest_path, &self.build_root)?;
            report.manifests.push(manifest_path.to_path_buf());

            for component in components {
                let name = component.name.clone();
                match graph.register(component) {
                    Ok(_) => report.registered.push(name),
                    Err(duplicate) if duplicate.same_origin => {}
                    Err(duplicate) => {
                        warn!(
                            component = %duplicate.name,
                            ignored = %manifest_path.display(),
                            kept = %duplicate.first.display(),
                            "duplicate component, keeping the first registration"
                        );
                        report.duplicates.push(name);
                    }
                }
            }
        }

        debug!(
            root = %root.display(),
            manifests = report.manifests.len(),
            registered = report.registered.len(),
            "discovery finished"
        );
        Ok(report)
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let path = entry.path();
        if path == self.build_root {
            return true;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            return true;
        }
        relative(&self.project_root, path).is_some_and(|rel| self.ignore.contains(&rel))
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches("./").trim_end_matches('/').to_string()
}

fn relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(root: &Path, dir: &str, body: &str) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("component.toml"), body).unwrap();
    }

    fn header(name: &str) -> String {
        format!("[[component]]\nname = \"{}\"\nkind = \"header-only\"\n", name)
    }

    fn discovery(root: &Path) -> Discovery {
        Discovery::new(&Layout::with_defaults(root), &DiscoveryConfig::default())
    }

    #[test]
    fn test_discovers_nested_manifests() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), "libs/core", &header("core"));
        write_manifest(temp.path(), "apps/tool", &header("tool"));

        let mut graph = ComponentGraph::new();
        let report = discovery(temp.path()).discover(temp.path(), &mut graph).unwrap();

        assert_eq!(report.registered, vec!["tool", "core"]);
        assert_eq!(report.manifests.len(), 2);
        assert_eq!(
            graph.lookup("core").unwrap().build_dir,
            temp.path().join("build").join("core")
        );
    }

    #[test]
    fn test_rediscovery_is_silent() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), "core", &header("core"));

        let mut graph = ComponentGraph::new();
        let discovery = discovery(temp.path());
        discovery.discover(temp.path(), &mut graph).unwrap();
        let again = discovery.discover(temp.path(), &mut graph).unwrap();

        assert!(again.registered.is_empty());
        assert!(again.duplicates.is_empty());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_duplicate_from_other_manifest() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), "a", &header("core"));
        write_manifest(temp.path(), "b", &header("core"));

        let mut graph = ComponentGraph::new();
        let report = discovery(temp.path()).discover(temp.path(), &mut graph).unwrap();

        assert_eq!(report.registered, vec!["core"]);
        assert_eq!(report.duplicates, vec!["core"]);
        assert_eq!(graph.lookup("core").unwrap().source_dir, temp.path().join("a"));
    }

    #[test]
    fn test_ignore_is_exact_relative_path() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), "legacy", &header("old"));
        write_manifest(temp.path(), "src/legacy", &header("kept"));

        let mut graph = ComponentGraph::new();
        discovery(temp.path())
            .ignore("legacy")
            .discover(temp.path(), &mut graph)
            .unwrap();

        assert!(!graph.contains("old"));
        assert!(graph.contains("kept"));
    }

    #[test]
    fn test_skips_build_and_hidden_dirs() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), "build/stale", &header("stale"));
        write_manifest(temp.path(), ".git/x", &header("hidden"));
        write_manifest(temp.path(), "core", &header("core"));

        let mut graph = ComponentGraph::new();
        discovery(temp.path()).discover(temp.path(), &mut graph).unwrap();

        assert_eq!(graph.names(), vec!["core"]);
    }

    #[test]
    fn test_invalid_manifest_aborts() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), "bad", "[[component]]\nname = \"x\"\nkind = \"program\"\n");

        let mut graph = ComponentGraph::new();
        let err = discovery(temp.path())
            .discover(temp.path(), &mut graph)
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidManifest { .. }));
    }

    #[test]
    fn test_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let mut graph = ComponentGraph::new();
        let report = discovery(temp.path())
            .discover(&temp.path().join("absent"), &mut graph)
            .unwrap();
        assert!(report.is_empty());
    }
}
