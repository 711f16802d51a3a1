//! Fetch lockfile (cairn.lock)
//!
//! Records which descriptor each fetched dependency was materialized from, so
//! a later run can tell when `cairn.toml` changed under an existing checkout.

use crate::descriptor::DependencyDescriptor;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the lockfile at the project root
pub const LOCKFILE_NAME: &str = "cairn.lock";

/// Lockfile structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchLock {
    /// Lockfile format version
    pub version: u32,
    /// Fetched dependencies, sorted by name
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<LockedDependency>,
}

impl FetchLock {
    /// Current lockfile format version
    pub const VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            dependencies: Vec::new(),
        }
    }

    /// Parse lockfile from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load lockfile from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_str(&content)?)
    }

    /// Load the lockfile, or start an empty one when the file does not exist
    pub fn load_or_default(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Serialize to TOML string
    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Write lockfile to file
    pub fn write_to_file(&self, path: &Path) -> crate::Result<()> {
        let content = self.to_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Record a fetched descriptor, replacing any previous entry
    pub fn record(&mut self, descriptor: &DependencyDescriptor) {
        let entry = LockedDependency::from_descriptor(descriptor);
        self.dependencies.retain(|d| d.name != entry.name);
        self.dependencies.push(entry);
        self.dependencies.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn get(&self, name: &str) -> Option<&LockedDependency> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let len = self.dependencies.len();
        self.dependencies.retain(|d| d.name != name);
        len != self.dependencies.len()
    }

    /// True when the descriptor is locked with a different fingerprint
    pub fn is_stale(&self, descriptor: &DependencyDescriptor) -> bool {
        self.get(&descriptor.name)
            .is_some_and(|locked| locked.fingerprint != descriptor.fingerprint())
    }

    /// Verify lockfile integrity
    pub fn verify(&self) -> Result<(), String> {
        if self.version > Self::VERSION {
            return Err(format!(
                "Lockfile version {} is newer than supported version {}",
                self.version,
                Self::VERSION
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for dep in &self.dependencies {
            if !seen.insert(&dep.name) {
                return Err(format!("Duplicate dependency in lockfile: {}", dep.name));
            }
        }

        Ok(())
    }
}

impl Default for FetchLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Locked dependency entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockedDependency {
    pub name: String,
    /// Source kind (git, hg, svn, url, package)
    pub source: String,
    /// URL or package name
    pub location: String,
    /// SHA-256 of the descriptor that was fetched
    pub fingerprint: String,
    /// RFC 3339 timestamp of the fetch
    pub fetched_at: String,
}

impl LockedDependency {
    pub fn from_descriptor(descriptor: &DependencyDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            source: descriptor.source.kind_name().to_string(),
            location: descriptor.source.location().to_string(),
            fingerprint: descriptor.fingerprint(),
            fetched_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FetchSource;

    fn descriptor(name: &str, url: &str) -> DependencyDescriptor {
        DependencyDescriptor::new(
            name,
            FetchSource::Download {
                url: url.to_string(),
            },
        )
    }

    #[test]
    fn test_record_replaces_and_sorts() {
        let mut lock = FetchLock::new();
        lock.record(&descriptor("zlib", "https://example.com/zlib.tgz"));
        lock.record(&descriptor("argp", "https://example.com/argp.tgz"));
        lock.record(&descriptor("zlib", "https://example.com/zlib-2.tgz"));

        assert_eq!(lock.dependencies.len(), 2);
        assert_eq!(lock.dependencies[0].name, "argp");
        assert_eq!(
            lock.get("zlib").unwrap().location,
            "https://example.com/zlib-2.tgz"
        );
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCKFILE_NAME);

        let mut lock = FetchLock::new();
        lock.record(&descriptor("zlib", "https://example.com/zlib.tgz"));
        lock.write_to_file(&path).unwrap();

        let loaded = FetchLock::from_file(&path).unwrap();
        assert_eq!(loaded, lock);
        assert!(loaded.verify().is_ok());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FetchLock::load_or_default(&dir.path().join(LOCKFILE_NAME)).unwrap();
        assert!(lock.dependencies.is_empty());
        assert_eq!(lock.version, FetchLock::VERSION);
    }

    #[test]
    fn test_stale_detection() {
        let mut lock = FetchLock::new();
        let original = descriptor("zlib", "https://example.com/zlib.tgz");
        lock.record(&original);

        assert!(!lock.is_stale(&original));
        assert!(lock.is_stale(&descriptor("zlib", "https://mirror.example.com/zlib.tgz")));
        assert!(!lock.is_stale(&descriptor("other", "https://example.com/other.tgz")));
    }

    #[test]
    fn test_verify_rejects_newer_version() {
        let mut lock = FetchLock::new();
        lock.version = FetchLock::VERSION + 1;
        assert!(lock.verify().is_err());
    }

    #[test]
    fn test_remove() {
        let mut lock = FetchLock::new();
        lock.record(&descriptor("zlib", "https://example.com/zlib.tgz"));
        assert!(lock.remove("zlib"));
        assert!(!lock.remove("zlib"));
    }
}
