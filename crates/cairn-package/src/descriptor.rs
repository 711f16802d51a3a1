//! Dependency descriptors (`[dependencies.<name>]` in cairn.toml)

use crate::{PackageError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Descriptor exactly as written in the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct DescriptorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<PackageManager>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_fetch: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_check: Option<String>,
}

/// Where a dependency comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSource {
    Git {
        url: String,
        reference: Option<GitReference>,
    },
    Mercurial {
        url: String,
        rev: Option<String>,
    },
    Subversion {
        url: String,
        rev: Option<String>,
    },
    /// Raw download, unpacked when the file is a known archive
    Download { url: String },
    /// System package manager install
    System {
        package: String,
        manager: PackageManager,
    },
}

impl FetchSource {
    /// Short kind name, as recorded in the lockfile
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Git { .. } => "git",
            Self::Mercurial { .. } => "hg",
            Self::Subversion { .. } => "svn",
            Self::Download { .. } => "url",
            Self::System { .. } => "package",
        }
    }

    /// URL or package name
    pub fn location(&self) -> &str {
        match self {
            Self::Git { url, .. }
            | Self::Mercurial { url, .. }
            | Self::Subversion { url, .. }
            | Self::Download { url } => url,
            Self::System { package, .. } => package,
        }
    }

    /// Whether the fetch produces a source tree in the target directory
    pub fn is_source_tree(&self) -> bool {
        !matches!(self, Self::System { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitReference {
    Branch(String),
    Tag(String),
    Rev(String),
}

/// Supported system package managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Dnf,
    Pacman,
    Brew,
    Port,
}

impl PackageManager {
    /// Program and arguments that install `package`
    pub fn install_command(&self, package: &str) -> (&'static str, Vec<String>) {
        let (program, args): (&'static str, &[&str]) = match self {
            Self::Apt => ("apt-get", &["install", "-y"]),
            Self::Dnf => ("dnf", &["install", "-y"]),
            Self::Pacman => ("pacman", &["-S", "--noconfirm", "--needed"]),
            Self::Brew => ("brew", &["install"]),
            Self::Port => ("port", &["install"]),
        };
        let mut args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        args.push(package.to_string());
        (program, args)
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Brew => "brew",
            Self::Port => "port",
        };
        f.write_str(name)
    }
}

/// Validated, immutable dependency descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
    pub name: String,
    pub source: FetchSource,
    /// Commands run in the fetched directory, in order
    pub post_fetch: Vec<String>,
    /// Exit status 0 means the dependency is already satisfied
    pub install_check: Option<String>,
}

impl DependencyDescriptor {
    /// Create a descriptor with no hooks
    pub fn new(name: impl Into<String>, source: FetchSource) -> Self {
        Self {
            name: name.into(),
            source,
            post_fetch: Vec::new(),
            install_check: None,
        }
    }

    /// Add post-fetch commands
    pub fn with_post_fetch(mut self, commands: Vec<String>) -> Self {
        self.post_fetch = commands;
        self
    }

    /// Set the install-check command
    pub fn with_install_check(mut self, command: impl Into<String>) -> Self {
        self.install_check = Some(command.into());
        self
    }

    /// Validate a raw spec
    pub fn from_spec(name: &str, spec: &DescriptorSpec) -> Result<Self> {
        let invalid = |reason: &str| PackageError::InvalidDescriptor {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let sources = [
            spec.git.is_some(),
            spec.hg.is_some(),
            spec.svn.is_some(),
            spec.url.is_some(),
            spec.package.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        match sources {
            0 => return Err(invalid("expected one of git, hg, svn, url or package")),
            1 => {}
            _ => return Err(invalid("only one of git, hg, svn, url or package may be set")),
        }

        let refs = [&spec.branch, &spec.tag, &spec.rev]
            .iter()
            .filter(|r| r.is_some())
            .count();
        if refs > 1 {
            return Err(invalid("only one of branch, tag or rev may be set"));
        }
        if spec.manager.is_some() && spec.package.is_none() {
            return Err(invalid("'manager' requires 'package'"));
        }

        let source = if let Some(url) = &spec.git {
            let reference = if let Some(branch) = &spec.branch {
                Some(GitReference::Branch(branch.clone()))
            } else if let Some(tag) = &spec.tag {
                Some(GitReference::Tag(tag.clone()))
            } else {
                spec.rev.clone().map(GitReference::Rev)
            };
            FetchSource::Git {
                url: url.clone(),
                reference,
            }
        } else if let Some(url) = spec.hg.as_ref().or(spec.svn.as_ref()) {
            if spec.branch.is_some() || spec.tag.is_some() {
                return Err(invalid("hg and svn sources only accept 'rev'"));
            }
            if spec.hg.is_some() {
                FetchSource::Mercurial {
                    url: url.clone(),
                    rev: spec.rev.clone(),
                }
            } else {
                FetchSource::Subversion {
                    url: url.clone(),
                    rev: spec.rev.clone(),
                }
            }
        } else if let Some(url) = &spec.url {
            if refs > 0 {
                return Err(invalid("url sources do not accept branch, tag or rev"));
            }
            FetchSource::Download { url: url.clone() }
        } else {
            if refs > 0 {
                return Err(invalid("package sources do not accept branch, tag or rev"));
            }
            let package = spec.package.clone().unwrap_or_default();
            let manager = spec
                .manager
                .ok_or_else(|| invalid("'package' requires 'manager'"))?;
            FetchSource::System { package, manager }
        };

        if source.location().trim().is_empty() {
            return Err(invalid("source location cannot be empty"));
        }

        Ok(Self {
            name: name.to_string(),
            source,
            post_fetch: spec.post_fetch.clone(),
            install_check: spec.install_check.clone(),
        })
    }

    /// SHA-256 over everything that influences what gets fetched
    pub fn fingerprint(&self) -> String {
        let reference = match &self.source {
            FetchSource::Git {
                reference: Some(GitReference::Branch(b)),
                ..
            } => format!("branch={}", b),
            FetchSource::Git {
                reference: Some(GitReference::Tag(t)),
                ..
            } => format!("tag={}", t),
            FetchSource::Git {
                reference: Some(GitReference::Rev(r)),
                ..
            }
            | FetchSource::Mercurial { rev: Some(r), .. }
            | FetchSource::Subversion { rev: Some(r), .. } => format!("rev={}", r),
            FetchSource::System { manager, .. } => format!("manager={}", manager),
            _ => String::new(),
        };

        let mut hasher = Sha256::new();
        hasher.update(self.source.kind_name().as_bytes());
        hasher.update([0]);
        hasher.update(self.source.location().as_bytes());
        hasher.update([0]);
        hasher.update(reference.as_bytes());
        for command in &self.post_fetch {
            hasher.update([0]);
            hasher.update(command.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Name → descriptor lookup table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorTable {
    descriptors: BTreeMap<String, DependencyDescriptor>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate every spec; the first invalid entry fails the whole table
    pub fn from_specs(specs: &BTreeMap<String, DescriptorSpec>) -> Result<Self> {
        let mut table = Self::new();
        for (name, spec) in specs {
            table.insert(DependencyDescriptor::from_spec(name, spec)?);
        }
        Ok(table)
    }

    /// Insert or replace a descriptor
    pub fn insert(&mut self, descriptor: DependencyDescriptor) {
        self.descriptors.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&DependencyDescriptor> {
        self.descriptors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependencyDescriptor> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> DescriptorSpec {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_git_with_tag() {
        let spec = parse(
            r#"
            git = "https://example.com/zlib.git"
            tag = "v1.3.1"
            post-fetch = ["./configure"]
            "#,
        );
        let descriptor = DependencyDescriptor::from_spec("zlib", &spec).unwrap();
        assert_eq!(
            descriptor.source,
            FetchSource::Git {
                url: "https://example.com/zlib.git".to_string(),
                reference: Some(GitReference::Tag("v1.3.1".to_string())),
            }
        );
        assert_eq!(descriptor.post_fetch, vec!["./configure".to_string()]);
        assert_eq!(descriptor.source.kind_name(), "git");
    }

    #[test]
    fn test_system_package() {
        let spec = parse(
            r#"
            package = "libpng-dev"
            manager = "apt"
            install-check = "pkg-config --exists libpng"
            "#,
        );
        let descriptor = DependencyDescriptor::from_spec("png", &spec).unwrap();
        assert!(!descriptor.source.is_source_tree());
        assert_eq!(descriptor.source.location(), "libpng-dev");
        assert!(descriptor.install_check.is_some());
    }

    #[test]
    fn test_missing_source_is_rejected() {
        let spec = parse(r#"tag = "v1""#);
        let err = DependencyDescriptor::from_spec("nothing", &spec).unwrap_err();
        assert!(err.to_string().contains("nothing"));
    }

    #[test]
    fn test_two_sources_are_rejected() {
        let spec = parse(
            r#"
            git = "https://example.com/a.git"
            url = "https://example.com/a.tar.gz"
            "#,
        );
        assert!(DependencyDescriptor::from_spec("a", &spec).is_err());
    }

    #[test]
    fn test_hg_rejects_branch() {
        let spec = parse(
            r#"
            hg = "https://example.com/repo"
            branch = "default"
            "#,
        );
        assert!(DependencyDescriptor::from_spec("repo", &spec).is_err());
    }

    #[test]
    fn test_package_requires_manager() {
        let spec = parse(r#"package = "zlib1g-dev""#);
        assert!(DependencyDescriptor::from_spec("zlib", &spec).is_err());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result: std::result::Result<DescriptorSpec, _> =
            toml::from_str(r#"gti = "https://example.com""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_fingerprint_tracks_reference() {
        let a = DependencyDescriptor::new(
            "a",
            FetchSource::Git {
                url: "https://example.com/a.git".to_string(),
                reference: Some(GitReference::Tag("v1".to_string())),
            },
        );
        let mut b = a.clone();
        b.source = FetchSource::Git {
            url: "https://example.com/a.git".to_string(),
            reference: Some(GitReference::Tag("v2".to_string())),
        };
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_table_from_specs() {
        let mut specs = BTreeMap::new();
        specs.insert("b".to_string(), parse(r#"url = "https://example.com/b.zip""#));
        specs.insert("a".to_string(), parse(r#"svn = "https://example.com/a""#));
        let table = DescriptorTable::from_specs(&specs).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(table.contains("a"));
        assert!(table.get("c").is_none());
    }
}
