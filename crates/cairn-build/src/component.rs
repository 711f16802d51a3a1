//! Component kinds and component records

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of component, with the data only that kind carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ComponentKind {
    /// Headers only; contributes include paths, never linked
    HeaderOnly,
    StaticLibrary {
        sources: Vec<PathBuf>,
    },
    SharedLibrary {
        sources: Vec<PathBuf>,
    },
    Program {
        sources: Vec<PathBuf>,
    },
    Test {
        sources: Vec<PathBuf>,
        /// Arguments passed when the test runs
        args: Vec<String>,
    },
    /// Prebuilt library provided by the system or a fetched dependency
    External {
        link_name: Option<String>,
    },
    Doc {
        command: String,
        inputs: Vec<PathBuf>,
    },
    /// Library built and installed through `./configure && make install`
    Autotools {
        configure_args: Vec<String>,
        link_name: Option<String>,
    },
}

impl ComponentKind {
    /// Kind name as written in manifests
    pub fn name(&self) -> &'static str {
        match self {
            Self::HeaderOnly => "header-only",
            Self::StaticLibrary { .. } => "static-library",
            Self::SharedLibrary { .. } => "shared-library",
            Self::Program { .. } => "program",
            Self::Test { .. } => "test",
            Self::External { .. } => "external",
            Self::Doc { .. } => "doc",
            Self::Autotools { .. } => "autotools",
        }
    }

    /// Whether consumers link against this component
    pub fn is_linkable(&self) -> bool {
        matches!(
            self,
            Self::StaticLibrary { .. }
                | Self::SharedLibrary { .. }
                | Self::External { .. }
                | Self::Autotools { .. }
        )
    }

    /// Whether consumers see this component's headers through the installed layout
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::External { .. } | Self::Autotools { .. })
    }

    /// Compiled sources, empty for kinds without any
    pub fn sources(&self) -> &[PathBuf] {
        match self {
            Self::StaticLibrary { sources }
            | Self::SharedLibrary { sources }
            | Self::Program { sources }
            | Self::Test { sources, .. } => sources.as_slice(),
            Self::HeaderOnly | Self::External { .. } | Self::Doc { .. } | Self::Autotools { .. } => {
                &[]
            }
        }
    }

    /// Name passed to the linker (`-l<name>`), if this kind is linkable
    pub fn link_name<'a>(&'a self, component: &'a str) -> Option<&'a str> {
        match self {
            Self::StaticLibrary { .. } | Self::SharedLibrary { .. } => Some(component),
            Self::External { link_name } | Self::Autotools { link_name, .. } => {
                Some(link_name.as_deref().unwrap_or(component))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named buildable unit declared by a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    /// Directory of the declaring manifest
    pub source_dir: PathBuf,
    /// The manifest file itself
    pub manifest: PathBuf,
    /// Dependency names, in declaration order
    pub dependencies: Vec<String>,
    /// Header directories as declared (relative to the source dir or the install layout)
    pub header_dirs: Vec<PathBuf>,
    /// Extra include directories, already resolved
    pub external_header_dirs: Vec<PathBuf>,
    /// Where this component's artifacts land
    pub build_dir: PathBuf,
}

impl Component {
    /// Create a component rooted at `source_dir`
    pub fn new(name: impl Into<String>, kind: ComponentKind, source_dir: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let source_dir = source_dir.into();
        Self {
            manifest: source_dir.join("component.toml"),
            build_dir: source_dir.join("build").join(&name),
            name,
            kind,
            source_dir,
            dependencies: Vec::new(),
            header_dirs: Vec::new(),
            external_header_dirs: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_header_dirs(mut self, header_dirs: Vec<PathBuf>) -> Self {
        self.header_dirs = header_dirs;
        self
    }

    pub fn with_external_header_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.external_header_dirs = dirs;
        self
    }

    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    pub fn with_manifest(mut self, manifest: impl Into<PathBuf>) -> Self {
        self.manifest = manifest.into();
        self
    }

    pub fn is_linkable(&self) -> bool {
        self.kind.is_linkable()
    }

    pub fn link_name(&self) -> Option<&str> {
        self.kind.link_name(&self.name)
    }

    /// Header directories resolved against the source directory
    pub fn local_header_dirs(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.header_dirs.iter().map(|dir| resolve(&self.source_dir, dir))
    }
}

/// Naming convention: component names are lowercase
pub fn is_conventional_name(name: &str) -> bool {
    !name.chars().any(char::is_uppercase)
}

/// Join `path` onto `base` unless it is already absolute
pub(crate) fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sources() -> Vec<PathBuf> {
        vec![PathBuf::from("a.c")]
    }

    #[rstest]
    #[case(ComponentKind::HeaderOnly, false, false)]
    #[case(ComponentKind::StaticLibrary { sources: sources() }, true, false)]
    #[case(ComponentKind::SharedLibrary { sources: sources() }, true, false)]
    #[case(ComponentKind::Program { sources: sources() }, false, false)]
    #[case(ComponentKind::Test { sources: sources(), args: vec![] }, false, false)]
    #[case(ComponentKind::External { link_name: None }, true, true)]
    #[case(ComponentKind::Doc { command: "doxygen".into(), inputs: vec![] }, false, false)]
    #[case(ComponentKind::Autotools { configure_args: vec![], link_name: None }, true, true)]
    fn test_kind_capabilities(
        #[case] kind: ComponentKind,
        #[case] linkable: bool,
        #[case] installed: bool,
    ) {
        assert_eq!(kind.is_linkable(), linkable, "{}", kind);
        assert_eq!(kind.is_installed(), installed, "{}", kind);
    }

    #[test]
    fn test_link_name_override() {
        let kind = ComponentKind::External {
            link_name: Some("z".to_string()),
        };
        assert_eq!(kind.link_name("zlib"), Some("z"));

        let kind = ComponentKind::StaticLibrary { sources: sources() };
        assert_eq!(kind.link_name("core"), Some("core"));

        assert_eq!(ComponentKind::HeaderOnly.link_name("hdr"), None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ComponentKind::HeaderOnly.to_string(), "header-only");
        assert_eq!(
            ComponentKind::Autotools {
                configure_args: vec![],
                link_name: None
            }
            .to_string(),
            "autotools"
        );
    }

    #[test]
    fn test_sources_by_kind() {
        assert_eq!(ComponentKind::Program { sources: sources() }.sources().len(), 1);
        assert!(ComponentKind::External { link_name: None }.sources().is_empty());
    }

    #[test]
    fn test_conventional_name() {
        assert!(is_conventional_name("core"));
        assert!(is_conventional_name("lib-core_2"));
        assert!(!is_conventional_name("Core"));
        assert!(!is_conventional_name("libCORE"));
    }

    #[test]
    fn test_local_header_dirs() {
        let component = Component::new("core", ComponentKind::HeaderOnly, "/src/core")
            .with_header_dirs(vec![PathBuf::from("include"), PathBuf::from("/abs/inc")]);
        let dirs: Vec<_> = component.local_header_dirs().collect();
        assert_eq!(
            dirs,
            vec![PathBuf::from("/src/core/include"), PathBuf::from("/abs/inc")]
        );
    }
}
