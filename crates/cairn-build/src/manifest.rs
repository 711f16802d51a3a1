//! Component manifests (component.toml)
//!
//! A manifest declares one or more components for the directory it sits in.
//! Loading a manifest only produces [`Component`] records; build actions are
//! emitted later, when the resolver processes each component.

use crate::component::{resolve, Component, ComponentKind};
use crate::error::{BuildError, BuildResult};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Parsed manifest file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ComponentManifest {
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentDecl>,
}

/// One `[[component]]` table
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ComponentDecl {
    pub name: String,
    pub kind: KindName,
    #[serde(default)]
    pub sources: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub headers: Vec<PathBuf>,
    #[serde(default)]
    pub external_headers: Vec<PathBuf>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub link_name: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub inputs: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub configure_args: Option<Vec<String>>,
}

/// Kind tag as written in manifests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KindName {
    HeaderOnly,
    StaticLibrary,
    SharedLibrary,
    Program,
    Test,
    External,
    Doc,
    Autotools,
}

impl KindName {
    fn requires_sources(self) -> bool {
        matches!(
            self,
            Self::StaticLibrary | Self::SharedLibrary | Self::Program | Self::Test
        )
    }
}

impl ComponentManifest {
    /// Parse manifest from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load manifest from file
    pub fn from_file(path: &Path) -> BuildResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        Self::from_str(&content).map_err(|e| BuildError::manifest_read(path, e))
    }

    /// Turn declarations into components
    ///
    /// `manifest_path` anchors relative paths; each component builds into
    /// `<build_root>/<name>`.
    pub fn into_components(self, manifest_path: &Path, build_root: &Path) -> BuildResult<Vec<Component>> {
        let source_dir = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let mut components = Vec::with_capacity(self.components.len());

        for decl in self.components {
            if !seen.insert(decl.name.clone()) {
                return Err(BuildError::invalid_manifest(
                    manifest_path,
                    format!("component '{}' is declared twice", decl.name),
                ));
            }
            components.push(decl.into_component(manifest_path, &source_dir, build_root)?);
        }

        Ok(components)
    }
}

impl ComponentDecl {
    fn into_component(
        self,
        manifest_path: &Path,
        source_dir: &Path,
        build_root: &Path,
    ) -> BuildResult<Component> {
        let invalid = |reason: String| BuildError::invalid_manifest(manifest_path, reason);

        if self.name.trim().is_empty() {
            return Err(invalid("component name cannot be empty".to_string()));
        }
        if self.name.contains(['/', '\\']) || self.name.contains(char::is_whitespace) {
            return Err(invalid(format!(
                "component name '{}' may not contain slashes or whitespace",
                self.name
            )));
        }

        let only_for = |field: &str, present: bool, allowed: &[KindName]| {
            if present && !allowed.contains(&self.kind) {
                Err(invalid(format!(
                    "'{}' is not valid for component '{}'",
                    field, self.name
                )))
            } else {
                Ok(())
            }
        };
        only_for("sources", self.sources.is_some(), &[
            KindName::StaticLibrary,
            KindName::SharedLibrary,
            KindName::Program,
            KindName::Test,
        ])?;
        only_for("args", self.args.is_some(), &[KindName::Test])?;
        only_for("link-name", self.link_name.is_some(), &[
            KindName::External,
            KindName::Autotools,
        ])?;
        only_for("command", self.command.is_some(), &[KindName::Doc])?;
        only_for("inputs", self.inputs.is_some(), &[KindName::Doc])?;
        only_for("configure-args", self.configure_args.is_some(), &[KindName::Autotools])?;

        let sources: Vec<PathBuf> = self
            .sources
            .unwrap_or_default()
            .iter()
            .map(|s| resolve(source_dir, s))
            .collect();
        if self.kind.requires_sources() && sources.is_empty() {
            return Err(invalid(format!(
                "component '{}' needs at least one source",
                self.name
            )));
        }

        let kind = match self.kind {
            KindName::HeaderOnly => ComponentKind::HeaderOnly,
            KindName::StaticLibrary => ComponentKind::StaticLibrary { sources },
            KindName::SharedLibrary => ComponentKind::SharedLibrary { sources },
            KindName::Program => ComponentKind::Program { sources },
            KindName::Test => ComponentKind::Test {
                sources,
                args: self.args.unwrap_or_default(),
            },
            KindName::External => ComponentKind::External {
                link_name: self.link_name,
            },
            KindName::Doc => ComponentKind::Doc {
                command: self.command.unwrap_or_else(|| "doxygen".to_string()),
                inputs: self
                    .inputs
                    .unwrap_or_default()
                    .iter()
                    .map(|i| resolve(source_dir, i))
                    .collect(),
            },
            KindName::Autotools => ComponentKind::Autotools {
                configure_args: self.configure_args.unwrap_or_default(),
                link_name: self.link_name,
            },
        };

        let external_header_dirs = self
            .external_headers
            .iter()
            .map(|dir| resolve(source_dir, dir))
            .collect();

        Ok(Component::new(self.name.clone(), kind, source_dir)
            .with_manifest(manifest_path)
            .with_build_dir(build_root.join(&self.name))
            .with_dependencies(self.dependencies)
            .with_header_dirs(self.headers)
            .with_external_header_dirs(external_header_dirs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn components(content: &str) -> BuildResult<Vec<Component>> {
        ComponentManifest::from_str(content)
            .map_err(|e| BuildError::manifest_read("component.toml", e))?
            .into_components(Path::new("/src/core/component.toml"), Path::new("/build"))
    }

    #[test]
    fn test_static_library() {
        let parsed = components(
            r#"
[[component]]
name = "core"
kind = "static-library"
sources = ["src/core.c", "/abs/extra.c"]
headers = ["include"]
external-headers = ["vendor/include"]
dependencies = ["zlib", "log"]
"#,
        )
        .unwrap();

        assert_eq!(parsed.len(), 1);
        let core = &parsed[0];
        assert_eq!(core.name, "core");
        assert_eq!(
            core.kind.sources(),
            &[PathBuf::from("/src/core/src/core.c"), PathBuf::from("/abs/extra.c")]
        );
        assert_eq!(core.header_dirs, vec![PathBuf::from("include")]);
        assert_eq!(
            core.external_header_dirs,
            vec![PathBuf::from("/src/core/vendor/include")]
        );
        assert_eq!(core.dependencies, vec!["zlib", "log"]);
        assert_eq!(core.build_dir, PathBuf::from("/build/core"));
        assert_eq!(core.source_dir, PathBuf::from("/src/core"));
        assert_eq!(core.manifest, PathBuf::from("/src/core/component.toml"));
    }

    #[test]
    fn test_multiple_components() {
        let parsed = components(
            r#"
[[component]]
name = "app"
kind = "program"
sources = ["main.c"]
dependencies = ["core"]

[[component]]
name = "app-tests"
kind = "test"
sources = ["tests/main.c"]
args = ["--quick"]

[[component]]
name = "docs"
kind = "doc"
inputs = ["Doxyfile"]

[[component]]
name = "ssl"
kind = "autotools"
configure-args = ["--disable-shared"]
link-name = "ssl3"
"#,
        )
        .unwrap();

        assert_eq!(parsed.len(), 4);
        assert!(matches!(
            &parsed[1].kind,
            ComponentKind::Test { args, .. } if args == &vec!["--quick".to_string()]
        ));
        assert!(matches!(
            &parsed[2].kind,
            ComponentKind::Doc { command, .. } if command == "doxygen"
        ));
        assert_eq!(parsed[3].link_name(), Some("ssl3"));
    }

    #[test]
    fn test_empty_manifest() {
        assert!(components("").unwrap().is_empty());
    }

    #[rstest]
    #[case::missing_sources("name = \"app\"\nkind = \"program\"")]
    #[case::empty_name("name = \"\"\nkind = \"header-only\"")]
    #[case::slash_in_name("name = \"a/b\"\nkind = \"header-only\"")]
    #[case::args_on_library("name = \"core\"\nkind = \"static-library\"\nsources = [\"a.c\"]\nargs = [\"x\"]")]
    #[case::sources_on_header_only("name = \"h\"\nkind = \"header-only\"\nsources = [\"a.c\"]")]
    fn test_invalid_declarations(#[case] body: &str) {
        let content = format!("[[component]]\n{}\n", body);
        let err = components(&content).unwrap_err();
        assert!(matches!(err, BuildError::InvalidManifest { .. }), "{:?}", err);
    }

    #[test]
    fn test_unknown_kind_is_read_error() {
        let err = components("[[component]]\nname = \"x\"\nkind = \"framework\"\n").unwrap_err();
        assert!(matches!(err, BuildError::ManifestReadError { .. }));
    }

    #[test]
    fn test_duplicate_name_in_one_manifest() {
        let err = components(
            r#"
[[component]]
name = "core"
kind = "header-only"

[[component]]
name = "core"
kind = "header-only"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }
}
