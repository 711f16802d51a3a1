//! Build engine seam
//!
//! The resolver describes each component as one [`BuildAction`] and hands it
//! to a [`BuildEngine`]. Engines decide how actions become work: the
//! [`RecordingEngine`] keeps them in memory, the
//! [`MakefileEngine`](crate::makefile::MakefileEngine) renders make rules.

use crate::component::{Component, ComponentKind};
use crate::error::{BuildError, BuildResult};
use crate::paths::LinkPlan;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Everything an engine needs to produce one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildAction {
    pub target: String,
    pub kind: ComponentKind,
    pub sources: Vec<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    /// Link names, in link order
    pub libraries: Vec<String>,
    pub library_paths: Vec<PathBuf>,
    /// Direct dependencies, in declaration order
    pub prerequisites: Vec<String>,
    /// Directory of the declaring manifest; doc and autotools commands run here
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl BuildAction {
    pub fn for_component(component: &Component, include_paths: Vec<PathBuf>, link: LinkPlan) -> Self {
        Self {
            target: component.name.clone(),
            kind: component.kind.clone(),
            sources: component.kind.sources().to_vec(),
            include_paths,
            libraries: link.library_names(),
            library_paths: link.search_paths,
            prerequisites: component.dependencies.clone(),
            source_dir: component.source_dir.clone(),
            output_dir: component.build_dir.clone(),
        }
    }

    /// Artifact this action produces, if it produces a file
    pub fn output_file(&self) -> Option<PathBuf> {
        let file = match &self.kind {
            ComponentKind::StaticLibrary { .. } => format!("lib{}.a", self.target),
            ComponentKind::SharedLibrary { .. } => format!("lib{}.so", self.target),
            ComponentKind::Program { .. } | ComponentKind::Test { .. } => self.target.clone(),
            ComponentKind::Doc { .. } | ComponentKind::Autotools { .. } => ".stamp".to_string(),
            ComponentKind::HeaderOnly | ComponentKind::External { .. } => return None,
        };
        Some(self.output_dir.join(file))
    }

    pub fn is_test(&self) -> bool {
        matches!(self.kind, ComponentKind::Test { .. })
    }
}

/// Opaque handle for a registered action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionHandle(pub(crate) usize);

/// Capability of the underlying build engine
pub trait BuildEngine {
    /// Register one unit of work; its prerequisites are already registered
    fn register(&mut self, action: BuildAction) -> BuildResult<ActionHandle>;

    /// Declare a named group of targets
    fn alias(&mut self, name: &str, members: &[String]) -> BuildResult<()>;

    /// Run the given targets (aliases or action targets)
    fn execute(&mut self, targets: &[String]) -> BuildResult<()>;
}

impl<E: BuildEngine + ?Sized> BuildEngine for &mut E {
    fn register(&mut self, action: BuildAction) -> BuildResult<ActionHandle> {
        (**self).register(action)
    }

    fn alias(&mut self, name: &str, members: &[String]) -> BuildResult<()> {
        (**self).alias(name, members)
    }

    fn execute(&mut self, targets: &[String]) -> BuildResult<()> {
        (**self).execute(targets)
    }
}

/// In-memory engine that records what it is given
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    actions: Vec<BuildAction>,
    by_target: HashMap<String, ActionHandle>,
    aliases: Vec<(String, Vec<String>)>,
    executed: Vec<Vec<String>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[BuildAction] {
        &self.actions
    }

    /// Targets in registration order
    pub fn order(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.target.as_str()).collect()
    }

    pub fn action(&self, target: &str) -> Option<&BuildAction> {
        self.by_target.get(target).map(|handle| &self.actions[handle.0])
    }

    pub fn get(&self, handle: ActionHandle) -> Option<&BuildAction> {
        self.actions.get(handle.0)
    }

    pub fn aliases(&self) -> &[(String, Vec<String>)] {
        &self.aliases
    }

    pub fn alias_members(&self, name: &str) -> Option<&[String]> {
        self.aliases
            .iter()
            .find(|(alias, _)| alias == name)
            .map(|(_, members)| members.as_slice())
    }

    /// Every `execute` call, in order
    pub fn executed(&self) -> &[Vec<String>] {
        &self.executed
    }

    /// How many actions were registered for `target`
    pub fn count(&self, target: &str) -> usize {
        self.actions.iter().filter(|a| a.target == target).count()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl BuildEngine for RecordingEngine {
    fn register(&mut self, action: BuildAction) -> BuildResult<ActionHandle> {
        let handle = ActionHandle(self.actions.len());
        self.by_target.entry(action.target.clone()).or_insert(handle);
        self.actions.push(action);
        Ok(handle)
    }

    fn alias(&mut self, name: &str, members: &[String]) -> BuildResult<()> {
        if self.by_target.contains_key(name) {
            return Err(BuildError::engine(
                format!("alias '{}' clashes with a target of the same name", name),
                None,
            ));
        }
        self.aliases.push((name.to_string(), members.to_vec()));
        Ok(())
    }

    fn execute(&mut self, targets: &[String]) -> BuildResult<()> {
        self.executed.push(targets.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn action(target: &str, kind: ComponentKind) -> BuildAction {
        BuildAction::for_component(
            &Component::new(target, kind, "/src").with_build_dir(format!("/b/{}", target)),
            vec![],
            LinkPlan::default(),
        )
    }

    fn sources() -> Vec<PathBuf> {
        vec![PathBuf::from("/src/a.c")]
    }

    #[rstest]
    #[case(ComponentKind::StaticLibrary { sources: sources() }, Some("/b/x/libx.a"))]
    #[case(ComponentKind::SharedLibrary { sources: sources() }, Some("/b/x/libx.so"))]
    #[case(ComponentKind::Program { sources: sources() }, Some("/b/x/x"))]
    #[case(ComponentKind::Doc { command: "doxygen".into(), inputs: vec![] }, Some("/b/x/.stamp"))]
    #[case(ComponentKind::HeaderOnly, None)]
    #[case(ComponentKind::External { link_name: None }, None)]
    fn test_output_file(#[case] kind: ComponentKind, #[case] expected: Option<&str>) {
        assert_eq!(action("x", kind).output_file(), expected.map(PathBuf::from));
    }

    #[test]
    fn test_action_from_component() {
        let component = Component::new("app", ComponentKind::Program { sources: sources() }, "/src")
            .with_dependencies(vec!["core".to_string()]);
        let plan = LinkPlan {
            libraries: vec![crate::paths::LinkLibrary {
                name: "core".to_string(),
                depth: 1,
                search_dir: PathBuf::from("/b/core"),
            }],
            search_paths: vec![PathBuf::from("/b/core")],
        };
        let action = BuildAction::for_component(&component, vec![PathBuf::from("/inc")], plan);

        assert_eq!(action.sources, sources());
        assert_eq!(action.libraries, vec!["core"]);
        assert_eq!(action.library_paths, vec![PathBuf::from("/b/core")]);
        assert_eq!(action.prerequisites, vec!["core"]);
    }

    #[test]
    fn test_recording_engine() {
        let mut engine = RecordingEngine::new();
        let first = engine.register(action("core", ComponentKind::HeaderOnly)).unwrap();
        engine.register(action("app", ComponentKind::Program { sources: sources() })).unwrap();
        engine.alias("all", &["app".to_string()]).unwrap();
        engine.execute(&["all".to_string()]).unwrap();

        assert_eq!(engine.order(), vec!["core", "app"]);
        assert_eq!(engine.get(first).unwrap().target, "core");
        assert_eq!(engine.action("app").unwrap().target, "app");
        assert_eq!(engine.alias_members("all"), Some(&["app".to_string()][..]));
        assert_eq!(engine.executed(), &[vec!["all".to_string()]]);
        assert_eq!(engine.count("core"), 1);
    }

    #[test]
    fn test_alias_cannot_shadow_target() {
        let mut engine = RecordingEngine::new();
        engine.register(action("all", ComponentKind::HeaderOnly)).unwrap();
        assert!(engine.alias("all", &[]).is_err());
    }
}
