//! Dependency resolution
//!
//! Post-order depth-first walk over the component graph. Each node moves
//! `Registered -> Resolving -> Processed`; meeting a `Resolving` node again
//! means the walk has come back around a cycle. Dependencies missing from the
//! graph are fetched, their checkout is discovered, and the walk continues.

use crate::component::{Component, ComponentKind};
use crate::engine::{BuildAction, BuildEngine};
use crate::error::{BuildError, BuildResult};
use crate::graph::{ComponentId, ComponentState};
use crate::paths::{cycle_path, include_paths, link_plan};
use crate::session::BuildSession;
use cairn_package::{Fetch, FetchSource};
use tracing::{debug, info};

pub(crate) struct Resolver<'a, E: ?Sized, F: ?Sized> {
    session: &'a mut BuildSession,
    engine: &'a mut E,
    fetcher: &'a F,
    /// Nodes currently `Resolving`, outermost first
    path: Vec<ComponentId>,
}

impl<'a, E, F> Resolver<'a, E, F>
where
    E: BuildEngine + ?Sized,
    F: Fetch + ?Sized,
{
    pub(crate) fn new(session: &'a mut BuildSession, engine: &'a mut E, fetcher: &'a F) -> Self {
        Self {
            session,
            engine,
            fetcher,
            path: Vec::new(),
        }
    }

    pub(crate) fn visit(&mut self, id: ComponentId) -> BuildResult<()> {
        match self.session.graph.state(id) {
            ComponentState::Processed => return Ok(()),
            ComponentState::Resolving => {
                let start = self.path.iter().position(|&on_path| on_path == id).unwrap_or(0);
                return Err(BuildError::CircularDependency(cycle_path(
                    &self.session.graph,
                    &self.path[start..],
                    id,
                )));
            }
            ComponentState::Registered => {}
        }

        self.session.graph.set_state(id, ComponentState::Resolving);
        self.path.push(id);

        let component = self.session.graph.get(id);
        let name = component.name.clone();
        let dependencies = component.dependencies.clone();
        debug!(component = %name, dependencies = dependencies.len(), "resolving");

        for dependency in &dependencies {
            let dep_id = match self.session.graph.id(dependency) {
                Some(dep_id) => dep_id,
                None => self.materialize(dependency, &name)?,
            };
            self.visit(dep_id)?;
        }

        self.process(id)?;
        self.path.pop();
        Ok(())
    }

    /// Fetch a dependency that is not in the graph and discover what it declares
    fn materialize(&mut self, name: &str, required_by: &str) -> BuildResult<ComponentId> {
        if self.session.fetched.contains(name) {
            return Err(BuildError::dependency_not_found(
                name,
                required_by,
                "it was already fetched but declares no component of that name",
            ));
        }

        let (_, checkout) = self.session.fetch_dependency(name, required_by, self.fetcher)?;
        let report = self.session.discover_in(&checkout)?;
        debug!(
            dependency = name,
            registered = report.registered.len(),
            "discovered fetched dependency"
        );

        if let Some(id) = self.session.graph.id(name) {
            return Ok(id);
        }

        // System packages install headers and libraries, not manifests
        let is_system = self
            .session
            .descriptors
            .get(name)
            .is_some_and(|d| matches!(d.source, FetchSource::System { .. }));
        if is_system {
            let component = Component::new(name, ComponentKind::External { link_name: None }, &checkout)
                .with_build_dir(self.session.layout.component_build_dir(name));
            return self.session.register(component).map_err(|duplicate| {
                BuildError::dependency_not_found(name, required_by, duplicate.to_string())
            });
        }

        Err(BuildError::dependency_not_found(
            name,
            required_by,
            format!(
                "fetched into {} but no component of that name is declared there",
                checkout.display()
            ),
        ))
    }

    fn process(&mut self, id: ComponentId) -> BuildResult<()> {
        let graph = &self.session.graph;
        let layout = &self.session.layout;
        let includes = include_paths(graph, id, layout)?;
        let link = link_plan(graph, id, layout)?;
        let action = BuildAction::for_component(graph.get(id), includes, link);

        info!(
            target = %action.target,
            kind = %action.kind,
            libraries = action.libraries.len(),
            "emitting build action"
        );
        let target = action.target.clone();
        self.engine.register(action)?;
        self.session.graph.set_state(id, ComponentState::Processed);
        self.session.emitted.push(target);
        Ok(())
    }
}
