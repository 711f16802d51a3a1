//! Component graph arena
//!
//! Nodes live in a `Vec` indexed by [`ComponentId`]; a name map gives lookup
//! by component name. Nodes are never removed or overwritten, so ids stay
//! valid for the lifetime of the graph.

use crate::component::{is_conventional_name, Component};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

/// Index of a node in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(usize);

impl ComponentId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Resolution state of a registered component
///
/// A name missing from the graph is unregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Registered,
    /// On the resolver's current path
    Resolving,
    /// Build action emitted; terminal
    Processed,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered => write!(f, "registered"),
            Self::Resolving => write!(f, "resolving"),
            Self::Processed => write!(f, "processed"),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    component: Component,
    state: ComponentState,
}

/// Rejected registration; the first component under that name is kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlreadyRegistered {
    pub name: String,
    pub existing: ComponentId,
    /// Manifest of the component that stays registered
    pub first: PathBuf,
    /// Whether the rejected component came from that same manifest
    pub same_origin: bool,
}

impl fmt::Display for AlreadyRegistered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "component '{}' is already registered from {}",
            self.name,
            self.first.display()
        )
    }
}

/// Name-indexed arena of components
#[derive(Debug, Clone, Default)]
pub struct ComponentGraph {
    nodes: Vec<Node>,
    by_name: HashMap<String, ComponentId>,
}

impl ComponentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component
    ///
    /// A name that does not follow the lowercase convention is accepted with a
    /// warning. A name already present is rejected and the graph is left as is.
    pub fn register(&mut self, component: Component) -> Result<ComponentId, AlreadyRegistered> {
        if let Some(&existing) = self.by_name.get(&component.name) {
            let first = self.nodes[existing.0].component.manifest.clone();
            return Err(AlreadyRegistered {
                same_origin: first == component.manifest,
                name: component.name,
                existing,
                first,
            });
        }

        if !is_conventional_name(&component.name) {
            warn!(
                component = %component.name,
                manifest = %component.manifest.display(),
                "component names should be lowercase"
            );
        }

        let id = ComponentId(self.nodes.len());
        self.by_name.insert(component.name.clone(), id);
        self.nodes.push(Node {
            component,
            state: ComponentState::Registered,
        });
        Ok(id)
    }

    pub fn id(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    /// Look up a component by name
    pub fn lookup(&self, name: &str) -> Option<&Component> {
        self.id(name).map(|id| self.get(id))
    }

    pub fn get(&self, id: ComponentId) -> &Component {
        &self.nodes[id.0].component
    }

    pub fn state(&self, id: ComponentId) -> ComponentState {
        self.nodes[id.0].state
    }

    /// State by name; `None` means unregistered
    pub fn state_of(&self, name: &str) -> Option<ComponentState> {
        self.id(name).map(|id| self.state(id))
    }

    /// Move a node to `state`
    ///
    /// Processed is terminal; attempts to leave it are ignored.
    pub(crate) fn set_state(&mut self, id: ComponentId, state: ComponentState) {
        let node = &mut self.nodes[id.0];
        if node.state != ComponentState::Processed {
            node.state = state;
        }
    }

    /// Return every node left on a failed resolution path to `Registered`
    pub(crate) fn reset_resolving(&mut self) {
        for node in &mut self.nodes {
            if node.state == ComponentState::Resolving {
                node.state = ComponentState::Registered;
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Components in registration order
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (ComponentId(index), &node.component))
    }

    /// Components currently in `state`, in registration order
    pub fn in_state(&self, state: ComponentState) -> impl Iterator<Item = &Component> {
        self.nodes
            .iter()
            .filter(move |node| node.state == state)
            .map(|node| &node.component)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
