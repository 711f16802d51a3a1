//! Build session
//!
//! A [`BuildSession`] owns all state of one build invocation: the component
//! graph, the project layout, the dependency descriptors, the fetch lock and
//! the record of what has been fetched and emitted so far. Independent
//! sessions never share state.

use crate::component::{Component, ComponentKind};
use crate::discovery::{Discovery, DiscoveryReport};
use crate::engine::BuildEngine;
use crate::error::{BuildError, BuildResult};
use crate::graph::{AlreadyRegistered, ComponentGraph, ComponentId, ComponentState};
use crate::resolver::Resolver;
use cairn_config::{Config, DiscoveryConfig, Layout};
use cairn_package::{DescriptorTable, Fetch, FetchLock, FetchOutcome, LOCKFILE_NAME};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Alias over the requested targets
pub const ALL_ALIAS: &str = "all";
/// Alias over every processed test
pub const TESTS_ALIAS: &str = "tests";

/// Summary of one `resolve_all` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub targets: usize,
    pub actions: usize,
    pub fetched: usize,
    /// Components registered during the session so far
    pub discovered: usize,
    pub elapsed: Duration,
}

/// Result of fetching one dependency outside of resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub name: String,
    pub outcome: FetchOutcome,
    pub path: PathBuf,
}

/// State of one build invocation
#[derive(Debug)]
pub struct BuildSession {
    pub(crate) graph: ComponentGraph,
    pub(crate) layout: Layout,
    pub(crate) descriptors: DescriptorTable,
    pub(crate) discovery: Discovery,
    pub(crate) lock: FetchLock,
    pub(crate) lock_path: PathBuf,
    pub(crate) lock_dirty: bool,
    /// Dependencies fetched (or found present) in this session
    pub(crate) fetched: BTreeSet<String>,
    /// Targets in emission order
    pub(crate) emitted: Vec<String>,
    pub(crate) fetch_count: usize,
    pub(crate) discovered: usize,
}

impl BuildSession {
    /// Session over a loaded configuration, with the project root discovered
    pub fn open(config: &Config) -> BuildResult<Self> {
        let mut session = Self::new(
            config.layout.clone(),
            &config.project.discovery,
            config.descriptors.clone(),
        )?;
        session.discover()?;
        Ok(session)
    }

    /// Empty session; nothing is discovered yet
    pub fn new(layout: Layout, discovery: &DiscoveryConfig, descriptors: DescriptorTable) -> BuildResult<Self> {
        let lock_path = layout.project_root.join(LOCKFILE_NAME);
        let lock = FetchLock::load_or_default(&lock_path)?;
        let lock = match lock.verify() {
            Ok(()) => lock,
            Err(reason) => {
                warn!(lockfile = %lock_path.display(), %reason, "ignoring unusable lockfile");
                FetchLock::new()
            }
        };

        Ok(Self {
            graph: ComponentGraph::new(),
            discovery: Discovery::new(&layout, discovery),
            layout,
            descriptors,
            lock,
            lock_path,
            lock_dirty: false,
            fetched: BTreeSet::new(),
            emitted: Vec::new(),
            fetch_count: 0,
            discovered: 0,
        })
    }

    /// Walk the project root
    pub fn discover(&mut self) -> BuildResult<DiscoveryReport> {
        let root = self.layout.project_root.clone();
        self.discover_in(&root)
    }

    /// Walk one subtree, merging new components into the graph
    pub fn discover_in(&mut self, root: &Path) -> BuildResult<DiscoveryReport> {
        let report = self.discovery.discover(root, &mut self.graph)?;
        self.discovered += report.registered.len();
        Ok(report)
    }

    /// Register a component directly
    pub fn register(&mut self, component: Component) -> Result<ComponentId, AlreadyRegistered> {
        let id = self.graph.register(component)?;
        self.discovered += 1;
        Ok(id)
    }

    pub fn graph(&self) -> &ComponentGraph {
        &self.graph
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn descriptors(&self) -> &DescriptorTable {
        &self.descriptors
    }

    pub fn lock(&self) -> &FetchLock {
        &self.lock
    }

    /// Targets whose action was emitted, in emission order
    pub fn emitted(&self) -> &[String] {
        &self.emitted
    }

    /// Resolve one target and everything it depends on
    ///
    /// Dependencies are processed before their dependents and each component
    /// is processed at most once per session. Returns the number of actions
    /// this call emitted.
    pub fn resolve<E, F>(&mut self, target: &str, engine: &mut E, fetcher: &F) -> BuildResult<usize>
    where
        E: BuildEngine + ?Sized,
        F: Fetch + ?Sized,
    {
        let before = self.emitted.len();
        let id = self
            .graph
            .id(target)
            .ok_or_else(|| BuildError::target_not_found(target))?;

        let result = Resolver::new(self, engine, fetcher).visit(id);
        if result.is_err() {
            self.graph.reset_resolving();
        }
        result?;

        Ok(self.emitted.len() - before)
    }

    /// Resolve several targets and declare the `all` and `tests` aliases
    ///
    /// Aliases are declared once, so call this once per engine.
    pub fn resolve_all<E, F>(&mut self, targets: &[String], engine: &mut E, fetcher: &F) -> BuildResult<BuildStats>
    where
        E: BuildEngine + ?Sized,
        F: Fetch + ?Sized,
    {
        let start = Instant::now();
        let fetched_before = self.fetch_count;
        let mut actions = 0;

        for target in targets {
            actions += self.resolve(target, engine, fetcher)?;
        }

        self.declare_alias(engine, ALL_ALIAS, targets.to_vec())?;
        let tests: Vec<String> = self
            .graph
            .in_state(ComponentState::Processed)
            .filter(|c| matches!(c.kind, ComponentKind::Test { .. }))
            .map(|c| c.name.clone())
            .collect();
        if !tests.is_empty() {
            self.declare_alias(engine, TESTS_ALIAS, tests)?;
        }

        self.save_lock()?;

        let stats = BuildStats {
            targets: targets.len(),
            actions,
            fetched: self.fetch_count - fetched_before,
            discovered: self.discovered,
            elapsed: start.elapsed(),
        };
        info!(
            targets = stats.targets,
            actions = stats.actions,
            fetched = stats.fetched,
            "resolution finished"
        );
        Ok(stats)
    }

    fn declare_alias<E>(&self, engine: &mut E, name: &str, members: Vec<String>) -> BuildResult<()>
    where
        E: BuildEngine + ?Sized,
    {
        if self.graph.contains(name) {
            warn!(alias = name, "a component uses the alias name; alias not declared");
            return Ok(());
        }
        engine.alias(name, &members)
    }

    /// Fetch dependencies without building
    ///
    /// With no names, every descriptor is fetched. Fetched trees are
    /// discovered so their components join the graph.
    pub fn fetch_all<F>(&mut self, names: &[String], fetcher: &F) -> BuildResult<Vec<FetchReport>>
    where
        F: Fetch + ?Sized,
    {
        let names: Vec<String> = if names.is_empty() {
            self.descriptors.names().map(str::to_string).collect()
        } else {
            names.to_vec()
        };

        let mut reports = Vec::with_capacity(names.len());
        for name in names {
            let (outcome, path) = self.fetch_dependency(&name, "command line", fetcher)?;
            self.discover_in(&path)?;
            reports.push(FetchReport { name, outcome, path });
        }
        self.save_lock()?;
        Ok(reports)
    }

    /// Fetch one dependency into its checkout directory
    pub(crate) fn fetch_dependency<F>(
        &mut self,
        name: &str,
        required_by: &str,
        fetcher: &F,
    ) -> BuildResult<(FetchOutcome, PathBuf)>
    where
        F: Fetch + ?Sized,
    {
        let descriptor = self.descriptors.get(name).cloned().ok_or_else(|| {
            BuildError::dependency_not_found(
                name,
                required_by,
                "it is not registered and has no entry under [dependencies]",
            )
        })?;
        let target = self.layout.dependency_dir(name);

        debug!(dependency = name, target = %target.display(), "fetching");
        let outcome = fetcher
            .fetch(&descriptor, &target)
            .map_err(|source| BuildError::Fetch {
                name: name.to_string(),
                source,
            })?;

        match outcome {
            FetchOutcome::Fetched => {
                info!(dependency = name, source = descriptor.source.kind_name(), "fetched");
                self.lock.record(&descriptor);
                self.lock_dirty = true;
                self.fetch_count += 1;
            }
            FetchOutcome::AlreadyPresent => {
                if self.lock.is_stale(&descriptor) {
                    warn!(
                        dependency = name,
                        path = %target.display(),
                        "descriptor changed since this dependency was fetched; delete the directory to fetch it again"
                    );
                } else if self.lock.get(name).is_none() {
                    self.lock.record(&descriptor);
                    self.lock_dirty = true;
                }
            }
        }
        self.fetched.insert(name.to_string());
        Ok((outcome, target))
    }

    /// Write `cairn.lock` if anything changed
    pub fn save_lock(&mut self) -> BuildResult<()> {
        if !self.lock_dirty {
            return Ok(());
        }
        self.lock.write_to_file(&self.lock_path)?;
        self.lock_dirty = false;
        debug!(lockfile = %self.lock_path.display(), "wrote lockfile");
        Ok(())
    }
}
