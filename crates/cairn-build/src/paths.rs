//! Transitive include paths and link libraries
//!
//! Both walks follow dependency edges depth first from one component. The
//! component itself sits at depth 0, its direct dependencies at depth 1.
//! Shared sub-graphs are expanded once for includes and once per new maximum
//! depth for libraries, so diamonds stay linear.

use crate::component::{Component, ComponentKind};
use crate::error::{BuildError, BuildResult};
use crate::graph::{ComponentGraph, ComponentId};
use cairn_config::Layout;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::PathBuf;

/// One library to link, with the depth it was found at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkLibrary {
    /// Name passed as `-l<name>`
    pub name: String,
    pub depth: usize,
    /// Directory the library is expected in
    pub search_dir: PathBuf,
}

/// Linker inputs for one component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPlan {
    pub libraries: Vec<LinkLibrary>,
    pub search_paths: Vec<PathBuf>,
}

impl LinkPlan {
    pub fn library_names(&self) -> Vec<String> {
        self.libraries.iter().map(|lib| lib.name.clone()).collect()
    }
}

/// Include directories needed to compile `id`
///
/// The component's own headers come first, then the installed headers root,
/// then whatever each dependency contributes. Installed kinds contribute
/// directories under the installed headers root; everything else contributes
/// directories under its own source directory. First occurrence wins.
pub fn include_paths(graph: &ComponentGraph, id: ComponentId, layout: &Layout) -> BuildResult<Vec<PathBuf>> {
    let component = graph.get(id);
    let mut paths: Vec<PathBuf> = component.local_header_dirs().collect();
    paths.extend(component.external_header_dirs.iter().cloned());
    paths.push(layout.include_dir.clone());

    let mut stack = vec![id];
    let mut expanded = HashSet::new();
    collect_includes(graph, id, layout, &mut stack, &mut expanded, &mut paths)?;
    Ok(dedup_stable(paths))
}

fn collect_includes(
    graph: &ComponentGraph,
    id: ComponentId,
    layout: &Layout,
    stack: &mut Vec<ComponentId>,
    expanded: &mut HashSet<ComponentId>,
    paths: &mut Vec<PathBuf>,
) -> BuildResult<()> {
    let component = graph.get(id);
    for dep_id in dependency_ids(graph, component, stack)? {
        let dep = graph.get(dep_id);
        if dep.kind.is_installed() {
            if dep.header_dirs.is_empty() {
                paths.push(layout.include_dir.clone());
            } else {
                paths.extend(dep.header_dirs.iter().map(|dir| layout.include_dir.join(dir)));
            }
        } else {
            paths.extend(dep.local_header_dirs());
        }
        paths.extend(dep.external_header_dirs.iter().cloned());

        // Everything below an expanded node is already in `paths`
        if !expanded.insert(dep_id) {
            continue;
        }
        stack.push(dep_id);
        collect_includes(graph, dep_id, layout, stack, expanded, paths)?;
        stack.pop();
    }
    Ok(())
}

/// Libraries and search paths needed to link `id`
///
/// Every linkable dependency at depth one or more is recorded. When the same
/// link name is reached more than once, the deepest occurrence is kept (the
/// first one found on a tie). The result is ordered by ascending depth, then
/// by name, so direct dependencies precede the libraries they pull in.
pub fn link_plan(graph: &ComponentGraph, id: ComponentId, layout: &Layout) -> BuildResult<LinkPlan> {
    let mut walk = LibraryWalk {
        graph,
        layout,
        stack: vec![id],
        deepest: HashMap::new(),
        found: Vec::new(),
        search_paths: Vec::new(),
    };
    walk.collect(id, 1)?;
    let LibraryWalk {
        found,
        mut search_paths,
        ..
    } = walk;
    search_paths.push(layout.lib_dir.clone());

    let mut libraries: Vec<LinkLibrary> = Vec::new();
    for lib in found {
        match libraries.iter_mut().find(|kept| kept.name == lib.name) {
            Some(kept) if lib.depth > kept.depth => *kept = lib,
            Some(_) => {}
            None => libraries.push(lib),
        }
    }
    libraries.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.name.cmp(&b.name)));

    Ok(LinkPlan {
        libraries,
        search_paths: dedup_stable(search_paths),
    })
}

struct LibraryWalk<'a> {
    graph: &'a ComponentGraph,
    layout: &'a Layout,
    stack: Vec<ComponentId>,
    /// Deepest depth each node has been expanded at
    deepest: HashMap<ComponentId, usize>,
    found: Vec<LinkLibrary>,
    search_paths: Vec<PathBuf>,
}

impl LibraryWalk<'_> {
    fn collect(&mut self, id: ComponentId, depth: usize) -> BuildResult<()> {
        let graph = self.graph;
        for dep_id in dependency_ids(graph, graph.get(id), &self.stack)? {
            let dep = graph.get(dep_id);
            let is_static = matches!(dep.kind, ComponentKind::StaticLibrary { .. });
            if is_static {
                self.search_paths.push(dep.build_dir.clone());
            }
            if let Some(link_name) = dep.link_name() {
                self.found.push(LinkLibrary {
                    name: link_name.to_string(),
                    depth,
                    search_dir: if is_static {
                        dep.build_dir.clone()
                    } else {
                        self.layout.lib_dir.clone()
                    },
                });
            }

            // A shallower or equal revisit cannot deepen anything below it
            if self.deepest.get(&dep_id).is_some_and(|&seen| seen >= depth) {
                continue;
            }
            self.deepest.insert(dep_id, depth);
            self.stack.push(dep_id);
            self.collect(dep_id, depth + 1)?;
            self.stack.pop();
        }
        Ok(())
    }
}

/// Resolve the dependencies of `component`, failing on unknown names and on
/// any edge back into the current walk
fn dependency_ids(
    graph: &ComponentGraph,
    component: &Component,
    stack: &[ComponentId],
) -> BuildResult<Vec<ComponentId>> {
    component
        .dependencies
        .iter()
        .map(|name| {
            let dep_id = graph.id(name).ok_or_else(|| {
                BuildError::dependency_not_found(name, &component.name, "not registered")
            })?;
            if let Some(start) = stack.iter().position(|&on_path| on_path == dep_id) {
                return Err(BuildError::CircularDependency(cycle_path(graph, &stack[start..], dep_id)));
            }
            Ok(dep_id)
        })
        .collect()
}

/// Render `a -> b -> a`
pub(crate) fn cycle_path(graph: &ComponentGraph, path: &[ComponentId], back_to: ComponentId) -> String {
    path.iter()
        .chain(std::iter::once(&back_to))
        .map(|&id| graph.get(id).name.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Drop repeated items, keeping the first occurrence of each
pub(crate) fn dedup_stable<T: Clone + Eq + Hash>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn layout() -> Layout {
        Layout::with_defaults("/proj")
    }

    fn static_lib() -> ComponentKind {
        ComponentKind::StaticLibrary {
            sources: vec![PathBuf::from("lib.c")],
        }
    }

    fn add(graph: &mut ComponentGraph, name: &str, kind: ComponentKind, deps: &[&str]) -> ComponentId {
        let component = Component::new(name, kind, format!("/proj/{}", name))
            .with_build_dir(format!("/proj/build/{}", name))
            .with_dependencies(deps.iter().map(|d| d.to_string()).collect());
        graph.register(component).unwrap()
    }

    #[test]
    fn test_own_headers_then_install_root() {
        let mut graph = ComponentGraph::new();
        let component = Component::new("core", static_lib(), "/proj/core")
            .with_header_dirs(vec![PathBuf::from("include")])
            .with_external_header_dirs(vec![PathBuf::from("/opt/vendor/include")]);
        let id = graph.register(component).unwrap();

        assert_eq!(
            include_paths(&graph, id, &layout()).unwrap(),
            vec![
                PathBuf::from("/proj/core/include"),
                PathBuf::from("/opt/vendor/include"),
                PathBuf::from("/proj/build/install/include"),
            ]
        );
    }

    #[test]
    fn test_installed_dependency_headers_use_install_root() {
        let mut graph = ComponentGraph::new();
        let ssl = Component::new(
            "ssl",
            ComponentKind::Autotools {
                configure_args: vec![],
                link_name: None,
            },
            "/proj/deps/ssl",
        )
        .with_header_dirs(vec![PathBuf::from("openssl")]);
        graph.register(ssl).unwrap();
        let local = Component::new("util", ComponentKind::HeaderOnly, "/proj/util")
            .with_header_dirs(vec![PathBuf::from("inc")]);
        graph.register(local).unwrap();
        let app = add(
            &mut graph,
            "app",
            ComponentKind::Program {
                sources: vec![PathBuf::from("main.c")],
            },
            &["ssl", "util"],
        );

        assert_eq!(
            include_paths(&graph, app, &layout()).unwrap(),
            vec![
                PathBuf::from("/proj/build/install/include"),
                PathBuf::from("/proj/build/install/include/openssl"),
                PathBuf::from("/proj/util/inc"),
            ]
        );
    }

    #[test]
    fn test_shared_include_dir_appears_once() {
        let mut graph = ComponentGraph::new();
        for name in ["left", "right"] {
            let component = Component::new(name, ComponentKind::HeaderOnly, format!("/proj/{}", name))
                .with_external_header_dirs(vec![PathBuf::from("/inc/common")]);
            graph.register(component).unwrap();
        }
        let top = add(&mut graph, "top", ComponentKind::HeaderOnly, &["left", "right"]);

        let paths = include_paths(&graph, top, &layout()).unwrap();
        let common: Vec<_> = paths.iter().filter(|p| *p == &PathBuf::from("/inc/common")).collect();
        assert_eq!(common.len(), 1);
        assert_eq!(paths[1], PathBuf::from("/inc/common"));
    }

    #[test]
    fn test_link_plan_for_program() {
        let mut graph = ComponentGraph::new();
        add(&mut graph, "core", static_lib(), &[]);
        let app = add(
            &mut graph,
            "app",
            ComponentKind::Program {
                sources: vec![PathBuf::from("main.c")],
            },
            &["core"],
        );

        let plan = link_plan(&graph, app, &layout()).unwrap();
        assert_eq!(plan.library_names(), vec!["core"]);
        assert_eq!(
            plan.search_paths,
            vec![
                PathBuf::from("/proj/build/core"),
                PathBuf::from("/proj/build/install/lib"),
            ]
        );
    }

    #[test]
    fn test_link_order_by_depth_then_name() {
        let mut graph = ComponentGraph::new();
        add(&mut graph, "zlib", ComponentKind::External { link_name: Some("z".into()) }, &[]);
        add(&mut graph, "net", static_lib(), &["zlib"]);
        add(&mut graph, "log", static_lib(), &[]);
        add(&mut graph, "hdr", ComponentKind::HeaderOnly, &[]);
        let app = add(
            &mut graph,
            "app",
            ComponentKind::Program {
                sources: vec![PathBuf::from("main.c")],
            },
            &["net", "log", "hdr"],
        );

        let plan = link_plan(&graph, app, &layout()).unwrap();
        assert_eq!(plan.library_names(), vec!["log", "net", "z"]);
        assert_eq!(plan.libraries[2].depth, 2);
    }

    #[test]
    fn test_cycle_in_walk_is_reported() {
        let mut graph = ComponentGraph::new();
        let a = add(&mut graph, "a", ComponentKind::HeaderOnly, &["b"]);
        add(&mut graph, "b", ComponentKind::HeaderOnly, &["a"]);

        let err = include_paths(&graph, a, &layout()).unwrap_err();
        assert!(matches!(err, BuildError::CircularDependency(ref path) if path == "a -> b -> a"));
        assert!(link_plan(&graph, a, &layout()).is_err());
    }

    #[test]
    fn test_unregistered_dependency_in_walk() {
        let mut graph = ComponentGraph::new();
        let a = add(&mut graph, "a", ComponentKind::HeaderOnly, &["ghost"]);
        let err = link_plan(&graph, a, &layout()).unwrap_err();
        assert!(matches!(err, BuildError::DependencyNotFound { ref name, .. } if name == "ghost"));
    }

    #[test]
    fn test_dedup_stable() {
        assert_eq!(dedup_stable(vec![3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    /// Chain `prefix-1 -> ... -> prefix-(len-1) -> leaf` of header-only links
    fn chain(graph: &mut ComponentGraph, prefix: &str, len: usize, leaf: &str) -> String {
        let mut next = leaf.to_string();
        for step in (1..len).rev() {
            let name = format!("{}-{}", prefix, step);
            add(graph, &name, ComponentKind::HeaderOnly, &[next.as_str()]);
            next = name;
        }
        next
    }

    proptest! {
        #[test]
        fn prop_deepest_occurrence_wins(shallow in 1usize..4, extra in 1usize..5, external_deeper in any::<bool>()) {
            let deep = shallow + extra;
            let (static_depth, external_depth) = if external_deeper {
                (shallow, deep)
            } else {
                (deep, shallow)
            };

            let mut graph = ComponentGraph::new();
            add(&mut graph, "z", static_lib(), &[]);
            add(&mut graph, "system-z", ComponentKind::External { link_name: Some("z".into()) }, &[]);
            let via_static = chain(&mut graph, "s", static_depth, "z");
            let via_external = chain(&mut graph, "e", external_depth, "system-z");
            let root = add(
                &mut graph,
                "root",
                ComponentKind::Program { sources: vec![PathBuf::from("main.c")] },
                &[via_static.as_str(), via_external.as_str()],
            );

            let plan = link_plan(&graph, root, &layout()).unwrap();
            prop_assert_eq!(plan.libraries.len(), 1);
            let lib = &plan.libraries[0];
            prop_assert_eq!(lib.name.as_str(), "z");
            prop_assert_eq!(lib.depth, deep);
            let expected = if external_deeper {
                layout().lib_dir
            } else {
                PathBuf::from("/proj/build/z")
            };
            prop_assert_eq!(&lib.search_dir, &expected);
        }
    }

    #[test]
    fn test_depth_two_versus_depth_four() {
        let mut graph = ComponentGraph::new();
        add(&mut graph, "z", static_lib(), &[]);
        add(&mut graph, "system-z", ComponentKind::External { link_name: Some("z".into()) }, &[]);
        let short = chain(&mut graph, "s", 2, "z");
        let long = chain(&mut graph, "e", 4, "system-z");
        let root = add(&mut graph, "root", ComponentKind::HeaderOnly, &[short.as_str(), long.as_str()]);

        let plan = link_plan(&graph, root, &layout()).unwrap();
        assert_eq!(
            plan.libraries,
            vec![LinkLibrary {
                name: "z".to_string(),
                depth: 4,
                search_dir: PathBuf::from("/proj/build/install/lib"),
            }]
        );
    }

    /// Each layer has two components that both depend on both components
    /// of the next layer; every path through the ladder is distinct
    fn ladder(graph: &mut ComponentGraph, layers: usize) -> ComponentId {
        for layer in (0..layers).rev() {
            let next = [format!("a{}", layer + 1), format!("b{}", layer + 1)];
            let deps: Vec<String> = if layer + 1 < layers {
                next.to_vec()
            } else {
                Vec::new()
            };
            for side in ["a", "b"] {
                let name = format!("{}{}", side, layer);
                let component = Component::new(name.as_str(), static_lib(), format!("/proj/{}", name))
                    .with_build_dir(format!("/proj/build/{}", name))
                    .with_header_dirs(vec![PathBuf::from("include")])
                    .with_dependencies(deps.clone());
                graph.register(component).unwrap();
            }
        }
        add(graph, "top", ComponentKind::HeaderOnly, &["a0", "b0"])
    }

    #[test]
    fn test_deep_diamond_ladder() {
        let layers = 40;
        let mut graph = ComponentGraph::new();
        let top = ladder(&mut graph, layers);

        let plan = link_plan(&graph, top, &layout()).unwrap();
        assert_eq!(plan.libraries.len(), layers * 2);
        assert_eq!(plan.libraries[0].name, "a0");
        assert_eq!(plan.libraries[1].name, "b0");
        let last = plan.libraries.last().unwrap();
        assert_eq!(last.name, format!("b{}", layers - 1));
        assert_eq!(last.depth, layers);
        // every static build dir, then the installed library root
        assert_eq!(plan.search_paths.len(), layers * 2 + 1);

        let includes = include_paths(&graph, top, &layout()).unwrap();
        assert_eq!(includes.len(), layers * 2 + 1);
        assert_eq!(includes[1], PathBuf::from("/proj/a0/include"));
        assert_eq!(includes[2], PathBuf::from("/proj/a1/include"));
    }

    #[test]
    fn test_revisit_at_greater_depth_deepens_subtree() {
        let mut graph = ComponentGraph::new();
        add(&mut graph, "leaf", static_lib(), &[]);
        add(&mut graph, "mid", static_lib(), &["leaf"]);
        add(&mut graph, "long2", static_lib(), &["mid"]);
        add(&mut graph, "long1", static_lib(), &["long2"]);
        let root = add(&mut graph, "root", ComponentKind::HeaderOnly, &["mid", "long1"]);

        let plan = link_plan(&graph, root, &layout()).unwrap();
        let depth_of = |name: &str| {
            plan.libraries
                .iter()
                .find(|lib| lib.name == name)
                .map(|lib| lib.depth)
        };
        assert_eq!(depth_of("mid"), Some(3));
        assert_eq!(depth_of("leaf"), Some(4));
        assert_eq!(plan.library_names(), vec!["long1", "long2", "mid", "leaf"]);
    }
}
