//! Module dependency graph for a single resolution run
//!
//! The graph owns every [`ModuleRecord`] discovered in a run, keyed by
//! canonical path in discovery order, plus a petgraph `DiGraph` with one edge
//! per (importer -> dependency). Cycle detection and topological ordering are
//! separate depth-first passes seeded in discovery order, so results are
//! reproducible for an unchanged source tree.

use std::path::{Path, PathBuf};

use log::{debug, trace};
use petgraph::{
    Direction,
    algo::is_cyclic_directed,
    graph::{DiGraph, NodeIndex},
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    error::{BuildError, Result},
    syntax::{ExportDeclaration, ImportDeclaration},
    types::FxIndexMap,
};

/// Unique identifier for a module within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Parsed representation of one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Canonical absolute path, unique per run
    pub path: PathBuf,
    /// Path relative to the source root, `/`-separated
    pub relative_path: String,
    /// File content at parse time
    pub content: String,
    pub imports: Vec<ImportDeclaration>,
    pub exports: Vec<ExportDeclaration>,
    /// Local modules this one imports, de-duplicated, in import order
    pub dependencies: Vec<PathBuf>,
}

impl ModuleRecord {
    pub fn has_default_export(&self) -> bool {
        self.exports.iter().any(ExportDeclaration::is_default)
    }

    pub fn exports_name(&self, name: &str) -> bool {
        self.exports.iter().any(|export| export.name() == name)
    }
}

/// Color for DFS traversal (three-color marking)
#[derive(Debug, Clone, Copy, PartialEq)]
enum Color {
    White, // Not visited
    Gray,  // On the recursion stack
    Black, // Finished visiting
}

/// State for the cycle search
struct CycleSearchState {
    visited: FxHashMap<NodeIndex, Color>,
    path: Vec<NodeIndex>,
    cycle: Option<Vec<NodeIndex>>,
}

#[derive(Debug)]
pub struct ModuleGraph {
    /// All modules, in discovery order; position equals `ModuleId`
    modules: FxIndexMap<PathBuf, ModuleRecord>,
    /// Edges point from importer to dependency
    graph: DiGraph<ModuleId, ()>,
    node_indices: FxHashMap<ModuleId, NodeIndex>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self {
            modules: FxIndexMap::default(),
            graph: DiGraph::new(),
            node_indices: FxHashMap::default(),
        }
    }

    /// Add a module; a path that is already present keeps its first record
    pub fn add_module(&mut self, record: ModuleRecord) -> ModuleId {
        if let Some(index) = self.modules.get_index_of(&record.path) {
            log::warn!("Module {} registered twice, keeping the first record", record.relative_path);
            return ModuleId::new(index as u32);
        }

        let id = ModuleId::new(self.modules.len() as u32);
        debug!("Registered module '{}' as {id:?}", record.relative_path);
        self.modules.insert(record.path.clone(), record);
        let node_idx = self.graph.add_node(id);
        self.node_indices.insert(id, node_idx);
        id
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn module(&self, id: ModuleId) -> Option<&ModuleRecord> {
        self.modules.get_index(id.index()).map(|(_, record)| record)
    }

    pub fn module_by_path(&self, path: &Path) -> Option<&ModuleRecord> {
        self.modules.get(path)
    }

    pub fn id_of(&self, path: &Path) -> Option<ModuleId> {
        self.modules
            .get_index_of(path)
            .map(|index| ModuleId::new(index as u32))
    }

    /// Iterate modules in discovery order
    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &ModuleRecord)> {
        self.modules
            .values()
            .enumerate()
            .map(|(index, record)| (ModuleId::new(index as u32), record))
    }

    /// Create the edges for every recorded dependency.
    ///
    /// Fails if a dependency has no record in this graph.
    pub fn link_dependencies(&mut self) -> Result<()> {
        let mut edges = Vec::new();
        for (from, record) in self.modules() {
            // neighbors() yields the newest edge first, so insert in reverse to
            // walk dependencies in import order
            for dependency in record.dependencies.iter().rev() {
                let Some(to) = self.id_of(dependency) else {
                    return Err(BuildError::Internal(format!(
                        "{} depends on {} which is not part of the module table",
                        record.relative_path,
                        dependency.display()
                    )));
                };
                edges.push((from, to));
            }
        }

        for (from, to) in edges {
            let (from_idx, to_idx) = (self.node_indices[&from], self.node_indices[&to]);
            if !self.graph.contains_edge(from_idx, to_idx) {
                self.graph.add_edge(from_idx, to_idx, ());
            }
        }
        Ok(())
    }

    /// Direct dependencies of a module, in import order
    pub fn dependencies(&self, module_id: ModuleId) -> Vec<ModuleId> {
        self.neighbors(module_id, Direction::Outgoing)
    }

    /// Modules that import the given module directly
    pub fn dependents(&self, module_id: ModuleId) -> Vec<ModuleId> {
        self.neighbors(module_id, Direction::Incoming)
    }

    fn neighbors(&self, module_id: ModuleId, direction: Direction) -> Vec<ModuleId> {
        self.node_indices
            .get(&module_id)
            .map(|&node_idx| {
                self.graph
                    .neighbors_directed(node_idx, direction)
                    .map(|idx| self.graph[idx])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check if the graph has cycles
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Find the first cycle reachable in discovery order.
    ///
    /// The returned path starts at the cycle's entry point and ends with that
    /// same module, so each consecutive pair is an import edge.
    pub fn find_cycle(&self) -> Option<Vec<ModuleId>> {
        if !self.has_cycles() {
            return None;
        }

        let mut state = CycleSearchState {
            visited: self
                .graph
                .node_indices()
                .map(|idx| (idx, Color::White))
                .collect(),
            path: Vec::new(),
            cycle: None,
        };

        for node_idx in self.graph.node_indices() {
            if state.visited[&node_idx] == Color::White {
                self.dfs_find_cycle(node_idx, &mut state);
            }
            if let Some(cycle) = state.cycle.take() {
                return Some(cycle.into_iter().map(|idx| self.graph[idx]).collect());
            }
        }
        None
    }

    /// DFS helper for finding a cycle; stops at the first one
    fn dfs_find_cycle(&self, node: NodeIndex, state: &mut CycleSearchState) {
        state.visited.insert(node, Color::Gray);
        state.path.push(node);

        for neighbor in self.graph.neighbors_directed(node, Direction::Outgoing) {
            if state.cycle.is_some() {
                return;
            }
            match state.visited.get(&neighbor).copied().unwrap_or(Color::White) {
                Color::White => self.dfs_find_cycle(neighbor, state),
                Color::Gray => {
                    if let Some(start_pos) = state.path.iter().position(|&n| n == neighbor) {
                        let mut cycle = state.path[start_pos..].to_vec();
                        cycle.push(neighbor);
                        state.cycle = Some(cycle);
                    }
                    return;
                }
                Color::Black => {}
            }
        }

        state.path.pop();
        state.visited.insert(node, Color::Black);
    }

    /// Relative paths for a sequence of module ids
    pub fn relative_paths(&self, ids: &[ModuleId]) -> Vec<String> {
        ids.iter()
            .filter_map(|&id| self.module(id).map(|record| record.relative_path.clone()))
            .collect()
    }

    /// Depth-first post-order over the whole graph.
    ///
    /// Seeds follow discovery order so disconnected modules are included and
    /// independent modules keep their sorted-filename order.
    pub fn topological_order(&self) -> Vec<ModuleId> {
        let mut visited = FxHashSet::default();
        let mut order = Vec::with_capacity(self.len());
        for node_idx in self.graph.node_indices() {
            self.visit_post_order(node_idx, &mut visited, &mut order);
        }
        order
    }

    fn visit_post_order(
        &self,
        node: NodeIndex,
        visited: &mut FxHashSet<NodeIndex>,
        order: &mut Vec<ModuleId>,
    ) {
        if !visited.insert(node) {
            return;
        }
        for neighbor in self.graph.neighbors_directed(node, Direction::Outgoing) {
            self.visit_post_order(neighbor, visited, order);
        }
        trace!("ordered {:?}", self.graph[node]);
        order.push(self.graph[node]);
    }

    /// Consume the graph and return its records in the given order.
    ///
    /// Duplicate ids are dropped; an id without a record is an internal error.
    pub fn into_ordered_records(self, order: &[ModuleId]) -> Result<Vec<ModuleRecord>> {
        let mut slots: Vec<Option<ModuleRecord>> = self.modules.into_values().map(Some).collect();
        let mut seen = FxHashSet::default();
        let mut records = Vec::with_capacity(order.len());
        for &id in order {
            if !seen.insert(id) {
                continue;
            }
            let record = slots
                .get_mut(id.index())
                .and_then(Option::take)
                .ok_or_else(|| {
                    BuildError::Internal(format!("{id:?} is in the order but not in the module table"))
                })?;
            records.push(record);
        }
        Ok(records)
    }
}

impl Default for ModuleGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn path(name: &str) -> PathBuf {
        PathBuf::from(format!("/src/{name}"))
    }

    fn record(name: &str, deps: &[&str]) -> ModuleRecord {
        ModuleRecord {
            path: path(name),
            relative_path: name.to_owned(),
            content: String::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            dependencies: deps.iter().map(|dep| path(dep)).collect(),
        }
    }

    fn graph_of(records: Vec<ModuleRecord>) -> ModuleGraph {
        let mut graph = ModuleGraph::new();
        for record in records {
            graph.add_module(record);
        }
        graph.link_dependencies().expect("dependencies should link");
        graph
    }

    fn ordered_names(graph: &ModuleGraph) -> Vec<String> {
        graph.relative_paths(&graph.topological_order())
    }

    #[test]
    fn test_three_module_chain() {
        let graph = graph_of(vec![
            record("a.js", &["b.js"]),
            record("b.js", &["c.js"]),
            record("c.js", &[]),
        ]);
        assert!(graph.find_cycle().is_none());
        assert_eq!(ordered_names(&graph), vec!["c.js", "b.js", "a.js"]);
    }

    #[test]
    fn test_independent_modules_keep_discovery_order() {
        let graph = graph_of(vec![
            record("a.js", &[]),
            record("b.js", &["d.js", "c.js"]),
            record("c.js", &[]),
            record("d.js", &[]),
            record("e.js", &[]),
        ]);
        assert_eq!(
            ordered_names(&graph),
            vec!["a.js", "d.js", "c.js", "b.js", "e.js"]
        );
    }

    #[test]
    fn test_dependencies_follow_import_order() {
        let graph = graph_of(vec![
            record("main.js", &["z.js", "a.js", "m.js"]),
            record("a.js", &[]),
            record("m.js", &[]),
            record("z.js", &[]),
        ]);
        let main = graph.id_of(&path("main.js")).expect("main.js is registered");
        assert_eq!(
            graph.relative_paths(&graph.dependencies(main)),
            vec!["z.js", "a.js", "m.js"]
        );
        let a = graph.id_of(&path("a.js")).expect("a.js is registered");
        assert_eq!(graph.dependents(a), vec![main]);
    }

    #[test]
    fn test_cyclic_pair() {
        let graph = graph_of(vec![record("a.js", &["b.js"]), record("b.js", &["a.js"])]);
        assert!(graph.has_cycles());
        let cycle = graph.find_cycle().expect("cycle should be found");
        assert_eq!(graph.relative_paths(&cycle), vec!["a.js", "b.js", "a.js"]);
    }

    #[test]
    fn test_cycle_path_starts_at_entry_point() {
        // main -> a -> b -> c -> a
        let graph = graph_of(vec![
            record("a.js", &["b.js"]),
            record("b.js", &["c.js"]),
            record("c.js", &["a.js"]),
            record("main.js", &["a.js"]),
        ]);
        let cycle = graph.find_cycle().expect("cycle should be found");
        assert_eq!(
            graph.relative_paths(&cycle),
            vec!["a.js", "b.js", "c.js", "a.js"]
        );
    }

    #[test]
    fn test_self_import_is_a_cycle() {
        let graph = graph_of(vec![record("a.js", &["a.js"])]);
        let cycle = graph.find_cycle().expect("self import is a cycle");
        assert_eq!(graph.relative_paths(&cycle), vec!["a.js", "a.js"]);
    }

    #[test]
    fn test_missing_dependency_is_internal_error() {
        let mut graph = ModuleGraph::new();
        graph.add_module(record("a.js", &["ghost.js"]));
        let err = graph.link_dependencies().unwrap_err();
        assert!(matches!(err, BuildError::Internal(_)));
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut graph = ModuleGraph::new();
        let first = graph.add_module(record("a.js", &[]));
        let second = graph.add_module(record("a.js", &["b.js"]));
        assert_eq!(first, second);
        assert_eq!(graph.len(), 1);
        assert!(graph.module(first).is_some_and(|m| m.dependencies.is_empty()));
    }

    #[test]
    fn test_into_ordered_records_deduplicates() {
        let graph = graph_of(vec![record("a.js", &[]), record("b.js", &["a.js"])]);
        let a = graph.id_of(&path("a.js")).expect("a.js is registered");
        let b = graph.id_of(&path("b.js")).expect("b.js is registered");
        let records = graph
            .into_ordered_records(&[a, b, a])
            .expect("records should be returned");
        let names: Vec<_> = records.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(names, vec!["a.js", "b.js"]);
    }

    #[test]
    fn test_into_ordered_records_rejects_unknown_id() {
        let graph = graph_of(vec![record("a.js", &[])]);
        let err = graph
            .into_ordered_records(&[ModuleId::new(7)])
            .unwrap_err();
        assert!(matches!(err, BuildError::Internal(_)));
    }

    /// Random acyclic graph: node `i` may only depend on nodes `< i`, and
    /// nodes are registered in a shuffled order.
    fn acyclic_graph_strategy() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
        (2usize..=50).prop_flat_map(|n| {
            let deps = prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..4), n)
                .prop_map(|picks| {
                    picks
                        .into_iter()
                        .enumerate()
                        .map(|(i, picks)| {
                            if i == 0 {
                                Vec::new()
                            } else {
                                let mut deps: Vec<usize> =
                                    picks.iter().map(|pick| pick.index(i)).collect();
                                deps.dedup();
                                deps
                            }
                        })
                        .collect::<Vec<_>>()
                });
            let registration = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
            (deps, registration)
        })
    }

    fn build(deps: &[Vec<usize>], registration: &[usize]) -> ModuleGraph {
        let names: Vec<String> = (0..deps.len()).map(|i| format!("m{i}.js")).collect();
        let records = registration.iter().map(|&i| {
            let mut dep_names: Vec<&str> = Vec::new();
            for &d in &deps[i] {
                if !dep_names.contains(&names[d].as_str()) {
                    dep_names.push(&names[d]);
                }
            }
            record(&names[i], &dep_names)
        });
        graph_of(records.collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_topological_order_puts_dependencies_first(
            (deps, registration) in acyclic_graph_strategy()
        ) {
            let graph = build(&deps, &registration);
            prop_assert!(graph.find_cycle().is_none());

            let order = graph.topological_order();
            prop_assert_eq!(order.len(), graph.len());
            let unique: FxHashSet<_> = order.iter().collect();
            prop_assert_eq!(unique.len(), order.len());

            let position: FxHashMap<ModuleId, usize> =
                order.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();
            for (id, _) in graph.modules() {
                for dep in graph.dependencies(id) {
                    prop_assert!(position[&dep] < position[&id]);
                }
            }
        }

        #[test]
        fn prop_detected_cycle_walks_back_to_start(
            (mut deps, registration) in acyclic_graph_strategy(),
            ring_len in 2usize..=6,
        ) {
            let n = deps.len();
            let ring: Vec<usize> = registration.iter().copied().take(ring_len.min(n)).collect();
            prop_assume!(ring.len() >= 2);
            for window in 0..ring.len() {
                let from = ring[window];
                let to = ring[(window + 1) % ring.len()];
                if !deps[from].contains(&to) {
                    deps[from].push(to);
                }
            }

            let graph = build(&deps, &registration);
            let cycle = graph.find_cycle();
            prop_assert!(cycle.is_some());
            let cycle = cycle.unwrap_or_default();
            prop_assert!(cycle.len() >= 2);
            prop_assert_eq!(cycle.first(), cycle.last());
            for pair in cycle.windows(2) {
                prop_assert!(graph.dependencies(pair[0]).contains(&pair[1]));
            }
        }
    }
}
