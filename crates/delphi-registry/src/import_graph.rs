//! Import Graph - `uses` relations between units.
//!
//! Uses `petgraph::DiGraph` with:
//! - Nodes: [`UnitId`]
//! - Edges: [`ImportEdge`], pointing from the importing unit to the imported one
//!
//! Interface-section edges decide resolution order: a unit's interface can
//! only be resolved after the interfaces it imports. Implementation-section
//! edges may form cycles, which Delphi permits.

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;

use delphi_core::{Section, UnitId};

/// A `uses` relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportEdge {
    /// Section whose `uses` clause lists the import.
    pub section: Section,
}

impl ImportEdge {
    fn is_interface(&self) -> bool {
        self.section == Section::Interface
    }
}

/// The program's import graph.
#[derive(Debug, Default, Clone)]
pub struct ImportGraph {
    graph: DiGraph<UnitId, ImportEdge>,
    nodes: FxHashMap<UnitId, NodeIndex>,
}

impl ImportGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit node, returning the existing node when already present.
    pub fn add_unit(&mut self, unit: UnitId) -> NodeIndex {
        if let Some(&node) = self.nodes.get(&unit) {
            return node;
        }
        let node = self.graph.add_node(unit);
        self.nodes.insert(unit, node);
        node
    }

    /// Record that `from` imports `to` in `section`.
    pub fn add_import(&mut self, from: UnitId, to: UnitId, section: Section) {
        let from = self.add_unit(from);
        let to = self.add_unit(to);
        // Avoid duplicate edges
        let exists = self
            .graph
            .edges(from)
            .any(|edge| edge.target() == to && edge.weight().section == section);
        if !exists {
            self.graph.add_edge(from, to, ImportEdge { section });
        }
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        self.nodes.contains_key(&unit)
    }

    /// Units imported by `unit`, in insertion order.
    pub fn imports_of(&self, unit: UnitId) -> Vec<(UnitId, Section)> {
        let Some(&node) = self.nodes.get(&unit) else {
            return Vec::new();
        };
        let mut imports: Vec<_> = self
            .graph
            .edges(node)
            .map(|edge| (self.graph[edge.target()], edge.weight().section))
            .collect();
        // petgraph yields outgoing edges newest first.
        imports.reverse();
        imports
    }

    /// Units that import `unit`.
    pub fn importers_of(&self, unit: UnitId) -> Vec<UnitId> {
        let Some(&node) = self.nodes.get(&unit) else {
            return Vec::new();
        };
        let mut importers: Vec<_> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|n| self.graph[n])
            .collect();
        importers.sort();
        importers.dedup();
        importers
    }

    /// Import cycles over all edges, each sorted, in a deterministic order.
    ///
    /// A unit importing itself counts as a cycle of one.
    pub fn cycles(&self) -> Vec<Vec<UnitId>> {
        self.cycles_in(&self.graph)
    }

    /// Cycles formed by interface-section imports only.
    pub fn interface_cycles(&self) -> Vec<Vec<UnitId>> {
        self.cycles_in(&self.interface_subgraph())
    }

    /// Group units into waves: every unit's interface imports lie in earlier waves.
    ///
    /// Units of one interface cycle share a wave. Units inside a wave are
    /// independent of each other and sorted by id.
    pub fn interface_waves(&self) -> Vec<Vec<UnitId>> {
        let graph = self.interface_subgraph();
        // Postorder: dependencies come before their importers.
        let sccs = tarjan_scc(&graph);
        let mut level_of: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        let mut waves: Vec<Vec<UnitId>> = Vec::new();

        for scc in &sccs {
            let level = scc
                .iter()
                .flat_map(|&n| graph.neighbors(n))
                .filter(|target| !scc.contains(target))
                .filter_map(|target| level_of.get(&target))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            for &node in scc {
                level_of.insert(node, level);
            }
            if waves.len() <= level {
                waves.resize_with(level + 1, Vec::new);
            }
            waves[level].extend(scc.iter().map(|&n| graph[n]));
        }

        for wave in &mut waves {
            wave.sort();
        }
        waves
    }

    fn interface_subgraph(&self) -> DiGraph<UnitId, ImportEdge> {
        self.graph
            .filter_map(|_, unit| Some(*unit), |_, edge| edge.is_interface().then_some(*edge))
    }

    fn cycles_in(&self, graph: &DiGraph<UnitId, ImportEdge>) -> Vec<Vec<UnitId>> {
        let mut cycles: Vec<Vec<UnitId>> = tarjan_scc(graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut units: Vec<_> = scc.into_iter().map(|n| graph[n]).collect();
                units.sort();
                units
            })
            .collect();
        cycles.sort();
        cycles
    }

    pub fn unit_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn import_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(i: u32) -> UnitId {
        UnitId::new(i)
    }

    #[test]
    fn imports_keep_source_order() {
        let mut graph = ImportGraph::new();
        graph.add_import(u(1), u(2), Section::Interface);
        graph.add_import(u(1), u(3), Section::Implementation);
        graph.add_import(u(1), u(2), Section::Interface);
        assert_eq!(
            graph.imports_of(u(1)),
            vec![(u(2), Section::Interface), (u(3), Section::Implementation)]
        );
        assert_eq!(graph.importers_of(u(2)), vec![u(1)]);
        assert_eq!(graph.import_count(), 2);
    }

    #[test]
    fn waves_follow_interface_dependencies() {
        let mut graph = ImportGraph::new();
        // 3 -> 2 -> 1, 4 -> 1, and 1 uses 3 only from its implementation.
        graph.add_import(u(3), u(2), Section::Interface);
        graph.add_import(u(2), u(1), Section::Interface);
        graph.add_import(u(4), u(1), Section::Interface);
        graph.add_import(u(1), u(3), Section::Implementation);

        let waves = graph.interface_waves();
        assert_eq!(waves, vec![vec![u(1)], vec![u(2), u(4)], vec![u(3)]]);
        assert!(graph.interface_cycles().is_empty());
        assert_eq!(graph.cycles(), vec![vec![u(1), u(2), u(3)]]);
    }

    #[test]
    fn interface_cycles_share_a_wave() {
        let mut graph = ImportGraph::new();
        graph.add_import(u(1), u(2), Section::Interface);
        graph.add_import(u(2), u(1), Section::Interface);
        graph.add_import(u(3), u(1), Section::Interface);
        graph.add_import(u(5), u(5), Section::Implementation);

        assert_eq!(graph.interface_cycles(), vec![vec![u(1), u(2)]]);
        assert_eq!(graph.cycles(), vec![vec![u(1), u(2)], vec![u(5)]]);
        let waves = graph.interface_waves();
        assert_eq!(waves[0], vec![u(1), u(2), u(5)]);
        assert_eq!(waves[1], vec![u(3)]);
    }
}
