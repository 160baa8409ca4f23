//! Validated grid topology with its source-rooted spanning tree.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use tracing::{debug, info};

use super::types::{GridInput, Id, Line, Node, Source, SymLoad, Transformer};
use crate::error::TopologyError;

/// Edge payload of the adjacency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Position of the line in [`Grid::lines`].
    Line(usize),
    Transformer,
}

/// Result of a breadth-first traversal from the source node.
///
/// Indexed by node position (the order of [`Grid::nodes`]).
#[derive(Debug, Clone)]
pub struct SpanningTree {
    parent: Vec<Option<(NodeIndex, EdgeIndex)>>,
    reached: Vec<bool>,
    order: Vec<NodeIndex>,
}

impl SpanningTree {
    fn reached(&self, node: NodeIndex) -> bool {
        self.reached[node.index()]
    }
}

/// A grid that passed every structural check.
///
/// Built once per analysis session and never mutated afterwards; scenarios
/// are expressed as [`GridVariant`](super::overlay::GridVariant) overlays.
#[derive(Debug, Clone)]
pub struct Grid {
    nodes: Vec<Node>,
    lines: Vec<Line>,
    source: Source,
    transformer: Transformer,
    sym_loads: Vec<SymLoad>,
    graph: UnGraph<Id, Branch>,
    node_index: HashMap<Id, NodeIndex>,
    line_index: HashMap<Id, usize>,
    tree: SpanningTree,
}

/// Validates a grid description without keeping the result.
///
/// # Errors
///
/// Returns the first [`TopologyError`] found, see [`Grid::build`].
pub fn validate_grid(input: &GridInput) -> Result<(), TopologyError> {
    Grid::build(input.clone()).map(|_| ())
}

impl Grid {
    /// Builds and validates a grid from its element lists.
    ///
    /// Checks run in a fixed order: source count, transformer count, id
    /// uniqueness, self-loops, dangling node references, tap table, then a
    /// breadth-first traversal from the source node over in-service lines and
    /// the transformer that rejects cycles and unreachable nodes.
    ///
    /// # Errors
    ///
    /// Returns a [`TopologyError`] naming the offending element.
    pub fn build(input: GridInput) -> Result<Self, TopologyError> {
        let GridInput {
            nodes,
            lines,
            mut sources,
            mut transformers,
            sym_loads,
        } = input;

        if sources.len() != 1 {
            return Err(TopologyError::MultipleOrMissingSource {
                count: sources.len(),
            });
        }
        if transformers.len() != 1 {
            return Err(TopologyError::MultipleOrMissingTransformer {
                count: transformers.len(),
            });
        }
        let source = sources.remove(0);
        let transformer = transformers.remove(0);

        let mut seen = HashSet::new();
        let all_ids = nodes
            .iter()
            .map(|n| n.id)
            .chain(lines.iter().map(|l| l.id))
            .chain(std::iter::once(source.id))
            .chain(std::iter::once(transformer.id))
            .chain(sym_loads.iter().map(|s| s.id));
        for id in all_ids {
            if !seen.insert(id) {
                return Err(TopologyError::DuplicateId { id });
            }
        }

        if let Some(line) = lines.iter().find(|l| l.from_node == l.to_node) {
            return Err(TopologyError::SelfLoop { id: line.id });
        }
        if transformer.from_node == transformer.to_node {
            return Err(TopologyError::SelfLoop { id: transformer.id });
        }

        let mut graph = UnGraph::with_capacity(nodes.len(), lines.len() + 1);
        let mut node_index = HashMap::with_capacity(nodes.len());
        for node in &nodes {
            node_index.insert(node.id, graph.add_node(node.id));
        }

        let lookup = |element: &'static str, id: Id, node: Id| {
            node_index
                .get(&node)
                .copied()
                .ok_or(TopologyError::DanglingReference { element, id, node })
        };

        let mut line_index = HashMap::with_capacity(lines.len());
        let mut endpoints = Vec::with_capacity(lines.len());
        for (pos, line) in lines.iter().enumerate() {
            let from = lookup("line", line.id, line.from_node)?;
            let to = lookup("line", line.id, line.to_node)?;
            endpoints.push((from, to));
            line_index.insert(line.id, pos);
        }
        let t_from = lookup("transformer", transformer.id, transformer.from_node)?;
        let t_to = lookup("transformer", transformer.id, transformer.to_node)?;
        let root = lookup("source", source.id, source.node)?;
        for load in &sym_loads {
            lookup("sym_load", load.id, load.node)?;
        }

        check_tap_table(&transformer)?;

        for (pos, (from, to)) in endpoints.into_iter().enumerate() {
            graph.add_edge(from, to, Branch::Line(pos));
        }
        graph.add_edge(t_from, t_to, Branch::Transformer);

        let mut grid = Self {
            nodes,
            lines,
            source,
            transformer,
            sym_loads,
            graph,
            node_index,
            line_index,
            tree: SpanningTree {
                parent: Vec::new(),
                reached: Vec::new(),
                order: Vec::new(),
            },
        };
        let tree = grid.spanning_tree(root, &|pos| grid.lines[pos].in_service)?;
        grid.tree = tree;

        info!(
            nodes = grid.nodes.len(),
            lines = grid.lines.len(),
            sym_loads = grid.sym_loads.len(),
            "grid validated"
        );
        Ok(grid)
    }

    /// Runs the cycle/connectivity traversal with overridden line statuses.
    pub(crate) fn validate_with(
        &self,
        line_in_service: &dyn Fn(usize) -> bool,
    ) -> Result<(), TopologyError> {
        self.spanning_tree(self.root(), line_in_service).map(|_| ())
    }

    fn spanning_tree(
        &self,
        root: NodeIndex,
        line_in_service: &dyn Fn(usize) -> bool,
    ) -> Result<SpanningTree, TopologyError> {
        let tree = self.bfs(root, line_in_service, true)?;

        let mut unreachable: Vec<Id> = self
            .graph
            .node_indices()
            .filter(|&n| !tree.reached(n))
            .map(|n| self.graph[n])
            .collect();
        if !unreachable.is_empty() {
            unreachable.sort_unstable();
            return Err(TopologyError::NotConnected {
                nodes: unreachable,
            });
        }
        Ok(tree)
    }

    /// Breadth-first traversal over in-service edges.
    ///
    /// With `detect_cycles`, an edge into an already visited node that is
    /// not the parent edge of the current node fails with `CycleDetected`.
    fn bfs(
        &self,
        root: NodeIndex,
        line_in_service: &dyn Fn(usize) -> bool,
        detect_cycles: bool,
    ) -> Result<SpanningTree, TopologyError> {
        let n = self.graph.node_count();
        let mut parent: Vec<Option<(NodeIndex, EdgeIndex)>> = vec![None; n];
        let mut reached = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut queue = VecDeque::new();

        reached[root.index()] = true;
        queue.push_back(root);

        while let Some(u) = queue.pop_front() {
            order.push(u);
            let parent_edge = parent[u.index()].map(|(_, e)| e);
            for edge in self.graph.edges(u) {
                if !self.edge_in_service(edge.id(), line_in_service) {
                    continue;
                }
                if Some(edge.id()) == parent_edge {
                    continue;
                }
                let v = if edge.source() == u {
                    edge.target()
                } else {
                    edge.source()
                };
                if reached[v.index()] {
                    if detect_cycles {
                        return Err(TopologyError::CycleDetected {
                            edge: self.edge_id(edge.id()),
                        });
                    }
                    continue;
                }
                reached[v.index()] = true;
                parent[v.index()] = Some((u, edge.id()));
                queue.push_back(v);
            }
        }

        debug!(visited = order.len(), nodes = n, "traversal finished");
        Ok(SpanningTree {
            parent,
            reached,
            order,
        })
    }

    /// Nodes reachable from the source over in-service edges, by node position.
    pub(crate) fn reachable_from_source(
        &self,
        line_in_service: &dyn Fn(usize) -> bool,
    ) -> Vec<bool> {
        // Without cycle detection the traversal cannot fail.
        match self.bfs(self.root(), line_in_service, false) {
            Ok(tree) => tree.reached,
            Err(_) => vec![false; self.graph.node_count()],
        }
    }

    fn edge_in_service(
        &self,
        edge: EdgeIndex,
        line_in_service: &dyn Fn(usize) -> bool,
    ) -> bool {
        match self.graph[edge] {
            Branch::Line(pos) => line_in_service(pos),
            Branch::Transformer => true,
        }
    }

    fn edge_id(&self, edge: EdgeIndex) -> Id {
        match self.graph[edge] {
            Branch::Line(pos) => self.lines[pos].id,
            Branch::Transformer => self.transformer.id,
        }
    }

    fn root(&self) -> NodeIndex {
        self.node_index[&self.source.node]
    }

    /// Node position of a node id.
    pub(crate) fn node_position(&self, node: Id) -> Option<usize> {
        self.node_index.get(&node).map(|n| n.index())
    }

    /// Position of a line id in [`Grid::lines`].
    pub fn line_position(&self, line: Id) -> Option<usize> {
        self.line_index.get(&line).copied()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, id: Id) -> Option<&Line> {
        self.line_position(id).map(|pos| &self.lines[pos])
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn transformer(&self) -> &Transformer {
        &self.transformer
    }

    pub fn sym_loads(&self) -> &[SymLoad] {
        &self.sym_loads
    }

    /// Upstream neighbour of `node` in the spanning tree and the id of the
    /// edge leading to it. `None` for the source node or unknown ids.
    pub fn parent_of(&self, node: Id) -> Option<(Id, Id)> {
        let idx = self.node_index.get(&node)?;
        self.tree.parent[idx.index()].map(|(p, e)| (self.graph[p], self.edge_id(e)))
    }

    /// Node ids in breadth-first order from the source.
    pub fn nodes_from_source(&self) -> Vec<Id> {
        self.tree.order.iter().map(|&n| self.graph[n]).collect()
    }

    /// Number of edges between `node` and the source node in the spanning tree.
    pub fn depth_of(&self, node: Id) -> Option<usize> {
        let mut idx = *self.node_index.get(&node)?;
        let mut depth = 0;
        while let Some((p, _)) = self.tree.parent[idx.index()] {
            idx = p;
            depth += 1;
        }
        Some(depth)
    }
}

fn check_tap_table(transformer: &Transformer) -> Result<(), TopologyError> {
    let invalid = |reason: String| TopologyError::InvalidTapTable {
        id: transformer.id,
        reason,
    };

    if transformer.taps.is_empty() {
        return Err(invalid("no tap positions declared".into()));
    }
    let mut positions = HashSet::new();
    for tap in &transformer.taps {
        if !positions.insert(tap.position) {
            return Err(invalid(format!("position {} declared twice", tap.position)));
        }
        if !tap.ratio.is_finite() || tap.ratio <= 0.0 {
            return Err(invalid(format!(
                "position {} has ratio {}, must be finite and > 0",
                tap.position, tap.ratio
            )));
        }
    }
    if !positions.contains(&transformer.tap_pos) {
        return Err(invalid(format!(
            "current position {} is not declared",
            transformer.tap_pos
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::types::TapSetting;

    fn node(id: Id) -> Node {
        Node {
            id,
            u_rated: 400.0,
        }
    }

    fn line(id: Id, from_node: Id, to_node: Id, in_service: bool) -> Line {
        Line {
            id,
            from_node,
            to_node,
            in_service,
        }
    }

    /// source(0) =T= 1 - 2 - 3, tie line 1 - 3 open.
    fn radial() -> GridInput {
        GridInput {
            nodes: (0..4).map(node).collect(),
            lines: vec![
                line(12, 1, 2, true),
                line(13, 2, 3, true),
                line(14, 1, 3, false),
            ],
            sources: vec![Source { id: 20, node: 0 }],
            transformers: vec![Transformer {
                id: 10,
                from_node: 0,
                to_node: 1,
                tap_pos: 0,
                taps: vec![TapSetting {
                    position: 0,
                    ratio: 1.0,
                }],
            }],
            sym_loads: vec![
                SymLoad { id: 30, node: 2 },
                SymLoad { id: 31, node: 3 },
            ],
        }
    }

    #[test]
    fn radial_grid_builds() {
        Grid::build(radial()).expect("radial grid should validate");
    }

    #[test]
    fn spanning_tree_parents() {
        let grid = Grid::build(radial()).unwrap();
        assert_eq!(grid.parent_of(0), None);
        assert_eq!(grid.parent_of(1), Some((0, 10)));
        assert_eq!(grid.parent_of(3), Some((2, 13)));
        assert_eq!(grid.depth_of(3), Some(3));
        assert_eq!(grid.nodes_from_source(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn missing_source_rejected() {
        let mut input = radial();
        input.sources.clear();
        assert_eq!(
            Grid::build(input).err(),
            Some(TopologyError::MultipleOrMissingSource { count: 0 })
        );
    }

    #[test]
    fn two_transformers_rejected() {
        let mut input = radial();
        let mut second = input.transformers[0].clone();
        second.id = 11;
        input.transformers.push(second);
        assert_eq!(
            Grid::build(input).err(),
            Some(TopologyError::MultipleOrMissingTransformer { count: 2 })
        );
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut input = radial();
        input.sym_loads[1].id = 12;
        assert_eq!(
            Grid::build(input).err(),
            Some(TopologyError::DuplicateId { id: 12 })
        );
    }

    #[test]
    fn self_loop_rejected() {
        let mut input = radial();
        input.lines[1].to_node = 2;
        assert_eq!(
            Grid::build(input).err(),
            Some(TopologyError::SelfLoop { id: 13 })
        );
    }

    #[test]
    fn dangling_line_endpoint_rejected() {
        let mut input = radial();
        input.lines[0].to_node = 99;
        assert_eq!(
            Grid::build(input).err(),
            Some(TopologyError::DanglingReference {
                element: "line",
                id: 12,
                node: 99
            })
        );
    }

    #[test]
    fn dangling_sym_load_rejected() {
        let mut input = radial();
        input.sym_loads[0].node = 42;
        assert!(matches!(
            Grid::build(input),
            Err(TopologyError::DanglingReference {
                element: "sym_load",
                id: 30,
                ..
            })
        ));
    }

    #[test]
    fn undeclared_tap_position_rejected() {
        let mut input = radial();
        input.transformers[0].tap_pos = 3;
        assert!(matches!(
            Grid::build(input),
            Err(TopologyError::InvalidTapTable { id: 10, .. })
        ));
    }

    #[test]
    fn closed_tie_line_is_a_cycle() {
        let mut input = radial();
        input.lines[2].in_service = true;
        let err = Grid::build(input).err();
        assert!(
            matches!(
                err,
                Some(TopologyError::CycleDetected { edge }) if [12, 13, 14].contains(&edge)
            ),
            "unexpected: {err:?}"
        );
    }

    #[test]
    fn parallel_lines_are_a_cycle() {
        let mut input = radial();
        input.lines.push(line(15, 2, 3, true));
        assert!(matches!(
            Grid::build(input),
            Err(TopologyError::CycleDetected { edge: 13 | 15 })
        ));
    }

    #[test]
    fn isolated_node_not_connected() {
        let mut input = radial();
        input.nodes.push(node(4));
        assert_eq!(
            Grid::build(input).err(),
            Some(TopologyError::NotConnected { nodes: vec![4] })
        );
    }

    #[test]
    fn open_line_disconnects_downstream() {
        let mut input = radial();
        input.lines[1].in_service = false;
        assert_eq!(
            Grid::build(input).err(),
            Some(TopologyError::NotConnected { nodes: vec![3] })
        );
    }

    #[test]
    fn validate_grid_matches_build() {
        assert!(validate_grid(&radial()).is_ok());
        let mut input = radial();
        input.nodes.push(node(9));
        assert!(validate_grid(&input).is_err());
    }
}
