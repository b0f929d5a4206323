//! Implementation of the shortest path tree, and the all-pairs tables built from them.

use std::borrow::Borrow;

use itertools::Itertools;

use super::{EdgeId, NodeId, NodeList, TopologyType};

/// A single-source shortest-path tree.
#[derive(Debug, Clone)]
pub struct SourceSpt {
    d: NodeList<SourceSptNode, TopologyType>,
}

/// Data kept for each node in a Shortest Path Tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSptNode {
    /// The last hop (and the link towards it) on the shortest path from `root` to the current
    /// node.
    pub prev: Option<(NodeId, EdgeId)>,
    /// The cost for `root` to reach the current node
    pub cost: f64,
    /// The number of hops for `root` to reach the current node.
    pub dist: usize,
}

impl Default for SourceSptNode {
    fn default() -> Self {
        Self {
            prev: None,
            cost: f64::INFINITY,
            dist: usize::MAX,
        }
    }
}

impl SourceSpt {
    pub(super) fn from_raw(d: NodeList<SourceSptNode, TopologyType>) -> Self {
        Self { d }
    }

    /// Check if `node` is spanned by the tree.
    pub fn contains(&self, node: impl Borrow<NodeId>) -> bool {
        self.d[node].dist < usize::MAX
    }

    /// Get the path from the root to `target`, as a sequence of nodes and a sequence of links.
    /// Both are empty if `target` is not reachable.
    pub fn path(&self, target: NodeId) -> (Vec<NodeId>, Vec<EdgeId>) {
        if !self.contains(target) {
            return (Vec::new(), Vec::new());
        }
        let mut nodes = vec![target];
        let mut edges = Vec::new();
        let mut cur = target;
        while let Some((prev, edge)) = self.d[cur].prev {
            nodes.push(prev);
            edges.push(edge);
            cur = prev;
        }
        nodes.reverse();
        edges.reverse();
        (nodes, edges)
    }
}

/// The length of the shortest path between every pair of nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTable {
    d: NodeList<NodeList<f64, TopologyType>, TopologyType>,
}

impl DistanceTable {
    pub(super) fn from_trees(trees: &[SourceSpt]) -> Self {
        let d = trees
            .iter()
            .map(|t| NodeList::from(t.d.iter().map(|n| n.cost).collect_vec()))
            .collect_vec();
        Self { d: d.into() }
    }

    /// Get the distance from `src` to `dst`.
    #[inline]
    pub fn dist(&self, src: impl Borrow<NodeId>, dst: impl Borrow<NodeId>) -> f64 {
        self.d[src][dst]
    }

    /// The largest finite distance in the table.
    pub fn diameter(&self) -> f64 {
        self.d
            .iter()
            .flat_map(|row| row.iter().copied())
            .filter(|x| x.is_finite())
            .fold(0.0, f64::max)
    }

    /// Get all nodes ordered by increasing distance from `src`. Nodes at the same distance are
    /// ordered by their index.
    pub fn nodes_by_distance(&self, src: impl Borrow<NodeId>) -> Vec<NodeId> {
        let row = &self.d[src];
        let mut nodes = row.idx().collect_vec();
        nodes.sort_by(|a, b| row[a].total_cmp(&row[b]).then(a.cmp(b)));
        nodes
    }
}

/// One shortest path between every pair of nodes, stored both as a sequence of nodes and as the
/// sequence of links it traverses.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTable {
    nodes: NodeList<NodeList<Vec<NodeId>, TopologyType>, TopologyType>,
    edges: NodeList<NodeList<Vec<EdgeId>, TopologyType>, TopologyType>,
}

impl PathTable {
    pub(super) fn from_trees(trees: &[SourceSpt]) -> Self {
        let (nodes, edges): (Vec<_>, Vec<_>) = trees
            .iter()
            .map(|t| {
                let (n, e): (Vec<_>, Vec<_>) = t.d.idx().map(|dst| t.path(dst)).unzip();
                (NodeList::from(n), NodeList::from(e))
            })
            .unzip();
        Self {
            nodes: nodes.into(),
            edges: edges.into(),
        }
    }

    /// Get the nodes on the path from `src` to `dst` (including both endpoints).
    #[inline]
    pub fn path(&self, src: impl Borrow<NodeId>, dst: impl Borrow<NodeId>) -> &[NodeId] {
        &self.nodes[src][dst]
    }

    /// Get the links on the path from `src` to `dst`, in the order in which they are traversed.
    #[inline]
    pub fn path_edges(&self, src: impl Borrow<NodeId>, dst: impl Borrow<NodeId>) -> &[EdgeId] {
        &self.edges[src][dst]
    }
}
