//! Re-implementation of the dijkstra algorithm that returns a shortest-path tree.

use std::{cmp::Ordering, collections::BinaryHeap};

use petgraph::{
    prelude::*,
    visit::{VisitMap, Visitable},
};

use super::{
    shortest_path_tree::{SourceSpt, SourceSptNode},
    GraphList, NodeId, NodeList, Topology,
};

/// Compute the shortest-path tree sourced at `root`. If `weighted` is `false`, each link has cost
/// 1.
///
/// Among equal-cost predecessors, the one that was discovered first is kept.
pub fn shortest_path_tree(topo: &Topology, root: NodeId, weighted: bool) -> SourceSpt {
    let graph = &topo.graph;
    let mut d: NodeList<SourceSptNode, _> = NodeList::new(graph);

    let mut visited = graph.visit_map();
    let mut visit_next = BinaryHeap::new();
    d[root].cost = 0.0;
    d[root].dist = 0;
    visit_next.push(MinScored(0.0, root));

    while let Some(MinScored(node_score, node)) = visit_next.pop() {
        if visited.is_visited(&node) {
            continue;
        }
        // iterate in insertion order of the links
        let mut edges = graph.edges(node).collect::<Vec<_>>();
        edges.sort_by_key(|e| e.id());
        for edge in edges {
            let next = if edge.source() == node { edge.target() } else { edge.source() };
            if visited.is_visited(&next) {
                continue;
            }
            let w = if weighted { *edge.weight() } else { 1.0 };
            let next_cost = node_score + w;
            if next_cost < d[next].cost {
                d[next].cost = next_cost;
                d[next].prev = Some((node, edge.id()));
                d[next].dist = d[node].dist + 1;
                visit_next.push(MinScored(next_cost, next));
            }
        }
        visited.visit(node);
    }

    SourceSpt::from_raw(d)
}

/// `MinScored<K, T>` holds a score `K` and a scored object `T` in
/// a pair for use with a `BinaryHeap`.
///
/// `MinScored` compares in reverse order by the score, so that we can
/// use `BinaryHeap` as a min-heap to extract the score-value pair with the
/// least score.
///
/// **Note:** `MinScored` implements a total order (`Ord`), so that it is
/// possible to use float types as scores.
#[derive(Copy, Clone, Debug)]
pub struct MinScored<K, T>(pub K, pub T);

impl<K: PartialOrd, T> PartialEq for MinScored<K, T> {
    #[inline]
    fn eq(&self, other: &MinScored<K, T>) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: PartialOrd, T> Eq for MinScored<K, T> {}

impl<K: PartialOrd, T> PartialOrd for MinScored<K, T> {
    #[inline]
    fn partial_cmp(&self, other: &MinScored<K, T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: PartialOrd, T> Ord for MinScored<K, T> {
    #[inline]
    fn cmp(&self, other: &MinScored<K, T>) -> Ordering {
        let a = &self.0;
        let b = &other.0;
        if a == b {
            Ordering::Equal
        } else if a < b {
            Ordering::Greater
        } else if a > b {
            Ordering::Less
        } else if a.ne(a) && b.ne(b) {
            // these are the NaN cases
            Ordering::Equal
        } else if a.ne(a) {
            // Order NaN less, so that it is last in the MinScore order
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}
