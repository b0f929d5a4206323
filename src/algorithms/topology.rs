//! Module to represent a network as an undirected, weighted graph and operate on it.

use std::borrow::Borrow;

use bimap::BiHashMap;
use itertools::Itertools;
use petgraph::{algo::connected_components, prelude::*};
use smallvec::SmallVec;

use super::NodeList;
use crate::Error;

/// The topology type for representing networks as graphs.
pub type TopologyType = u16;
/// The ID of a node within the graph.
pub type NodeId = NodeIndex<TopologyType>;
/// The ID of an edge (link) within the graph.
pub type EdgeId = EdgeIndex<TopologyType>;
/// A set of links that are assumed to be down at the same time.
pub type Failures = SmallVec<[EdgeId; 4]>;

/// Physical topology, represented as an undirected graph. Each node carries its name, and each
/// edge its (positive) weight.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// The topology, stored as an undirected graph.
    pub graph: Graph<String, f64, Undirected, TopologyType>,
    lut: BiHashMap<String, NodeId>,
}

impl std::ops::Deref for Topology {
    type Target = Graph<String, f64, Undirected, TopologyType>;

    fn deref(&self) -> &Self::Target {
        &self.graph
    }
}

impl Topology {
    /// Create a new, empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with the given name. If the node already exists, its existing id is returned.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        if let Some(id) = self.lut.get_by_left(&name) {
            return *id;
        }
        let id = self.graph.add_node(name.clone());
        self.lut.insert(name, id);
        id
    }

    /// Add a link between `a` and `b` (creating the nodes if necessary). The weight must be a
    /// positive, finite number. Self-loops and parallel links are rejected.
    pub fn add_link(
        &mut self,
        a: impl Into<String>,
        b: impl Into<String>,
        weight: f64,
    ) -> Result<EdgeId, Error> {
        let (a, b) = (a.into(), b.into());
        let invalid = |reason| Error::InvalidLink {
            src: a.clone(),
            dst: b.clone(),
            reason,
        };
        if !(weight.is_finite() && weight > 0.0) {
            return Err(invalid("weight must be positive"));
        }
        if a == b {
            return Err(invalid("self-loops are not allowed"));
        }
        let src = self.add_node(a.as_str());
        let dst = self.add_node(b.as_str());
        if self.graph.find_edge(src, dst).is_some() {
            return Err(invalid("link already exists"));
        }
        Ok(self.graph.add_edge(src, dst, weight))
    }

    /// Add a path of unit-weight links through the given nodes. Links that already exist are
    /// kept as they are.
    pub fn add_path<S: AsRef<str>>(&mut self, nodes: &[S]) {
        for (a, b) in nodes.iter().map(AsRef::as_ref).tuple_windows() {
            let src = self.add_node(a);
            let dst = self.add_node(b);
            if src != dst && self.graph.find_edge(src, dst).is_none() {
                self.graph.add_edge(src, dst, 1.0);
            }
        }
    }

    /// Set the weight of every link to 1.
    pub fn set_unit_weights(&mut self) -> &mut Self {
        self.graph.edge_weights_mut().for_each(|w| *w = 1.0);
        self
    }

    /// Number of nodes in the topology
    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of links in the topology
    pub fn num_links(&self) -> usize {
        self.graph.edge_count()
    }

    /// Lookup the NodeId from a name.
    pub fn node_id(&self, name: impl AsRef<str>) -> Result<NodeId, Error> {
        let name = name.as_ref();
        self.lut
            .get_by_left(name)
            .copied()
            .ok_or_else(|| Error::UnknownNode(name.to_string()))
    }

    /// Lookup all NodeIds of a list of names.
    pub fn node_ids<I, S>(&self, names: I) -> Result<Vec<NodeId>, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|n| self.node_id(n)).collect()
    }

    /// Lookup the name of a node.
    pub fn name(&self, id: impl Borrow<NodeId>) -> &str {
        self.graph[*id.borrow()].as_str()
    }

    /// Translate a combination of nodes into their names.
    pub fn names(&self, combo: &[NodeId]) -> Vec<String> {
        combo.iter().map(|n| self.name(n).to_string()).collect()
    }

    /// Get the weight of a link.
    pub fn weight(&self, e: impl Borrow<EdgeId>) -> f64 {
        self.graph[*e.borrow()]
    }

    /// Iterate over all links.
    pub fn links(&self) -> impl ExactSizeIterator<Item = EdgeId> {
        self.graph.edge_indices()
    }

    /// Returns `true` if every node can reach every other node.
    pub fn is_connected(&self) -> bool {
        connected_components(&self.graph) <= 1
    }

    /// Get all combinations of exactly `k` simultaneously failed links. For `k == 0`, the result
    /// contains a single, empty failure set.
    pub fn link_failure_combinations(&self, k: usize) -> Vec<Failures> {
        if k == 0 {
            return vec![Failures::new()];
        }
        self.links().combinations(k).map(Failures::from_vec).collect()
    }

    /// Compute the degree of each node.
    pub fn node_degrees(&self) -> NodeList<usize, TopologyType> {
        NodeList::from_fn(&self.graph, |n| self.graph.neighbors(n).count())
    }
}
