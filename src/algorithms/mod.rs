//! Module that contains (mostly graph) algorithms

use std::{borrow::Borrow, iter::repeat_with, marker::PhantomData};

use petgraph::{prelude::*, stable_graph::IndexType, EdgeType};
use rayon::prelude::*;

pub mod dijkstra;
pub mod shortest_path_tree;
pub mod topology;

pub use shortest_path_tree::{DistanceTable, PathTable, SourceSpt};
pub use topology::{EdgeId, Failures, NodeId, Topology, TopologyType};

/// Compute the all-pairs shortest distances and paths of the topology.
///
/// If `weighted` is `false`, every link counts as one hop, regardless of its weight. Of all
/// equal-cost paths, the first one settled by dijkstra is stored.
pub fn apsp(topo: &Topology, weighted: bool) -> (DistanceTable, PathTable) {
    let trees: Vec<SourceSpt> = topo
        .node_indices()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|root| dijkstra::shortest_path_tree(topo, root, weighted))
        .collect();

    let distances = DistanceTable::from_trees(&trees);
    let paths = PathTable::from_trees(&trees);
    (distances, paths)
}

/// Interface to construct new `EdgeList`s or `NodeList`s.
pub trait GraphList<Ix> {
    /// Create a new instance preallocated to the required of the graph.
    fn new<N, E, D: EdgeType>(g: &Graph<N, E, D, Ix>) -> Self;
}

impl<T: Default, Ix> GraphList<Ix> for T {
    fn new<N, E, D: EdgeType>(_g: &Graph<N, E, D, Ix>) -> Self {
        Default::default()
    }
}

/// Datastructure storing type `T` for each edge in a graph.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeList<T, Ix> {
    d: Vec<T>,
    ix: PhantomData<Ix>,
}

/// Datastructure storing type `T` for each node in a graph.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeList<T, Ix> {
    d: Vec<T>,
    ix: PhantomData<Ix>,
}

impl<T, Ix> From<Vec<T>> for NodeList<T, Ix> {
    fn from(d: Vec<T>) -> Self {
        Self { d, ix: PhantomData }
    }
}

impl<T, Ix> GraphList<Ix> for EdgeList<T, Ix>
where
    T: GraphList<Ix>,
    Ix: IndexType + std::fmt::Debug,
{
    fn new<N, E, D: EdgeType>(g: &Graph<N, E, D, Ix>) -> Self {
        Self {
            d: repeat_with(|| T::new(g)).take(g.edge_count()).collect(),
            ix: PhantomData,
        }
    }
}

impl<T, Ix> GraphList<Ix> for NodeList<T, Ix>
where
    T: GraphList<Ix>,
    Ix: IndexType + std::fmt::Debug,
{
    fn new<N, E, D: EdgeType>(g: &Graph<N, E, D, Ix>) -> Self {
        Self {
            d: repeat_with(|| T::new(g)).take(g.node_count()).collect(),
            ix: PhantomData,
        }
    }
}

impl<I, T, Ix> std::ops::Index<I> for EdgeList<T, Ix>
where
    I: Borrow<EdgeIndex<Ix>>,
    Ix: IndexType,
{
    type Output = T;

    fn index(&self, idx: I) -> &Self::Output {
        &self.d[EdgeIndex::<Ix>::index(*idx.borrow())]
    }
}

impl<I, T, Ix> std::ops::IndexMut<I> for EdgeList<T, Ix>
where
    I: Borrow<EdgeIndex<Ix>>,
    Ix: IndexType,
{
    fn index_mut(&mut self, idx: I) -> &mut Self::Output {
        &mut self.d[EdgeIndex::<Ix>::index(*idx.borrow())]
    }
}

impl<I, T, Ix> std::ops::Index<I> for NodeList<T, Ix>
where
    I: Borrow<NodeIndex<Ix>>,
    Ix: IndexType,
{
    type Output = T;

    fn index(&self, idx: I) -> &Self::Output {
        &self.d[NodeIndex::<Ix>::index(*idx.borrow())]
    }
}

impl<I, T, Ix> std::ops::IndexMut<I> for NodeList<T, Ix>
where
    I: Borrow<NodeIndex<Ix>>,
    Ix: IndexType,
{
    fn index_mut(&mut self, idx: I) -> &mut Self::Output {
        &mut self.d[NodeIndex::<Ix>::index(*idx.borrow())]
    }
}

impl<T, Ix> EdgeList<T, Ix> {
    /// Iterate over all elements in the `EdgeList`.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.d.iter()
    }
}

impl<T, Ix> NodeList<T, Ix> {
    /// Get the number of elements in the list
    pub fn len(&self) -> usize {
        self.d.len()
    }

    /// Returns `true` if `self` is empty.
    pub fn is_empty(&self) -> bool {
        self.d.is_empty()
    }

    /// Create a new `NodeList` by calling `f` for each node in the graph.
    pub fn from_fn<N, E, D, F>(graph: &Graph<N, E, D, Ix>, f: F) -> Self
    where
        D: EdgeType,
        F: FnMut(NodeIndex<Ix>) -> T,
        Ix: IndexType,
    {
        Self {
            d: graph.node_indices().map(f).collect(),
            ix: PhantomData,
        }
    }

    /// Iterate over all indices.
    pub fn idx(&self) -> impl ExactSizeIterator<Item = NodeIndex<Ix>>
    where
        Ix: IndexType,
    {
        (0..self.d.len()).map(NodeIndex::<Ix>::new)
    }

    /// Iterate over all elements in the `NodeList`.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &T> {
        self.d.iter()
    }

    /// Iterate over all elements in the `NodeList`, along with the `NodeIndex`.
    pub fn idx_iter(&self) -> impl ExactSizeIterator<Item = (NodeIndex<Ix>, &T)>
    where
        Ix: IndexType,
    {
        self.d.iter().enumerate().map(|(i, t)| (NodeIndex::<Ix>::new(i), t))
    }
}
