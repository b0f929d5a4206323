//! Random best-of-n and greedy placement algorithms.

use fixedbitset::FixedBitSet;
use ordered_float::OrderedFloat;
use rand::rngs::SmallRng;

use super::{random_combo, Combo, Objective, Step, World};
use crate::{algorithms::NodeId, metrics::Metric, Error};

/// Sample `trials` random placements and keep the best one according to `target`.
#[derive(Debug, Clone)]
pub struct BestOfN {
    trials: usize,
    target: Metric,
    objective: Objective,
}

impl BestOfN {
    /// Create a new best-of-n (or worst-of-n with [`Objective::Maximize`]) search.
    pub fn new(trials: usize, target: Metric, objective: Objective) -> Self {
        Self {
            trials,
            target,
            objective,
        }
    }
}

impl Step for BestOfN {
    fn name(&self) -> String {
        match self.objective {
            Objective::Minimize => format!("best-n-{}", self.trials),
            Objective::Maximize => format!("worst-n-{}", self.trials),
        }
    }

    fn next(
        &mut self,
        world: &World,
        combo_size: usize,
        _prev: &[NodeId],
        rng: &mut SmallRng,
    ) -> Result<Combo, Error> {
        let mut best: Option<(Combo, f64)> = None;
        for _ in 0..self.trials {
            let combo = random_combo(world.num_nodes(), combo_size, rng);
            let value = self.target.evaluate(world, &combo)?;
            let best_value = best.as_ref().map(|(_, v)| *v).unwrap_or(self.objective.worst());
            if best.is_none() || self.objective.is_better(value, best_value) {
                best = Some((combo, value));
            }
        }
        best.map(|(c, _)| c).ok_or(Error::InvalidParameter {
            name: "trials",
            value: 0.0,
        })
    }
}

/// Extend the previous placement by the node that results in the smallest value of `target`.
/// The metric is re-evaluated in every step.
#[derive(Debug, Clone)]
pub struct Greedy {
    target: Metric,
}

impl Greedy {
    /// Create a new greedy search that minimizes `target`.
    pub fn new(target: Metric) -> Self {
        Self { target }
    }
}

impl Step for Greedy {
    fn name(&self) -> String {
        match self.target {
            Metric::Latency => "greedy-informed".to_string(),
            m => format!("greedy-informed-{m}"),
        }
    }

    fn incremental(&self) -> bool {
        true
    }

    fn next(
        &mut self,
        world: &World,
        combo_size: usize,
        prev: &[NodeId],
        _rng: &mut SmallRng,
    ) -> Result<Combo, Error> {
        let mut chosen = FixedBitSet::with_capacity(world.num_nodes());
        prev.iter().for_each(|n| chosen.insert(n.index()));

        let mut combo = prev.to_vec();
        let mut best: Option<(NodeId, f64)> = None;
        for n in world.topo().node_indices().filter(|n| !chosen.contains(n.index())) {
            combo.push(n);
            let value = self.target.evaluate(world, &combo)?;
            combo.pop();
            if best.map_or(true, |(_, v)| value < v) {
                best = Some((n, value));
            }
        }

        let (n, _) = best.ok_or(Error::InvalidComboSize {
            size: combo_size,
            nodes: world.num_nodes(),
        })?;
        combo.push(n);
        Ok(combo)
    }
}

/// Extend the previous placement by the next node of a fixed priority order. The node at
/// position `k - 1` is added for combo size `k`.
#[derive(Debug, Clone)]
pub struct GreedyPriority {
    name: String,
    order: Vec<NodeId>,
}

impl GreedyPriority {
    /// Create a new greedy search that follows `order`.
    pub fn new(name: impl Into<String>, order: Vec<NodeId>) -> Self {
        Self {
            name: name.into(),
            order,
        }
    }
}

impl Step for GreedyPriority {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn incremental(&self) -> bool {
        true
    }

    fn next(
        &mut self,
        world: &World,
        combo_size: usize,
        prev: &[NodeId],
        _rng: &mut SmallRng,
    ) -> Result<Combo, Error> {
        let n = combo_size
            .checked_sub(1)
            .and_then(|i| self.order.get(i))
            .ok_or(Error::InvalidComboSize {
                size: combo_size,
                nodes: world.num_nodes(),
            })?;
        if n.index() >= world.num_nodes() {
            return Err(Error::UnknownNode(format!("node index {}", n.index())));
        }
        if prev.contains(n) {
            return Err(Error::InvalidParameter {
                name: "order",
                value: n.index() as f64,
            });
        }
        let mut combo = prev.to_vec();
        combo.push(*n);
        Ok(combo)
    }
}

/// Sort nodes by their value (largest first if `reversed`). Nodes with equal values keep the
/// order in which they are given.
pub fn priority_order(
    values: impl IntoIterator<Item = (NodeId, f64)>,
    reversed: bool,
) -> Vec<NodeId> {
    let mut values = values.into_iter().collect::<Vec<_>>();
    if reversed {
        values.sort_by_key(|(_, v)| std::cmp::Reverse(OrderedFloat(*v)));
    } else {
        values.sort_by_key(|(_, v)| OrderedFloat(*v));
    }
    values.into_iter().map(|(n, _)| n).collect()
}

/// Priority order by decreasing node degree.
pub fn degree_order(world: &World) -> Vec<NodeId> {
    let degrees = world.topo().node_degrees();
    priority_order(degrees.idx_iter().map(|(n, d)| (n, *d as f64)), true)
}
