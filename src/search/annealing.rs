//! Simulated annealing over placements of a fixed size.

use log::trace;
use rand::{rngs::SmallRng, Rng};
use serde::{Deserialize, Serialize};

use super::{random_combo, Combo, Step, World};
use crate::{
    algorithms::{DistanceTable, NodeId},
    metrics::Metric,
    Error,
};

/// Parameters of the simulated annealing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnealingParams {
    /// Number of iterations
    pub iterations: usize,
    /// The temperature in iteration `i` is `0.5^(i / t0)`.
    pub t0: f64,
    /// The metric to minimize
    pub target: Metric,
}

impl Default for AnnealingParams {
    fn default() -> Self {
        Self {
            iterations: 1000,
            t0: 1000.0,
            target: Metric::Latency,
        }
    }
}

/// Generate a neighbor of `combo`: pick a random controller, and replace it by the closest node
/// that is not yet part of the placement (ties are broken by node index). Closeness is taken from
/// `dist`, so in a weighted world the candidates are ordered by link weight rather than by hop
/// count. If every node is already a controller, the placement is returned unchanged.
pub fn neighbor(dist: &DistanceTable, combo: &[NodeId], rng: &mut SmallRng) -> Combo {
    let mut new = combo.to_vec();
    if combo.is_empty() {
        return new;
    }
    let pos = rng.gen_range(0..combo.len());
    if let Some(replacement) = dist
        .nodes_by_distance(combo[pos])
        .into_iter()
        .find(|n| !combo.contains(n))
    {
        new[pos] = replacement;
    }
    new
}

/// Acceptance probability of moving from a placement with value `current` to one with value
/// `new`. Improvements are always accepted.
pub fn probability(temperature: f64, current: f64, new: f64) -> f64 {
    if current > new {
        1.0
    } else {
        (new - current) / temperature
    }
}

/// Run the simulated annealing starting at `init`, and return the best placement seen, together
/// with its value.
pub fn anneal(
    world: &World,
    init: Combo,
    params: &AnnealingParams,
    rng: &mut SmallRng,
) -> Result<(Combo, f64), Error> {
    let mut current_value = params.target.evaluate(world, &init)?;
    let mut best = init.clone();
    let mut best_value = current_value;
    let mut current = init;

    for i in 0..params.iterations {
        let candidate = neighbor(world.distances(), &current, rng);
        let value = params.target.evaluate(world, &candidate)?;
        if value <= best_value {
            best = candidate.clone();
            best_value = value;
        }
        let temperature = 0.5f64.powf(i as f64 / params.t0);
        if rng.gen::<f64>() <= probability(temperature, current_value, value) {
            trace!("iteration {i}: accept {value} (current {current_value})");
            current = candidate;
            current_value = value;
        }
    }

    Ok((best, best_value))
}

/// Simulated annealing as a search step. Every combo size starts from a new random placement.
#[derive(Debug, Clone, Default)]
pub struct Annealing {
    params: AnnealingParams,
}

impl Annealing {
    /// Create a new simulated annealing search.
    pub fn new(params: AnnealingParams) -> Self {
        Self { params }
    }
}

impl Step for Annealing {
    fn name(&self) -> String {
        "annealing".to_string()
    }

    fn next(
        &mut self,
        world: &World,
        combo_size: usize,
        _prev: &[NodeId],
        rng: &mut SmallRng,
    ) -> Result<Combo, Error> {
        let init = random_combo(world.num_nodes(), combo_size, rng);
        Ok(anneal(world, init, &self.params, rng)?.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{metrics::ExtraParams, topologies::os3e};
    use rand::SeedableRng;

    fn world() -> World {
        World::new(os3e(), false, ExtraParams::default()).unwrap()
    }

    #[test]
    fn acceptance() {
        assert_eq!(probability(0.5, 2.0, 1.0), 1.0);
        assert_eq!(probability(0.5, 1.0, 2.0), 2.0);
        assert_eq!(probability(1.0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn neighbor_replaces_one() {
        let world = world();
        let mut rng = SmallRng::seed_from_u64(3);
        let combo = world.topo().node_ids(["Seattle", "Chicago", "Atlanta"]).unwrap();
        for _ in 0..20 {
            let new = neighbor(world.distances(), &combo, &mut rng);
            assert_eq!(new.len(), 3);
            let changed = new.iter().zip(combo.iter()).filter(|(a, b)| a != b).count();
            assert_eq!(changed, 1);
            // the replacement is a direct neighbor of the replaced controller
            let (new_node, old_node) =
                new.iter().zip(combo.iter()).find(|(a, b)| a != b).unwrap();
            assert_eq!(world.distances().dist(old_node, new_node), 1.0);
            assert!(!combo.contains(new_node));
        }
    }

    #[test]
    fn neighbor_of_full_placement() {
        let mut t = crate::algorithms::Topology::new();
        t.add_path(&["a", "b"]);
        let world = World::new(t, false, ExtraParams::default()).unwrap();
        let combo = world.topo().node_ids(["a", "b"]).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(neighbor(world.distances(), &combo, &mut rng), combo);
    }

    #[test]
    fn neighbor_follows_world_distances() {
        let mut t = crate::algorithms::Topology::new();
        t.add_link("a", "b", 5.0).unwrap();
        t.add_link("a", "c", 1.0).unwrap();
        t.add_link("c", "d", 1.0).unwrap();
        let weighted = World::new(t.clone(), true, ExtraParams::default()).unwrap();
        let hops = World::new(t, false, ExtraParams::default()).unwrap();
        let a = weighted.topo().node_id("a").unwrap();
        let mut rng = SmallRng::seed_from_u64(0);

        let new = neighbor(weighted.distances(), &[a], &mut rng);
        assert_eq!(new, vec![weighted.topo().node_id("c").unwrap()]);
        // b and c are both one hop away, b has the lower index
        let new = neighbor(hops.distances(), &[a], &mut rng);
        assert_eq!(new, vec![hops.topo().node_id("b").unwrap()]);
    }

    #[test]
    fn never_worse_than_start() {
        let world = world();
        let mut rng = SmallRng::seed_from_u64(11);
        for k in [1, 2, 4] {
            let init = random_combo(world.num_nodes(), k, &mut rng);
            let init_value = Metric::Latency.evaluate(&world, &init).unwrap();
            let params = AnnealingParams {
                iterations: 200,
                ..Default::default()
            };
            let (best, best_value) = anneal(&world, init, &params, &mut rng).unwrap();
            assert_eq!(best.len(), k);
            assert!(best_value <= init_value);
            assert_eq!(Metric::Latency.evaluate(&world, &best).unwrap(), best_value);
            let mut dedup = best.clone();
            dedup.sort();
            dedup.dedup();
            assert_eq!(dedup.len(), k);
        }
    }

    #[test]
    fn step_base_case() {
        let world = world();
        let mut rng = SmallRng::seed_from_u64(5);
        let mut step = Annealing::new(AnnealingParams {
            iterations: 50,
            ..Default::default()
        });
        let combo = step.next(&world, 1, &[], &mut rng).unwrap();
        assert_eq!(combo.len(), 1);
    }
}
