//! Run a sequential algorithm for every combo size, and compare it to the optimum.

use std::time::Instant;

use log::info;
use rand::{rngs::SmallRng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{Combo, Step, World};
use crate::{metrics::Metric, output::RunReport, Error};

/// The result of an iterative algorithm for one combo size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterativeRecord {
    /// Name of the algorithm
    pub alg: String,
    /// Number of controllers
    pub combo_size: usize,
    /// Average latency of the placement
    pub latency: f64,
    /// Time spent computing the placement, in seconds.
    pub duration: f64,
    /// The placement
    pub combo: Vec<String>,
    /// Latency relative to the optimal latency. This is 1 if the optimal latency is 0, and 0 if
    /// the optimum is not known.
    pub ratio: f64,
}

/// Run `step` for every combo size from 1 up to `max_iters` (or the number of nodes), each time
/// passing the previous solution. If `reference` contains the result of an exhaustive run, the
/// latency of every placement is compared to the lowest latency found there.
pub fn run(
    world: &World,
    step: &mut dyn Step,
    max_iters: Option<usize>,
    reference: Option<&RunReport>,
    seed: u64,
) -> Result<Vec<IterativeRecord>, Error> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let n = world.num_nodes();
    let last = max_iters.map_or(n, |m| m.min(n));
    let alg = step.name();

    let mut soln: Combo = Vec::new();
    let mut records = Vec::with_capacity(last);
    for combo_size in 1..=last {
        let start = Instant::now();
        soln = step.next(world, combo_size, &soln, &mut rng)?;
        let duration = start.elapsed().as_secs_f64();

        let latency = Metric::Latency.evaluate(world, &soln)?;
        let ratio = match reference.and_then(|r| r.summary(combo_size, Metric::Latency)) {
            Some(opt) if opt.lowest == 0.0 => 1.0,
            Some(opt) => latency / opt.lowest,
            None => 0.0,
        };

        info!("combo size {combo_size}: {alg} latency {latency:.4} (ratio {ratio:.4})");
        records.push(IterativeRecord {
            alg: alg.clone(),
            combo_size,
            latency,
            duration,
            combo: world.topo().names(&soln),
            ratio,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        metrics::ExtraParams,
        search::{self, greedy::degree_order, BestOfN, Greedy, GreedyPriority, Objective, RunOptions},
        topologies::os3e,
    };

    fn world() -> Arc<World> {
        Arc::new(World::new(os3e(), false, ExtraParams::default()).unwrap())
    }

    #[test]
    fn greedy_against_optimum() {
        let world = world();
        let reference =
            search::run(world.clone(), RunOptions::new([Metric::Latency]).combo_sizes([1, 2])).unwrap();
        let records = run(&world, &mut Greedy::new(Metric::Latency), Some(3), Some(&reference), 0).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].alg, "greedy-informed");
        // the first greedy step is optimal
        assert_eq!(records[0].ratio, 1.0);
        assert!(records[1].ratio >= 1.0);
        // no reference for size 3
        assert_eq!(records[2].ratio, 0.0);
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.combo.len(), i + 1);
            assert_eq!(r.combo[..i], records[i.saturating_sub(1)].combo[..i]);
        }
        assert!(records.windows(2).all(|w| w[1].latency <= w[0].latency));
    }

    #[test]
    fn all_algorithms_cover_all_sizes() {
        let world = world();
        let mut algs: Vec<Box<dyn Step>> = vec![
            Box::new(BestOfN::new(5, Metric::Latency, Objective::Minimize)),
            Box::new(BestOfN::new(5, Metric::Latency, Objective::Maximize)),
            Box::new(GreedyPriority::new("greedy-degree", degree_order(&world))),
        ];
        for alg in algs.iter_mut() {
            let records = run(&world, alg.as_mut(), None, None, 1).unwrap();
            assert_eq!(records.len(), 34);
            assert_eq!(records.last().unwrap().latency, 0.0);
            assert!(records.iter().all(|r| r.ratio == 0.0));
        }
    }
}
