//! Search the space of controller placements.
//!
//! A run processes all requested combo sizes in increasing order. For each size, a set of
//! candidate placements is produced by the chosen [`Strategy`], every candidate is evaluated
//! with every requested metric, and the results are merged into an [`Aggregate`]. Exhaustive
//! enumeration and random sampling can be distributed over a [`WorkerPool`], while the
//! sequential strategies (implementing [`Step`]) run on the calling thread.

use std::{sync::Arc, time::Instant};

use itertools::Itertools;
use log::{debug, info};
use rand::{rngs::SmallRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    algorithms::{apsp, DistanceTable, NodeId, PathTable, Topology},
    choose,
    metrics::{ExtraParams, Metric},
    output::RunReport,
    Error, MyProgressIterator,
};

pub mod aggregate;
pub mod annealing;
pub mod dispatch;
pub mod greedy;
pub mod iterative;

pub use aggregate::{Aggregate, DistributionEntry, MetricAggregate, MetricSummary};
pub use annealing::{Annealing, AnnealingParams};
pub use dispatch::{Dispatch, WorkerPool};
pub use greedy::{priority_order, BestOfN, Greedy, GreedyPriority};

/// A placement: an ordered list of distinct controller locations.
pub type Combo = Vec<NodeId>;

/// The value of a metric for a single placement, and the time it took to compute it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// The computed value
    pub value: f64,
    /// Time spent computing the value, in seconds.
    pub duration: f64,
}

/// The values of all requested metrics, in the order in which they were requested.
pub type Evaluation = Vec<(Metric, MetricValue)>;

/// Immutable context of a run: the topology, the precomputed shortest paths, and the parameters
/// of the metrics. It is shared with every worker.
#[derive(Debug)]
pub struct World {
    topo: Topology,
    distances: DistanceTable,
    paths: PathTable,
    weighted: bool,
    params: ExtraParams,
}

impl World {
    /// Prepare the world by computing all-pairs shortest paths. If `weighted` is `false`, the
    /// distance between two nodes is the number of hops.
    pub fn new(topo: Topology, weighted: bool, params: ExtraParams) -> Result<Self, Error> {
        if topo.num_nodes() == 0 {
            return Err(Error::EmptyTopology);
        }
        if !topo.is_connected() {
            return Err(Error::Disconnected);
        }
        let (distances, paths) = apsp(&topo, weighted);
        debug!(
            "prepared world with {} nodes, {} links, diameter {}",
            topo.num_nodes(),
            topo.num_links(),
            distances.diameter()
        );
        Ok(Self {
            topo,
            distances,
            paths,
            weighted,
            params,
        })
    }

    /// The topology
    pub fn topo(&self) -> &Topology {
        &self.topo
    }

    /// Distance between every pair of nodes
    pub fn distances(&self) -> &DistanceTable {
        &self.distances
    }

    /// Shortest path between every pair of nodes
    pub fn paths(&self) -> &PathTable {
        &self.paths
    }

    /// Whether link weights are considered
    pub fn weighted(&self) -> bool {
        self.weighted
    }

    /// Parameters for the metrics
    pub fn params(&self) -> &ExtraParams {
        &self.params
    }

    /// Number of nodes in the topology
    pub fn num_nodes(&self) -> usize {
        self.topo.num_nodes()
    }
}

/// Evaluate all `metrics` on `combo`.
pub fn evaluate(world: &World, metrics: &[Metric], combo: &[NodeId]) -> Result<Evaluation, Error> {
    metrics
        .iter()
        .map(|metric| {
            let start = Instant::now();
            let value = metric.evaluate(world, combo)?;
            let duration = start.elapsed().as_secs_f64();
            Ok((*metric, MetricValue { value, duration }))
        })
        .collect()
}

/// Whether a metric should be minimized or maximized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Objective {
    /// Smaller values are better.
    #[default]
    Minimize,
    /// Larger values are better.
    Maximize,
}

impl Objective {
    /// Returns `true` if `new` is strictly better than `old`.
    pub fn is_better(&self, new: f64, old: f64) -> bool {
        match self {
            Objective::Minimize => new < old,
            Objective::Maximize => new > old,
        }
    }

    /// The worst possible value
    pub fn worst(&self) -> f64 {
        match self {
            Objective::Minimize => f64::INFINITY,
            Objective::Maximize => f64::NEG_INFINITY,
        }
    }
}

/// How placements are chosen for each combo size.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Evaluate every subset of nodes with the given size.
    Exhaustive,
    /// Evaluate `trials` random placements.
    RandomSample {
        /// Number of random placements per combo size
        trials: usize,
    },
    /// Sample `trials` random placements and keep the best (or worst) according to `target`.
    BestOfN {
        /// Number of random placements per combo size
        trials: usize,
        /// The metric used to compare placements
        target: Metric,
        /// Whether the best or the worst placement is kept.
        objective: Objective,
    },
    /// Extend the previous placement by the node that minimizes `target`.
    Greedy {
        /// The metric to minimize
        target: Metric,
    },
    /// Extend the previous placement by the next node of a precomputed priority order.
    GreedyPriority {
        /// Name of the ordering
        name: String,
        /// All nodes, ordered by decreasing priority.
        order: Vec<NodeId>,
    },
    /// Simulated annealing, started from a random placement.
    Annealing(AnnealingParams),
}

impl Strategy {
    /// Returns `true` if the strategy can be distributed over many workers.
    pub fn is_parallel(&self) -> bool {
        matches!(self, Strategy::Exhaustive | Strategy::RandomSample { .. })
    }

    /// Create the sequential step function for this strategy. Returns `None` for strategies that
    /// produce many candidates per combo size.
    pub fn step(&self) -> Option<Box<dyn Step + Send>> {
        Some(match self {
            Strategy::Exhaustive | Strategy::RandomSample { .. } => return None,
            Strategy::BestOfN {
                trials,
                target,
                objective,
            } => Box::new(BestOfN::new(*trials, *target, *objective)),
            Strategy::Greedy { target } => Box::new(Greedy::new(*target)),
            Strategy::GreedyPriority { name, order } => {
                Box::new(GreedyPriority::new(name.clone(), order.clone()))
            }
            Strategy::Annealing(params) => Box::new(Annealing::new(params.clone())),
        })
    }
}

/// A sequential search algorithm that produces a single placement per combo size.
pub trait Step: std::fmt::Debug {
    /// Name of the algorithm, as it appears in the results.
    fn name(&self) -> String;

    /// Whether the algorithm extends the previous solution by exactly one node. If so, the driver
    /// calls [`Step::next`] for every intermediate combo size.
    fn incremental(&self) -> bool {
        false
    }

    /// Compute the placement of size `combo_size`, given the solution `prev` of the previous
    /// step (which is empty for the first step).
    fn next(
        &mut self,
        world: &World,
        combo_size: usize,
        prev: &[NodeId],
        rng: &mut SmallRng,
    ) -> Result<Combo, Error>;
}

/// Pick `k` distinct nodes uniformly at random, sorted by their index.
pub fn random_combo(num_nodes: usize, k: usize, rng: &mut SmallRng) -> Combo {
    let mut idx = rand::seq::index::sample(rng, num_nodes, k).into_vec();
    idx.sort_unstable();
    idx.into_iter().map(NodeId::new).collect()
}

/// The random number generator used for a single random trial. It only depends on the seed, the
/// combo size and the trial, such that the result does not depend on how trials are distributed.
pub(crate) fn trial_rng(seed: u64, combo_size: usize, trial: usize) -> SmallRng {
    let mixed = (trial as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    SmallRng::seed_from_u64(seed ^ (combo_size as u64).rotate_left(32) ^ mixed)
}

/// Configuration of a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub(crate) metrics: Vec<Metric>,
    pub(crate) combo_sizes: Vec<usize>,
    pub(crate) strategy: Strategy,
    pub(crate) workers: usize,
    pub(crate) dispatch: Dispatch,
    pub(crate) write_dist: bool,
    pub(crate) write_combos: bool,
    pub(crate) median: bool,
    pub(crate) seed: u64,
    pub(crate) progress: bool,
}

impl RunOptions {
    /// Create a configuration that computes the given metrics. By default, all combo sizes are
    /// evaluated exhaustively on a single thread.
    pub fn new(metrics: impl IntoIterator<Item = Metric>) -> Self {
        Self {
            metrics: metrics.into_iter().collect(),
            combo_sizes: Vec::new(),
            strategy: Strategy::Exhaustive,
            workers: 1,
            dispatch: Dispatch::Coarse,
            write_dist: false,
            write_combos: false,
            median: false,
            seed: 0,
            progress: false,
        }
    }

    /// Set the combo sizes to evaluate. If empty, all sizes from 1 to the number of nodes are
    /// evaluated.
    pub fn combo_sizes(mut self, sizes: impl IntoIterator<Item = usize>) -> Self {
        self.combo_sizes = sizes.into_iter().collect();
        self
    }

    /// Set the search strategy
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the number of worker threads. With a single worker, everything runs on the calling
    /// thread.
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }

    /// Set how work is distributed over the workers.
    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Store every evaluated placement in the distribution.
    pub fn write_dist(mut self, yes: bool) -> Self {
        self.write_dist = yes;
        self
    }

    /// Also store the placement itself in the distribution.
    pub fn write_combos(mut self, yes: bool) -> Self {
        self.write_combos = yes;
        self
    }

    /// Compute the median of every metric (requires keeping all values in memory).
    pub fn median(mut self, yes: bool) -> Self {
        self.median = yes;
        self
    }

    /// Set the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Show progress bars
    pub fn show_progress(mut self) -> Self {
        self.progress = true;
        self
    }

    /// The requested metrics
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Get the validated, sorted and deduplicated combo sizes.
    pub fn validate(&self, world: &World) -> Result<Vec<usize>, Error> {
        let n = world.num_nodes();
        let sizes = if self.combo_sizes.is_empty() {
            (1..=n).collect_vec()
        } else {
            self.combo_sizes.iter().copied().sorted().dedup().collect_vec()
        };
        if let Some(&size) = sizes.iter().find(|s| **s == 0 || **s > n) {
            return Err(Error::InvalidComboSize { size, nodes: n });
        }
        if self.metrics.contains(&Metric::Availability) {
            world.params().get_availability()?;
        }
        match &self.strategy {
            Strategy::RandomSample { trials: 0 } | Strategy::BestOfN { trials: 0, .. } => {
                return Err(Error::InvalidParameter {
                    name: "trials",
                    value: 0.0,
                })
            }
            Strategy::GreedyPriority { order, .. } => {
                if sizes.last().is_some_and(|max| order.len() < *max) {
                    return Err(Error::InvalidParameter {
                        name: "order",
                        value: order.len() as f64,
                    });
                }
                if let Some(n) = order.iter().find(|x| x.index() >= n) {
                    return Err(Error::UnknownNode(format!("node index {}", n.index())));
                }
                if !order.iter().all_unique() {
                    return Err(Error::InvalidParameter {
                        name: "order",
                        value: order.len() as f64,
                    });
                }
            }
            _ => {}
        }
        if self.metrics.is_empty() {
            return Err(Error::InvalidParameter {
                name: "metrics",
                value: 0.0,
            });
        }
        if let Dispatch::Fine { chunk_size: 0 } = self.dispatch {
            return Err(Error::InvalidParameter {
                name: "chunk_size",
                value: 0.0,
            });
        }
        Ok(sizes)
    }

    /// Number of candidates produced for each combo size by a parallel strategy.
    pub(crate) fn num_candidates(&self, world: &World, combo_size: usize) -> usize {
        match self.strategy {
            Strategy::RandomSample { trials } => trials,
            _ => choose(world.num_nodes(), combo_size) as usize,
        }
    }

    /// Create an empty aggregate for this configuration.
    pub(crate) fn aggregate(&self) -> Aggregate {
        Aggregate::new(&self.metrics, self.median, self.write_dist, self.write_combos)
    }
}

/// Enumerate all candidates of a parallel strategy for a combo size, together with their index.
pub(crate) fn candidates<'a>(
    world: &'a World,
    options: &'a RunOptions,
    combo_size: usize,
) -> Box<dyn Iterator<Item = (usize, Combo)> + 'a> {
    let n = world.num_nodes();
    match options.strategy {
        Strategy::RandomSample { trials } => Box::new((0..trials).map(move |i| {
            let mut rng = trial_rng(options.seed, combo_size, i);
            (i, random_combo(n, combo_size, &mut rng))
        })),
        _ => Box::new(
            world
                .topo()
                .node_indices()
                .combinations(combo_size)
                .enumerate(),
        ),
    }
}

/// Evaluate all given candidates and aggregate the results. The point id of each candidate is
/// `base_id` plus its index.
pub(crate) fn score(
    world: &World,
    options: &RunOptions,
    items: impl Iterator<Item = (usize, Combo)>,
    base_id: usize,
) -> Result<Aggregate, Error> {
    let mut agg = options.aggregate();
    for (i, combo) in items {
        let eval = evaluate(world, &options.metrics, &combo)?;
        agg.record(world, base_id + i, &combo, &eval);
    }
    Ok(agg)
}

/// Run the search.
///
/// Combo sizes are processed in increasing order, and all partial results of one size are
/// merged before the next size is started.
pub fn run(world: Arc<World>, options: RunOptions) -> Result<RunReport, Error> {
    let sizes = options.validate(&world)?;
    let options = Arc::new(options);
    let mut report = RunReport::new(&options.metrics, &sizes);

    let pool = if options.workers > 1 && options.strategy.is_parallel() {
        Some(WorkerPool::new(world.clone(), options.clone(), options.workers)?)
    } else {
        None
    };

    let mut step = options.strategy.step();
    let mut rng = SmallRng::seed_from_u64(options.seed);
    let mut soln: Combo = Vec::new();
    let mut point_id = 0;

    for &combo_size in sizes.iter() {
        info!("combo size: {combo_size}");
        let agg = match (&pool, step.as_mut()) {
            (_, Some(step)) => {
                if step.incremental() {
                    while soln.len() < combo_size {
                        soln = step.next(&world, soln.len() + 1, &soln, &mut rng)?;
                    }
                } else {
                    soln = step.next(&world, combo_size, &soln, &mut rng)?;
                }
                debug!("{}: {:?}", step.name(), world.topo().names(&soln));
                let mut agg = options.aggregate();
                let eval = evaluate(&world, &options.metrics, &soln)?;
                agg.record(&world, point_id, &soln, &eval);
                agg
            }
            (Some(pool), None) => pool.run_size(combo_size, point_id)?,
            (None, None) => {
                let len = options.num_candidates(&world, combo_size);
                let items = candidates(&world, &options, combo_size).my_progress_count(
                    format!("combo size {combo_size}"),
                    len,
                    false,
                    options.progress,
                );
                score(&world, &options, items, point_id)?
            }
        };
        point_id += agg.num_points();
        report.data.insert(combo_size, agg.finalize());
    }

    if let Some(pool) = pool {
        pool.shutdown()?;
    }

    Ok(report)
}
