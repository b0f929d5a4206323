//! Evaluate controller placements on a topology.

#![deny(missing_docs, missing_debug_implementations)]

use std::{collections::BTreeMap, path::Path, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use ctrlplace::{
    algorithms::apsp,
    availability::{availability, ConnectionAlgorithm},
    metrics::{ExtraParams, Metric},
    output::{filename_with_timestamp, read_report, write_distribution_csv, write_json},
    search::{
        self, greedy::degree_order, iterative, AnnealingParams, BestOfN, Dispatch, Greedy,
        GreedyPriority, Objective, RunOptions, Step, Strategy, World,
    },
    topologies,
};
use log::info;

/// Evaluate controller placements on a topology.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// The topology: either `os3e`, or a JSON file with a list of links.
    #[arg(short, long, default_value = "os3e", global = true)]
    topology: String,
    /// Use link weights instead of hop counts.
    #[arg(short, long, global = true)]
    weighted: bool,
    /// Output file. By default, a name with the current timestamp is generated.
    #[arg(short, long, global = true)]
    output: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute the metrics for many placements of each combo size.
    Metrics {
        /// Metrics to compute
        #[arg(short, long, value_delimiter = ',', default_value = "latency,wc_latency")]
        metrics: Vec<Metric>,
        /// Combo sizes to evaluate
        #[arg(short = 'k', long, value_delimiter = ',', default_value = "1,2,3")]
        sizes: Vec<usize>,
        /// How placements are chosen
        #[arg(short, long, value_enum, default_value = "exhaustive")]
        strategy: StrategyKind,
        /// Number of random trials per combo size (for `random` and `best-n`).
        #[arg(long, default_value = "1000")]
        trials: usize,
        /// Number of iterations of the simulated annealing.
        #[arg(long, default_value = "1000")]
        iterations: usize,
        /// Number of worker threads
        #[arg(short = 'j', long, default_value = "1")]
        workers: usize,
        /// Send chunks of this many placements to the workers, instead of splitting the work
        /// statically.
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Compute the median of each metric.
        #[arg(long)]
        median: bool,
        /// Write the value of every placement.
        #[arg(long)]
        write_dist: bool,
        /// Write the placement of every point in the distribution.
        #[arg(long)]
        write_combos: bool,
        /// Also write the distribution as CSV.
        #[arg(long)]
        csv: bool,
        /// Link failure probability (for `availability`).
        #[arg(long)]
        link_fail_prob: Option<f64>,
        /// Maximum number of simultaneous link failures (for `availability`).
        #[arg(long)]
        max_failures: Option<usize>,
        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },
    /// Run an iterative algorithm for each combo size and compare it to the optimum.
    Iterative {
        /// The algorithm
        #[arg(short, long, value_enum, default_value = "greedy-informed")]
        alg: IterativeAlg,
        /// Number of random trials (for `best-n` and `worst-n`).
        #[arg(short, long, default_value = "100")]
        n: usize,
        /// Stop after this combo size.
        #[arg(long)]
        max_iters: Option<usize>,
        /// Result of an exhaustive `metrics` run including `latency`, used to compute ratios.
        #[arg(short, long)]
        reference: Option<String>,
        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },
    /// Compute the connectivity of a single controller under link failures.
    Availability {
        /// Link failure probability
        #[arg(short = 'p', long, default_value = "0.01")]
        link_fail_prob: f64,
        /// Node failure probability (only 0 is supported).
        #[arg(long, default_value = "0.0")]
        node_fail_prob: f64,
        /// Maximum number of simultaneous link failures
        #[arg(short = 'f', long, default_value = "1")]
        max_failures: usize,
        /// How switches connect to the controller (`sssp` or `any`).
        #[arg(short, long, default_value = "sssp")]
        alg: ConnectionAlgorithm,
        /// Skip the consistency check between the single and multiple failure computations.
        #[arg(long)]
        no_validate: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyKind {
    Exhaustive,
    Random,
    BestN,
    WorstN,
    Greedy,
    GreedyDegree,
    Annealing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum IterativeAlg {
    BestN,
    WorstN,
    GreedyInformed,
    GreedyDegree,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let topo = topologies::by_name(&cli.topology)
        .with_context(|| format!("Loading topology {}", cli.topology))?;
    let label = Path::new(&cli.topology)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("topology")
        .to_string();
    info!("topology {label}: {} nodes, {} links", topo.num_nodes(), topo.num_links());

    match cli.command {
        Command::Metrics {
            metrics,
            sizes,
            strategy,
            trials,
            iterations,
            workers,
            chunk_size,
            median,
            write_dist,
            write_combos,
            csv,
            link_fail_prob,
            max_failures,
            seed,
            progress,
        } => {
            let params = ExtraParams {
                link_fail_prob,
                max_failures,
            };
            let world = Arc::new(World::new(topo, cli.weighted, params).context("Preparing the world")?);
            let target = metrics.first().copied().unwrap_or(Metric::Latency);
            let strategy = match strategy {
                StrategyKind::Exhaustive => Strategy::Exhaustive,
                StrategyKind::Random => Strategy::RandomSample { trials },
                StrategyKind::BestN => Strategy::BestOfN {
                    trials,
                    target,
                    objective: Objective::Minimize,
                },
                StrategyKind::WorstN => Strategy::BestOfN {
                    trials,
                    target,
                    objective: Objective::Maximize,
                },
                StrategyKind::Greedy => Strategy::Greedy { target },
                StrategyKind::GreedyDegree => Strategy::GreedyPriority {
                    name: "greedy-degree".to_string(),
                    order: degree_order(&world),
                },
                StrategyKind::Annealing => Strategy::Annealing(AnnealingParams {
                    iterations,
                    target,
                    ..Default::default()
                }),
            };
            let dispatch = match chunk_size {
                Some(chunk_size) => Dispatch::Fine { chunk_size },
                None => Dispatch::Coarse,
            };
            let mut options = RunOptions::new(metrics)
                .combo_sizes(sizes)
                .strategy(strategy)
                .workers(workers)
                .dispatch(dispatch)
                .median(median)
                .write_dist(write_dist || csv)
                .write_combos(write_combos)
                .seed(seed);
            if progress {
                options = options.show_progress();
            }

            let report = search::run(world, options).context("Running the search")?;
            report.log_summary();

            let output =
                cli.output.unwrap_or_else(|| filename_with_timestamp(format!("metrics-{label}"), "json"));
            write_json(&report, &output).with_context(|| format!("Writing {output}"))?;
            if csv {
                let csv_output = format!("{}.csv", output.trim_end_matches(".json"));
                write_distribution_csv(&report, &csv_output)
                    .with_context(|| format!("Writing {csv_output}"))?;
            }
        }
        Command::Iterative {
            alg,
            n,
            max_iters,
            reference,
            seed,
        } => {
            let world = World::new(topo, cli.weighted, ExtraParams::default())
                .context("Preparing the world")?;
            let reference = reference
                .map(|path| read_report(&path).with_context(|| format!("Reading {path}")))
                .transpose()?;
            let mut step: Box<dyn Step> = match alg {
                IterativeAlg::BestN => Box::new(BestOfN::new(n, Metric::Latency, Objective::Minimize)),
                IterativeAlg::WorstN => Box::new(BestOfN::new(n, Metric::Latency, Objective::Maximize)),
                IterativeAlg::GreedyInformed => Box::new(Greedy::new(Metric::Latency)),
                IterativeAlg::GreedyDegree => {
                    Box::new(GreedyPriority::new("greedy-degree", degree_order(&world)))
                }
            };
            let records = iterative::run(&world, step.as_mut(), max_iters, reference.as_ref(), seed)
                .context("Running the iterative algorithm")?;
            let output = cli
                .output
                .unwrap_or_else(|| filename_with_timestamp(format!("{}-{label}", step.name()), "json"));
            write_json(&records, &output).with_context(|| format!("Writing {output}"))?;
        }
        Command::Availability {
            link_fail_prob,
            node_fail_prob,
            max_failures,
            alg,
            no_validate,
        } => {
            let (_, paths) = apsp(&topo, cli.weighted);
            let (average, per_controller) = availability(
                &topo,
                &paths,
                link_fail_prob,
                node_fail_prob,
                max_failures,
                alg,
                !no_validate,
            )
            .context("Computing the availability")?;
            let controllers: BTreeMap<&str, f64> =
                per_controller.idx_iter().map(|(n, v)| (topo.name(n), *v)).collect();
            let output = cli
                .output
                .unwrap_or_else(|| filename_with_timestamp(format!("availability-{label}"), "json"));
            write_json(
                &serde_json::json!({
                    "alg": alg.to_string(),
                    "link_fail_prob": link_fail_prob,
                    "max_failures": max_failures,
                    "average": average,
                    "controllers": controllers,
                }),
                &output,
            )
            .with_context(|| format!("Writing {output}"))?;
        }
    }

    Ok(())
}
