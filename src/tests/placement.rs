use std::{fs, path::PathBuf, sync::Arc};

use approx::assert_relative_eq;
use itertools::Itertools;

use crate::{
    algorithms::apsp,
    availability::{availability, ConnectionAlgorithm},
    metrics::{ExtraParams, Metric},
    output::{read_report, write_distribution_csv, write_json},
    search::{self, iterative, AnnealingParams, Greedy, Objective, RunOptions, Strategy, World},
    topologies::{from_json, os3e},
};

fn world(params: ExtraParams) -> Arc<World> {
    Arc::new(World::new(os3e(), false, params).unwrap())
}

fn tmp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ctrlplace-{}-{name}", std::process::id()))
}

#[test]
fn os3e_single_controller() {
    let world = world(ExtraParams::availability(0.01, 1));
    let metrics = [Metric::Latency, Metric::WcLatency, Metric::Availability];
    let report = search::run(world, RunOptions::new(metrics).combo_sizes([1]).median(true)).unwrap();

    assert_eq!(report.metric, metrics.to_vec());
    assert_eq!(report.group, vec!["1"]);
    for metric in metrics {
        let s = report.summary(1, metric).unwrap();
        assert_eq!(s.num, 34);
        assert!(s.lowest <= s.mean && s.mean <= s.highest);
        let median = s.median.unwrap();
        assert!(s.lowest <= median && median <= s.highest);
        assert_eq!(s.lowest_combo.len(), 1);
        assert_eq!(s.highest_combo.len(), 1);
    }
    let availability = report.summary(1, Metric::Availability).unwrap();
    assert!(availability.highest <= 1.0);
    assert!(availability.lowest > 0.0);
}

#[test]
fn greedy_strategy_matches_iterative() {
    let world = world(ExtraParams::default());
    let report = search::run(
        world.clone(),
        RunOptions::new([Metric::Latency])
            .combo_sizes([1, 2, 3])
            .strategy(Strategy::Greedy {
                target: Metric::Latency,
            }),
    )
    .unwrap();
    let records = iterative::run(&world, &mut Greedy::new(Metric::Latency), Some(3), None, 0).unwrap();

    for record in records {
        let s = report.summary(record.combo_size, Metric::Latency).unwrap();
        assert_eq!(s.num, 1);
        assert_eq!(s.lowest_combo, record.combo);
        assert_eq!(s.lowest, record.latency);
    }
}

#[test]
fn exhaustive_bounds_heuristics() {
    let world = world(ExtraParams::default());
    let optimum = search::run(world.clone(), RunOptions::new([Metric::Latency]).combo_sizes([2]))
        .unwrap()
        .summary(2, Metric::Latency)
        .unwrap()
        .lowest;

    let strategies = [
        Strategy::BestOfN {
            trials: 50,
            target: Metric::Latency,
            objective: Objective::Minimize,
        },
        Strategy::Greedy {
            target: Metric::Latency,
        },
        Strategy::Annealing(AnnealingParams {
            iterations: 100,
            ..Default::default()
        }),
    ];
    for strategy in strategies {
        let report = search::run(
            world.clone(),
            RunOptions::new([Metric::Latency]).combo_sizes([2]).strategy(strategy).seed(4),
        )
        .unwrap();
        assert!(report.summary(2, Metric::Latency).unwrap().lowest >= optimum);
    }
}

#[test]
fn report_files() {
    let world = world(ExtraParams::default());
    let report = search::run(
        world,
        RunOptions::new([Metric::Latency, Metric::WcLatency])
            .combo_sizes([1, 2])
            .write_dist(true)
            .write_combos(true)
            .workers(2),
    )
    .unwrap();

    let json = tmp_file("report.json");
    write_json(&report, &json).unwrap();
    let read = read_report(&json).unwrap();
    fs::remove_file(&json).unwrap();

    assert_eq!(read.metric, report.metric);
    assert_eq!(read.group, report.group);
    for (size, group) in report.data.iter() {
        let other = &read.data[size];
        for (metric, s) in group.metrics.iter() {
            assert_eq!(other.metrics[metric].num, s.num);
            assert_eq!(other.metrics[metric].lowest_combo, s.lowest_combo);
            assert_relative_eq!(other.metrics[metric].lowest, s.lowest);
        }
        let combos = |g: &crate::output::GroupReport| {
            g.distribution.iter().map(|e| (e.id, e.combo.clone())).collect_vec()
        };
        assert_eq!(combos(group), combos(other));
    }

    let csv = tmp_file("dist.csv");
    write_distribution_csv(&report, &csv).unwrap();
    let mut reader = csv::Reader::from_path(&csv).unwrap();
    let header = reader.headers().unwrap().iter().map(String::from).collect_vec();
    let rows = reader.records().collect::<Result<Vec<_>, _>>().unwrap();
    fs::remove_file(&csv).unwrap();
    assert_eq!(header, ["combo_size", "id", "latency", "wc_latency", "combo"]);
    assert_eq!(rows.len(), 34 + 561);
    assert_eq!((&rows[0][0], &rows[0][1]), ("1", "0"));
    assert_eq!((&rows[34][0], &rows[34][1]), ("2", "34"));
    // names may contain commas, the combo column is quoted
    assert_eq!(rows[34][4].split(';').count(), 2);
}

#[test]
fn ring_survives_any_single_failure() {
    let topo = from_json(
        r#"{"links": [["a", "b"], ["b", "c"], ["c", "d"], ["d", "e"], ["e", "a"]]}"#,
    )
    .unwrap();
    let (_, paths) = apsp(&topo, false);
    let (any, per_controller) =
        availability(&topo, &paths, 0.1, 0.0, 1, ConnectionAlgorithm::Any, true).unwrap();
    assert_relative_eq!(any, 1.0, epsilon = 1e-12);
    assert_eq!(per_controller.len(), 5);

    let (sssp, _) = availability(&topo, &paths, 0.1, 0.0, 1, ConnectionAlgorithm::Sssp, true).unwrap();
    assert!(sssp < any);
}
