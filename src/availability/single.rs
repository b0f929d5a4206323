//! Connectivity of the switches to a single controller, for each possible controller location.
//!
//! Two connection algorithms are supported: [`ConnectionAlgorithm::Sssp`] assumes that every
//! switch statically connects to the controller along its shortest path, while
//! [`ConnectionAlgorithm::Any`] assumes that a switch stays connected as long as any path to the
//! controller remains.

use std::str::FromStr;

use fixedbitset::FixedBitSet;
use itertools::Itertools;
use log::{debug, info};
use petgraph::visit::{Dfs, EdgeFiltered, EdgeRef, Walker};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::path_is_clear;
use crate::{
    algorithms::{EdgeId, NodeId, NodeList, PathTable, Topology, TopologyType},
    Error,
};

/// Pairs of `(probability, connectivity)`, one for each failure state considered.
pub type UptimeDistribution = Vec<(f64, f64)>;

/// Result of the availability analysis: the average connectivity over all controller locations,
/// and the weighted connectivity of each controller location.
pub type AvailabilityResult = (f64, NodeList<f64, TopologyType>);

/// The algorithm a switch uses to connect to its controller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionAlgorithm {
    /// Only the shortest path towards the controller is used.
    Sssp,
    /// Any remaining path towards the controller is used.
    Any,
}

impl ConnectionAlgorithm {
    /// Parse the algorithm from its name (`sssp` or `any`).
    pub fn parse(name: &str) -> Result<Self, Error> {
        Self::from_str(name).map_err(|_| Error::UnknownAlgorithm(name.to_string()))
    }

    /// Compute the uptime distribution for all single link failures.
    pub fn uptime_single(
        &self,
        topo: &Topology,
        paths: &PathTable,
        controller: NodeId,
        link_fail_prob: f64,
    ) -> UptimeDistribution {
        match self {
            Self::Sssp => sssp_conn_single(topo, paths, controller, link_fail_prob),
            Self::Any => any_conn(topo, controller, link_fail_prob),
        }
    }

    /// Fraction of switches connected to `controller` while all links in `failures` are down.
    pub fn connectivity(
        &self,
        topo: &Topology,
        paths: &PathTable,
        controller: NodeId,
        failures: &[EdgeId],
    ) -> f64 {
        let connected = match self {
            Self::Sssp => topo
                .node_indices()
                .filter(|sw| path_is_clear(paths.path_edges(controller, sw), failures))
                .count(),
            Self::Any => reachable(topo, controller, failures),
        };
        connected as f64 / topo.num_nodes() as f64
    }
}

/// Number of nodes reachable from `controller` once all links in `failures` are removed. The
/// controller itself is always counted.
fn reachable(topo: &Topology, controller: NodeId, failures: &[EdgeId]) -> usize {
    let filtered = EdgeFiltered::from_fn(&topo.graph, |e| !failures.contains(&e.id()));
    Dfs::new(&filtered, controller).iter(&filtered).count().max(1)
}

/// Uptime distribution of a controller at `controller`, where switches use their shortest path
/// to the controller. Each single link failure has probability `link_fail_prob`.
///
/// Links that are not part of any shortest path towards the controller do not affect the
/// connectivity.
pub fn sssp_conn_single(
    topo: &Topology,
    paths: &PathTable,
    controller: NodeId,
    link_fail_prob: f64,
) -> UptimeDistribution {
    let mut used = FixedBitSet::with_capacity(topo.num_links());
    for sw in topo.node_indices() {
        for e in paths.path_edges(controller, sw) {
            used.insert(e.index());
        }
    }

    topo.links()
        .map(|failed| {
            if !used.contains(failed.index()) {
                debug!("link {} not in the shortest-path tree", failed.index());
                return (link_fail_prob, 1.0);
            }
            let connected = topo
                .node_indices()
                .filter(|sw| !paths.path_edges(controller, sw).contains(&failed))
                .count();
            (link_fail_prob, connected as f64 / topo.num_nodes() as f64)
        })
        .collect()
}

/// Uptime distribution of a controller at `controller`, where switches stay connected as long
/// as any path remains. Each single link failure has probability `link_fail_prob`.
pub fn any_conn(topo: &Topology, controller: NodeId, link_fail_prob: f64) -> UptimeDistribution {
    topo.links()
        .map(|failed| {
            let connected = reachable(topo, controller, &[failed]);
            (link_fail_prob, connected as f64 / topo.num_nodes() as f64)
        })
        .collect()
}

/// Weighted connectivity of an uptime distribution: `Σ p·conn`, plus full connectivity for the
/// remaining probability mass `1 - Σ p`.
pub fn weighted_connectivity(uptime: &[(f64, f64)]) -> f64 {
    let covered: f64 = uptime.iter().map(|(p, _)| p).sum();
    let conn: f64 = uptime.iter().map(|(p, c)| p * c).sum();
    conn + (1.0 - covered)
}

fn average(topo: &Topology, per_controller: Vec<f64>) -> AvailabilityResult {
    let avg = per_controller.iter().sum::<f64>() / per_controller.len() as f64;
    debug_assert_eq!(per_controller.len(), topo.num_nodes());
    (avg, NodeList::from(per_controller))
}

/// Compute the connectivity assuming independent link failures, considering only a single link
/// failure at a time. The analysis is repeated for each possible controller location.
pub fn availability_single(
    topo: &Topology,
    paths: &PathTable,
    link_fail_prob: f64,
    alg: ConnectionAlgorithm,
) -> AvailabilityResult {
    let per_controller = topo
        .node_indices()
        .collect_vec()
        .into_par_iter()
        .map(|c| weighted_connectivity(&alg.uptime_single(topo, paths, c, link_fail_prob)))
        .collect::<Vec<_>>();
    average(topo, per_controller)
}

/// Compute the connectivity assuming independent link failures, considering up to
/// `max_failures` simultaneous link failures. A state with `k` failed links has weight
/// `link_fail_prob^k`.
pub fn availability_multiple(
    topo: &Topology,
    paths: &PathTable,
    link_fail_prob: f64,
    max_failures: usize,
    alg: ConnectionAlgorithm,
) -> AvailabilityResult {
    let failure_sets = (1..=max_failures)
        .flat_map(|k| topo.link_failure_combinations(k))
        .collect_vec();
    let per_controller = topo
        .node_indices()
        .collect_vec()
        .into_par_iter()
        .map(|c| {
            let uptime = failure_sets
                .iter()
                .map(|failures| {
                    (
                        link_fail_prob.powi(failures.len() as i32),
                        alg.connectivity(topo, paths, c, failures),
                    )
                })
                .collect_vec();
            weighted_connectivity(&uptime)
        })
        .collect::<Vec<_>>();
    average(topo, per_controller)
}

/// Compute the controller-to-switch connectivity assuming independent failures.
///
/// Only link failures are supported, and the expected number of failures must be small
/// (`link_fail_prob * nodes <= 1`). For a single failure, the result is computed with
/// [`availability_single`]; if `validate` is set, it is cross-checked against
/// [`availability_multiple`].
pub fn availability(
    topo: &Topology,
    paths: &PathTable,
    link_fail_prob: f64,
    node_fail_prob: f64,
    max_failures: usize,
    alg: ConnectionAlgorithm,
    validate: bool,
) -> Result<AvailabilityResult, Error> {
    if node_fail_prob != 0.0 {
        return Err(Error::NodeFailureUnsupported);
    }
    if link_fail_prob * topo.num_nodes() as f64 > 1.0 {
        return Err(Error::FailureRegime {
            link_fail_prob,
            nodes: topo.num_nodes(),
        });
    }

    let result = if max_failures == 1 {
        let single = availability_single(topo, paths, link_fail_prob, alg);
        if validate {
            let multiple = availability_multiple(topo, paths, link_fail_prob, 1, alg);
            if (single.0 - multiple.0).abs() >= 1e-7 {
                return Err(Error::ConsistencyCheck {
                    single: single.0,
                    multiple: multiple.0,
                });
            }
        }
        single
    } else {
        availability_multiple(topo, paths, link_fail_prob, max_failures, alg)
    };
    info!("{alg} average connectivity: {:.6}", result.0);
    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{algorithms::apsp, topologies::os3e};
    use approx::assert_relative_eq;

    fn star_tree() -> Topology {
        let mut t = Topology::new();
        t.add_path(&["a", "b", "c", "d"]);
        t.add_path(&["b", "e"]);
        t.add_path(&["c", "f", "g"]);
        t
    }

    #[test]
    fn line_sssp() {
        let mut t = Topology::new();
        t.add_path(&["a", "b", "c"]);
        let (_, p) = apsp(&t, false);
        let a = t.node_id("a").unwrap();
        let ab = t.find_edge(a, t.node_id("b").unwrap()).unwrap();
        let dist = sssp_conn_single(&t, &p, a, 0.1);
        // a-b disconnects b and c, b-c disconnects c
        assert_eq!(dist.len(), 2);
        assert_relative_eq!(dist[ab.index()].1, 1.0 / 3.0);
        let sum: f64 = dist.iter().map(|(_, c)| c).sum();
        assert_relative_eq!(sum, 1.0 / 3.0 + 2.0 / 3.0);
        assert_relative_eq!(weighted_connectivity(&dist), 0.1 / 3.0 + 0.2 / 3.0 + 0.8);
    }

    #[test]
    fn tree_algorithms_agree() {
        let t = star_tree();
        let (_, p) = apsp(&t, false);
        for c in t.node_indices() {
            let sssp = sssp_conn_single(&t, &p, c, 0.01);
            let any = any_conn(&t, c, 0.01);
            for ((p1, c1), (p2, c2)) in sssp.iter().zip(any.iter()) {
                assert_eq!(p1, p2);
                assert_relative_eq!(c1, c2);
            }
        }
    }

    #[test]
    fn any_dominates_sssp() {
        let t = os3e();
        let (_, p) = apsp(&t, false);
        for c in t.node_indices() {
            let sssp = sssp_conn_single(&t, &p, c, 0.01);
            let any = any_conn(&t, c, 0.01);
            for (e, ((_, c1), (_, c2))) in t.links().zip(sssp.iter().zip(any.iter())) {
                assert!(c2 >= c1);
                let on_tree = t.node_indices().any(|sw| p.path_edges(c, sw).contains(&e));
                if !on_tree {
                    assert_eq!(*c1, 1.0);
                    assert_relative_eq!(c1, c2);
                }
            }
        }
    }

    #[test]
    fn single_matches_multiple() {
        let t = os3e();
        let (_, p) = apsp(&t, false);
        for alg in [ConnectionAlgorithm::Sssp, ConnectionAlgorithm::Any] {
            let single = availability_single(&t, &p, 0.01, alg);
            let multiple = availability_multiple(&t, &p, 0.01, 1, alg);
            assert_relative_eq!(single.0, multiple.0, epsilon = 1e-9);
            for (s, m) in single.1.iter().zip(multiple.1.iter()) {
                assert_relative_eq!(s, m, epsilon = 1e-9);
            }
            assert!(single.0 < 1.0);
        }
    }

    #[test]
    fn policy() {
        let t = os3e();
        let (_, p) = apsp(&t, false);
        let alg = ConnectionAlgorithm::Sssp;
        assert!(matches!(
            availability(&t, &p, 0.01, 0.001, 1, alg, true),
            Err(Error::NodeFailureUnsupported)
        ));
        assert!(matches!(
            availability(&t, &p, 0.05, 0.0, 1, alg, true),
            Err(Error::FailureRegime { .. })
        ));
        let (avg, per_controller) = availability(&t, &p, 0.01, 0.0, 1, alg, true).unwrap();
        assert_eq!(per_controller.len(), 34);
        assert!(avg > 0.9 && avg < 1.0);
        let (avg2, _) = availability(&t, &p, 0.01, 0.0, 2, ConnectionAlgorithm::Any, true).unwrap();
        assert!(avg2 > 0.9 && avg2 < 1.0);
    }

    #[test]
    fn algorithm_names() {
        assert_eq!(ConnectionAlgorithm::parse("sssp").unwrap(), ConnectionAlgorithm::Sssp);
        assert_eq!(ConnectionAlgorithm::Any.to_string(), "any");
        assert!(matches!(ConnectionAlgorithm::parse("bfs"), Err(Error::UnknownAlgorithm(_))));
    }
}
