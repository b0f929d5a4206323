//! Availability of a controller placement under random, independent link failures.
//!
//! The failure space is enumerated exactly: every combination of up to `max_failures`
//! simultaneously failed links is considered, weighted by the probability of that exact network
//! state. Failure states with more failed links are ignored, which is reported by the coverage
//! (the total probability mass of all states that were considered).

use log::debug;

use crate::{
    algorithms::{DistanceTable, EdgeId, PathTable, Topology},
    metrics::{closest_set, ClosestSet},
};

pub mod single;

pub use single::{
    any_conn, availability, availability_multiple, availability_single, sssp_conn_single,
    ConnectionAlgorithm, UptimeDistribution,
};

/// Returns `true` if none of the links in `path` has failed.
#[inline]
pub fn path_is_clear(path: &[EdgeId], failures: &[EdgeId]) -> bool {
    !path.iter().any(|e| failures.contains(e))
}

/// Fraction of nodes that can still reach their closest controller along the precomputed
/// shortest path, when all links in `failures` are down.
///
/// A node that is equally close to `k` controllers gets `1/k` credit for each controller it can
/// still reach.
pub fn connectivity(
    topo: &Topology,
    combo: &[crate::algorithms::NodeId],
    dist: &DistanceTable,
    paths: &PathTable,
    failures: &[EdgeId],
) -> f64 {
    let closest = topo.node_indices().map(|n| closest_set(dist, n, combo)).collect::<Vec<_>>();
    connectivity_with(topo, &closest, paths, failures)
}

fn connectivity_with(
    topo: &Topology,
    closest: &[ClosestSet],
    paths: &PathTable,
    failures: &[EdgeId],
) -> f64 {
    let connected: f64 = topo
        .node_indices()
        .zip(closest)
        .map(|(n, controllers)| {
            let share = 1.0 / controllers.len() as f64;
            controllers
                .iter()
                .filter(|c| path_is_clear(paths.path_edges(n, *c), failures))
                .count() as f64
                * share
        })
        .sum();
    connected / topo.num_nodes() as f64
}

/// Probability that exactly the links in `failures` are down, and all others are up.
///
/// If `weighted`, each link fails with probability `link_fail_prob * weight`.
pub fn state_probability(
    topo: &Topology,
    failures: &[EdgeId],
    weighted: bool,
    link_fail_prob: f64,
) -> f64 {
    if weighted {
        topo.links()
            .map(|e| {
                let p = link_fail_prob * topo.weight(e);
                if failures.contains(&e) {
                    p
                } else {
                    1.0 - p
                }
            })
            .product()
    } else {
        let bad = failures.len();
        let good = topo.num_links() - bad;
        (1.0 - link_fail_prob).powi(good as i32) * link_fail_prob.powi(bad as i32)
    }
}

/// Compute the availability of a single placement.
///
/// Returns `(availability, coverage)`, where `availability` is the sum over all considered
/// failure states of the state probability times the [`connectivity`] in that state, and
/// `coverage` is the sum of all considered state probabilities. Both are at most 1, and
/// `availability <= coverage`.
pub fn availability_one_combo(
    topo: &Topology,
    combo: &[crate::algorithms::NodeId],
    dist: &DistanceTable,
    paths: &PathTable,
    weighted: bool,
    link_fail_prob: f64,
    max_failures: usize,
) -> (f64, f64) {
    let closest = topo.node_indices().map(|n| closest_set(dist, n, combo)).collect::<Vec<_>>();

    let mut availability = 0.0;
    let mut coverage = 0.0;
    for k in 0..=max_failures {
        let mut availability_k = 0.0;
        let mut coverage_k = 0.0;
        for failures in topo.link_failure_combinations(k) {
            let prob = state_probability(topo, &failures, weighted, link_fail_prob);
            coverage_k += prob;
            availability_k += prob * connectivity_with(topo, &closest, paths, &failures);
        }
        debug!("{k} failures: availability {availability_k:.6}, coverage {coverage_k:.6}");
        availability += availability_k;
        coverage += coverage_k;
    }
    (availability, coverage)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{algorithms::apsp, choose, topologies::os3e};
    use approx::assert_relative_eq;

    fn binomial_coverage(links: usize, p: f64, max_failures: usize) -> f64 {
        (0..=max_failures)
            .map(|k| {
                choose(links, k) * p.powi(k as i32) * (1.0 - p).powi((links - k) as i32)
            })
            .sum()
    }

    #[test]
    fn path_clear() {
        let e = |i| EdgeId::new(i);
        assert!(path_is_clear(&[e(0), e(1)], &[]));
        assert!(path_is_clear(&[e(0), e(1)], &[e(2)]));
        assert!(!path_is_clear(&[e(0), e(1)], &[e(2), e(1)]));
        assert!(path_is_clear(&[], &[e(0)]));
    }

    #[test]
    fn failure_combinations_count() {
        let t = os3e();
        for k in 0..4 {
            let combos = t.link_failure_combinations(k);
            assert_eq!(combos.len() as f64, choose(t.num_links(), k));
            let mut sorted = combos.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted.len(), combos.len());
        }
    }

    #[test]
    fn line_connectivity() {
        let mut t = Topology::new();
        t.add_path(&["A", "B", "C"]);
        let (d, p) = apsp(&t, false);
        let [a, _, c] = ["A", "B", "C"].map(|n| t.node_id(n).unwrap());
        let ab = t.find_edge(a, t.node_id("B").unwrap()).unwrap();
        assert_eq!(connectivity(&t, &[a], &d, &p, &[]), 1.0);
        assert_relative_eq!(connectivity(&t, &[a], &d, &p, &[ab]), 1.0 / 3.0);
        // B is tied between A and C, and can only reach C
        assert_relative_eq!(connectivity(&t, &[a, c], &d, &p, &[ab]), 2.5 / 3.0);
    }

    #[test]
    fn os3e_coverage() {
        let t = os3e();
        let (d, p) = apsp(&t, false);
        let combo = [t.node_id("Chicago").unwrap()];
        let (a1, c1) = availability_one_combo(&t, &combo, &d, &p, false, 0.01, 1);
        assert_relative_eq!(c1, binomial_coverage(42, 0.01, 1), epsilon = 1e-9);
        assert_relative_eq!(c1, 0.933818, epsilon = 1e-6);
        assert!(a1 < c1);
        // at least the state without any failure
        assert!(a1 > 0.99f64.powi(42));

        let (a2, c2) = availability_one_combo(&t, &combo, &d, &p, false, 0.01, 2);
        assert_relative_eq!(c2, binomial_coverage(42, 0.01, 2), epsilon = 1e-9);
        assert_relative_eq!(c2, 0.991416, epsilon = 1e-6);
        assert!(a2 < c2);
        assert!(a2 > a1);
        assert!(c2 < 1.0);
    }

    #[test]
    fn unit_weights_are_consistent() {
        let t = os3e();
        let (d, p) = apsp(&t, true);
        let combo = t.node_ids(["Seattle", "Atlanta"]).unwrap();
        let weighted = availability_one_combo(&t, &combo, &d, &p, true, 0.02, 2);
        let unweighted = availability_one_combo(&t, &combo, &d, &p, false, 0.02, 2);
        assert_relative_eq!(weighted.0, unweighted.0, epsilon = 1e-12);
        assert_relative_eq!(weighted.1, unweighted.1, epsilon = 1e-12);
    }

    #[test]
    fn no_failures() {
        let t = os3e();
        let (d, p) = apsp(&t, false);
        let combo = [t.node_id("Chicago").unwrap()];
        let (a, c) = availability_one_combo(&t, &combo, &d, &p, false, 0.0, 2);
        assert_eq!(a, 1.0);
        assert_eq!(c, 1.0);
    }
}
