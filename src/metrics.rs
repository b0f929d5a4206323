//! Metrics that score a controller placement (a combo) on a topology.
//!
//! All functions are pure: they only read the topology and the precomputed distance and path
//! tables. The placement is an ordered list of distinct nodes; whenever ties are broken by
//! order, the controller that appears first in the combo wins.

use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    algorithms::{DistanceTable, EdgeList, GraphList, NodeId, NodeList, PathTable, Topology},
    availability::availability_one_combo,
    search::World,
    Error,
};

/// The set of controllers that are equally close to a node.
pub type ClosestSet = SmallVec<[NodeId; 2]>;

/// The metrics that can be computed for a placement.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Metric {
    /// Always zero. Useful to measure the overhead of the search itself.
    Null,
    /// Average distance from each node to its closest controller.
    Latency,
    /// Average distance from each node to its second-closest controller.
    #[serde(rename = "latency_2")]
    #[strum(serialize = "latency_2")]
    Latency2,
    /// Largest distance from any node to its closest controller.
    WcLatency,
    /// Largest distance from any node to its second-closest controller.
    #[serde(rename = "wc_latency_2")]
    #[strum(serialize = "wc_latency_2")]
    WcLatency2,
    /// Jain's fairness index of the number of nodes assigned to each controller.
    Fairness,
    /// Fraction of all control traffic that crosses the most loaded link.
    Congestion,
    /// Expected fraction of nodes connected to their controller under random link failures.
    Availability,
}

impl Metric {
    /// Parse a metric from its short name, e.g., `wc_latency`.
    pub fn parse(name: &str) -> Result<Self, Error> {
        Metric::from_str(name).map_err(|_| Error::UnknownMetric(name.to_string()))
    }

    /// Return the long name, suitable for printing.
    pub fn full_name(&self) -> &'static str {
        match self {
            Metric::Latency => "average latency",
            Metric::WcLatency => "worst-case latency",
            m => m.into(),
        }
    }

    /// Compute the metric for the given placement.
    pub fn evaluate(&self, world: &World, combo: &[NodeId]) -> Result<f64, Error> {
        let topo = world.topo();
        let dist = world.distances();
        let n = topo.num_nodes() as f64;
        Ok(match self {
            Metric::Null => 0.0,
            Metric::Latency => total_latency(topo, combo, dist) / n,
            Metric::Latency2 => total_latency_2(topo, combo, dist) / n,
            Metric::WcLatency => worst_case_latency(topo, combo, dist),
            Metric::WcLatency2 => worst_case_latency_2(topo, combo, dist),
            Metric::Fairness => controller_split_fairness(topo, combo, dist),
            Metric::Congestion => congestion(topo, combo, dist, world.paths()),
            Metric::Availability => {
                let (link_fail_prob, max_failures) = world.params().get_availability()?;
                availability_one_combo(
                    topo,
                    combo,
                    dist,
                    world.paths(),
                    world.weighted(),
                    link_fail_prob,
                    max_failures,
                )
                .0
            }
        })
    }
}

/// Extra parameters for metrics that need more than the topology and the placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraParams {
    /// Probability that a link fails. If the world is weighted, this is the probability per unit
    /// of link weight.
    pub link_fail_prob: Option<f64>,
    /// Maximum number of simultaneous link failures to enumerate.
    pub max_failures: Option<usize>,
}

impl ExtraParams {
    /// Create the parameters required by [`Metric::Availability`].
    pub fn availability(link_fail_prob: f64, max_failures: usize) -> Self {
        Self {
            link_fail_prob: Some(link_fail_prob),
            max_failures: Some(max_failures),
        }
    }

    /// Get the link failure probability and the maximum number of failures, or fail if any of
    /// them is missing or out of range.
    pub fn get_availability(&self) -> Result<(f64, usize), Error> {
        let p = self.link_fail_prob.ok_or(Error::MissingParameter("link_fail_prob"))?;
        let f = self.max_failures.ok_or(Error::MissingParameter("max_failures"))?;
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::InvalidParameter {
                name: "link_fail_prob",
                value: p,
            });
        }
        Ok((p, f))
    }
}

/// Get the closest controller of `node`, together with its distance. Of all equally close
/// controllers, the first one in `combo` is returned.
pub fn closest_controller(
    dist: &DistanceTable,
    node: NodeId,
    combo: &[NodeId],
) -> Option<(NodeId, f64)> {
    let mut best: Option<(NodeId, f64)> = None;
    for &c in combo {
        let d = dist.dist(node, c);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((c, d));
        }
    }
    best
}

/// Get the second-closest controller of `node`, together with its distance.
///
/// Whenever a new closest controller is found, the previous closest one becomes the
/// second-closest. A controller that is exactly as close as the current closest one therefore
/// becomes the second-closest. Returns `None` if `combo` has less than two controllers.
pub fn second_closest_controller(
    dist: &DistanceTable,
    node: NodeId,
    combo: &[NodeId],
) -> Option<(NodeId, f64)> {
    let mut best: Option<(NodeId, f64)> = None;
    let mut second: Option<(NodeId, f64)> = None;
    for &c in combo {
        let d = dist.dist(node, c);
        if best.map_or(true, |(_, bd)| d < bd) {
            second = best;
            best = Some((c, d));
        } else if second.map_or(true, |(_, sd)| d < sd) {
            second = Some((c, d));
        }
    }
    second
}

/// Get the set of all controllers that are equally close to `node`.
pub fn closest_set(dist: &DistanceTable, node: NodeId, combo: &[NodeId]) -> ClosestSet {
    let mut set = ClosestSet::new();
    let mut best = f64::INFINITY;
    for &c in combo {
        let d = dist.dist(node, c);
        if d < best {
            best = d;
            set.clear();
            set.push(c);
        } else if d == best {
            set.push(c);
        }
    }
    set
}

/// Map each node to its closest controller.
pub fn closest_controllers(
    topo: &Topology,
    combo: &[NodeId],
    dist: &DistanceTable,
) -> NodeList<Option<NodeId>, crate::algorithms::TopologyType> {
    NodeList::from_fn(topo, |n| closest_controller(dist, n, combo).map(|(c, _)| c))
}

/// Map each node to its second-closest controller.
pub fn closest_controllers_2(
    topo: &Topology,
    combo: &[NodeId],
    dist: &DistanceTable,
) -> NodeList<Option<NodeId>, crate::algorithms::TopologyType> {
    NodeList::from_fn(topo, |n| second_closest_controller(dist, n, combo).map(|(c, _)| c))
}

fn closest_distances<'a>(
    topo: &'a Topology,
    combo: &'a [NodeId],
    dist: &'a DistanceTable,
) -> impl Iterator<Item = f64> + 'a {
    topo.node_indices().filter_map(move |n| closest_controller(dist, n, combo).map(|(_, d)| d))
}

fn second_closest_distances<'a>(
    topo: &'a Topology,
    combo: &'a [NodeId],
    dist: &'a DistanceTable,
) -> impl Iterator<Item = f64> + 'a {
    topo.node_indices()
        .filter_map(move |n| second_closest_controller(dist, n, combo).map(|(_, d)| d))
}

/// Sum of the distances from each node to its closest controller.
pub fn total_latency(topo: &Topology, combo: &[NodeId], dist: &DistanceTable) -> f64 {
    closest_distances(topo, combo, dist).sum()
}

/// Sum of the distances from each node to its second-closest controller. With a single
/// controller, this is the same as [`total_latency`].
pub fn total_latency_2(topo: &Topology, combo: &[NodeId], dist: &DistanceTable) -> f64 {
    if combo.len() == 1 {
        total_latency(topo, combo, dist)
    } else {
        second_closest_distances(topo, combo, dist).sum()
    }
}

/// Largest distance from any node to its closest controller.
pub fn worst_case_latency(topo: &Topology, combo: &[NodeId], dist: &DistanceTable) -> f64 {
    closest_distances(topo, combo, dist).fold(0.0, f64::max)
}

/// Largest distance from any node to its second-closest controller. With a single controller,
/// this is the same as [`worst_case_latency`].
pub fn worst_case_latency_2(topo: &Topology, combo: &[NodeId], dist: &DistanceTable) -> f64 {
    if combo.len() == 1 {
        worst_case_latency(topo, combo, dist)
    } else {
        second_closest_distances(topo, combo, dist).fold(0.0, f64::max)
    }
}

/// Fraction of nodes whose closest controller is at most `bound` away.
pub fn fraction_within_latency(
    topo: &Topology,
    combo: &[NodeId],
    dist: &DistanceTable,
    bound: f64,
) -> f64 {
    let within = closest_distances(topo, combo, dist).filter(|d| *d <= bound).count();
    within as f64 / topo.num_nodes() as f64
}

/// Jain's fairness index: `(Σv)² / (n · Σv²)`.
///
/// The result is 1 if all values are equal, and `k/n` if `k` values are equal and all others
/// are zero. If all values are zero, the result is NaN.
pub fn fairness(values: &[f64]) -> f64 {
    let sum: f64 = values.iter().sum();
    let sum_sq: f64 = values.iter().map(|v| v * v).sum();
    (sum * sum) / (values.len() as f64 * sum_sq)
}

/// Compute how many nodes are assigned to each controller. A node that is equally close to `k`
/// controllers contributes `1/k` to each of them. Only controllers with a non-zero allocation
/// are present in the result.
pub fn controller_allocations(
    topo: &Topology,
    combo: &[NodeId],
    dist: &DistanceTable,
) -> BTreeMap<NodeId, f64> {
    let mut allocations: BTreeMap<NodeId, f64> = BTreeMap::new();
    for n in topo.node_indices() {
        let closest = closest_set(dist, n, combo);
        let share = 1.0 / closest.len() as f64;
        for c in closest {
            *allocations.entry(c).or_default() += share;
        }
    }
    allocations
}

/// Jain's fairness index of the controller allocations (see [`controller_allocations`]).
pub fn controller_split_fairness(topo: &Topology, combo: &[NodeId], dist: &DistanceTable) -> f64 {
    let allocations = controller_allocations(topo, combo, dist);
    debug_assert!(
        (allocations.values().sum::<f64>() - topo.num_nodes() as f64).abs() < 1e-4,
        "allocations must sum up to the number of nodes"
    );
    fairness(&allocations.into_values().collect::<Vec<_>>())
}

/// Find the worst-case overlap of control traffic: the load on the single link that carries the
/// most control traffic, relative to the number of nodes.
///
/// Each node sends one unit of traffic to its closest controller, split equally among all
/// equally close ones, along the precomputed shortest path.
pub fn congestion(
    topo: &Topology,
    combo: &[NodeId],
    dist: &DistanceTable,
    paths: &PathTable,
) -> f64 {
    let mut traffic: EdgeList<f64, _> = EdgeList::new(&topo.graph);
    for n in topo.node_indices() {
        let closest = closest_set(dist, n, combo);
        let share = 1.0 / closest.len() as f64;
        for c in closest {
            for e in paths.path_edges(n, c) {
                traffic[e] += share;
            }
        }
    }
    let most_congested = traffic.iter().copied().fold(0.0, f64::max);
    most_congested / topo.num_nodes() as f64
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algorithms::apsp;
    use approx::assert_relative_eq;

    fn line() -> (Topology, DistanceTable, PathTable, [NodeId; 3]) {
        let mut t = Topology::new();
        t.add_path(&["A", "B", "C"]);
        let (d, p) = apsp(&t, false);
        let ids = ["A", "B", "C"].map(|n| t.node_id(n).unwrap());
        (t, d, p, ids)
    }

    #[test]
    fn fairness_best() {
        for case in [vec![1.0, 1.0, 1.0], vec![3.0, 3.0, 3.0, 3.0]] {
            assert_eq!(fairness(&case), 1.0);
        }
    }

    #[test]
    fn fairness_worst() {
        for case in [vec![1.0, 0.0, 0.0], vec![3.0, 0.0, 0.0, 0.0]] {
            assert_relative_eq!(fairness(&case), 1.0 / case.len() as f64);
        }
    }

    #[test]
    fn fairness_mix() {
        for case in [vec![2.0, 2.0, 0.0], vec![3.0, 0.0, 0.0, 0.0], vec![1.0, 1.0, 1.0, 0.0]] {
            let nonzeros = case.iter().filter(|x| **x != 0.0).count();
            assert_relative_eq!(fairness(&case), nonzeros as f64 / case.len() as f64);
        }
    }

    #[test]
    fn fairness_all_zero_is_nan() {
        assert!(fairness(&[0.0, 0.0]).is_nan());
    }

    #[test]
    fn line_latency() {
        let (t, d, _, [a, b, c]) = line();
        assert_eq!(total_latency(&t, &[a], &d), 3.0);
        assert_eq!(worst_case_latency(&t, &[a], &d), 2.0);
        assert_eq!(total_latency(&t, &[a, c], &d), 1.0);
        assert_eq!(worst_case_latency(&t, &[a, c], &d), 1.0);
        assert_eq!(total_latency(&t, &[b], &d), 2.0);
        // single controller falls back to the closest one
        assert_eq!(total_latency_2(&t, &[a], &d), 3.0);
        assert_eq!(worst_case_latency_2(&t, &[a], &d), 2.0);
        // second-closest: A -> C (2), B -> C (1, tie with A), C -> A (2)
        assert_eq!(total_latency_2(&t, &[a, c], &d), 5.0);
        assert_eq!(worst_case_latency_2(&t, &[a, c], &d), 2.0);
    }

    #[test]
    fn tie_break_follows_combo_order() {
        let (t, d, _, [a, b, c]) = line();
        assert_eq!(closest_controller(&d, b, &[a, c]), Some((a, 1.0)));
        assert_eq!(closest_controller(&d, b, &[c, a]), Some((c, 1.0)));
        assert_eq!(second_closest_controller(&d, b, &[a, c]), Some((c, 1.0)));
        assert_eq!(second_closest_controller(&d, b, &[c, a]), Some((a, 1.0)));
        assert_eq!(second_closest_controller(&d, b, &[a]), None);
        assert_eq!(closest_set(&d, b, &[a, c]).as_slice(), &[a, c]);
        let closest = closest_controllers(&t, &[a, c], &d);
        assert_eq!(closest[b], Some(a));
        let closest_2 = closest_controllers_2(&t, &[a, c], &d);
        assert_eq!(closest_2[a], Some(c));
        assert_eq!(closest_2[b], Some(c));
    }

    #[test]
    fn split_fairness() {
        let (t, d, _, [a, b, c]) = line();
        let alloc = controller_allocations(&t, &[a, c], &d);
        assert_relative_eq!(alloc[&a], 1.5);
        assert_relative_eq!(alloc[&c], 1.5);
        assert_relative_eq!(controller_split_fairness(&t, &[a, c], &d), 1.0);
        // A gets A, C gets B and C
        let alloc = controller_allocations(&t, &[a, b], &d);
        assert_relative_eq!(alloc[&a], 1.0);
        assert_relative_eq!(alloc[&b], 2.0);
        assert_relative_eq!(controller_split_fairness(&t, &[a, b], &d), 9.0 / 10.0);
    }

    #[test]
    fn line_congestion() {
        let (t, d, p, [a, b, c]) = line();
        // B and C send over A-B, C also over B-C.
        assert_relative_eq!(congestion(&t, &[a], &d, &p), 2.0 / 3.0);
        // B splits its traffic equally
        assert_relative_eq!(congestion(&t, &[a, c], &d, &p), 0.5 / 3.0);
        assert_relative_eq!(congestion(&t, &[a, b, c], &d, &p), 0.0);
    }

    #[test]
    fn within_latency() {
        let (t, d, _, [a, _, c]) = line();
        assert_eq!(fraction_within_latency(&t, &[a], &d, d.diameter() + 1.0), 1.0);
        assert_relative_eq!(fraction_within_latency(&t, &[a], &d, 1e-6), 1.0 / 3.0);
        assert_relative_eq!(fraction_within_latency(&t, &[a, c], &d, 1e-6), 2.0 / 3.0);
        assert_relative_eq!(fraction_within_latency(&t, &[a], &d, 1.0), 2.0 / 3.0);
    }

    #[test]
    fn within_latency_os3e() {
        let t = crate::topologies::os3e();
        let (d, _) = apsp(&t, false);
        let combos = [
            vec!["Sunnyvale, CA", "Boston"],
            vec!["Portland"],
            vec!["Sunnyvale, CA", "Salt Lake City"],
            vec!["Seattle", "Boston"],
            vec!["Seattle", "Portland"],
        ];
        for names in combos {
            let combo = t.node_ids(names).unwrap();
            assert_eq!(fraction_within_latency(&t, &combo, &d, d.diameter() + 1.0), 1.0);
            assert_eq!(
                fraction_within_latency(&t, &combo, &d, 1e-6),
                combo.len() as f64 / 34.0
            );
        }
    }

    #[test]
    fn metric_names() {
        assert_eq!(Metric::parse("latency_2").unwrap(), Metric::Latency2);
        assert_eq!(Metric::parse("wc_latency").unwrap(), Metric::WcLatency);
        assert_eq!(Metric::WcLatency2.to_string(), "wc_latency_2");
        assert_eq!(Metric::Latency.full_name(), "average latency");
        assert_eq!(Metric::Congestion.full_name(), "congestion");
        assert!(matches!(Metric::parse("latency3"), Err(Error::UnknownMetric(_))));
        assert_eq!(serde_json::to_string(&Metric::Latency2).unwrap(), "\"latency_2\"");
    }

    #[test]
    fn missing_availability_params() {
        assert!(matches!(
            ExtraParams::default().get_availability(),
            Err(Error::MissingParameter("link_fail_prob"))
        ));
        let half = ExtraParams {
            link_fail_prob: Some(0.1),
            max_failures: None,
        };
        assert!(matches!(half.get_availability(), Err(Error::MissingParameter("max_failures"))));
        assert!(matches!(
            ExtraParams::availability(1.5, 1).get_availability(),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
