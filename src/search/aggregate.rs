//! Running aggregates over all placements of a single combo size.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Evaluation, World};
use crate::{
    algorithms::NodeId,
    metrics::Metric,
    output::{nan_if_null, nan_if_null_values, GroupReport},
};

/// Running statistics of a single metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricAggregate {
    highest: f64,
    highest_combo: Option<Vec<String>>,
    lowest: f64,
    lowest_combo: Option<Vec<String>>,
    duration: f64,
    sum: f64,
    num: usize,
    values: Option<Vec<f64>>,
}

impl MetricAggregate {
    /// Create an empty aggregate. If `median` is set, all values are kept in order to compute
    /// the median at the end.
    pub fn new(median: bool) -> Self {
        Self {
            highest: f64::NEG_INFINITY,
            highest_combo: None,
            lowest: f64::INFINITY,
            lowest_combo: None,
            duration: 0.0,
            sum: 0.0,
            num: 0,
            values: median.then(Vec::new),
        }
    }

    /// Add a single value. On ties, the combo that was recorded first is kept as extreme.
    pub fn record(&mut self, value: f64, duration: f64, combo: &[String]) {
        self.duration += duration;
        if value < self.lowest {
            self.lowest = value;
            self.lowest_combo = Some(combo.to_vec());
        }
        if value > self.highest {
            self.highest = value;
            self.highest_combo = Some(combo.to_vec());
        }
        if let Some(values) = self.values.as_mut() {
            values.push(value);
        }
        self.sum += value;
        self.num += 1;
    }

    /// Merge `other` into `self`, as if all values of `other` were recorded after those of
    /// `self`.
    pub fn merge(&mut self, other: MetricAggregate) {
        if other.highest > self.highest {
            self.highest = other.highest;
            self.highest_combo = other.highest_combo;
        }
        if other.lowest < self.lowest {
            self.lowest = other.lowest;
            self.lowest_combo = other.lowest_combo;
        }
        self.duration += other.duration;
        self.sum += other.sum;
        self.num += other.num;
        match (self.values.as_mut(), other.values) {
            (Some(values), Some(other)) => values.extend(other),
            (None, Some(other)) => self.values = Some(other),
            _ => {}
        }
    }

    /// Number of recorded values.
    pub fn num(&self) -> usize {
        self.num
    }

    /// Compute the mean and the median
    pub fn finalize(self) -> MetricSummary {
        MetricSummary {
            highest: self.highest,
            highest_combo: self.highest_combo.unwrap_or_default(),
            lowest: self.lowest,
            lowest_combo: self.lowest_combo.unwrap_or_default(),
            mean: self.sum / self.num as f64,
            median: self.values.map(median),
            duration: self.duration,
            sum: self.sum,
            num: self.num,
        }
    }
}

/// Median of a list of values. For an even number of values, the mean of the two middle ones is
/// returned. The median of an empty list is NaN.
pub fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Finalized statistics of a single metric over all placements of one combo size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// The largest value
    #[serde(deserialize_with = "nan_if_null")]
    pub highest: f64,
    /// The placement with the largest value
    pub highest_combo: Vec<String>,
    /// The smallest value
    #[serde(deserialize_with = "nan_if_null")]
    pub lowest: f64,
    /// The placement with the smallest value
    pub lowest_combo: Vec<String>,
    /// The average value
    #[serde(deserialize_with = "nan_if_null")]
    pub mean: f64,
    /// The median value, only computed if requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    /// Total time spent computing this metric, in seconds.
    #[serde(deserialize_with = "nan_if_null")]
    pub duration: f64,
    /// Sum of all values
    #[serde(deserialize_with = "nan_if_null")]
    pub sum: f64,
    /// Number of values
    pub num: usize,
}

/// A single point of the distribution: the values of all metrics for one placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionEntry {
    /// Unique id of the point, across all combo sizes of a run.
    pub id: usize,
    /// The value of each metric.
    #[serde(flatten, deserialize_with = "nan_if_null_values")]
    pub values: BTreeMap<Metric, f64>,
    /// The placement itself, only written if requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combo: Option<Vec<String>>,
}

/// Aggregated results for all placements of one combo size.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    metrics: Vec<(Metric, MetricAggregate)>,
    distribution: Vec<DistributionEntry>,
    write_dist: bool,
    write_combos: bool,
}

impl Aggregate {
    /// Create a new, empty aggregate.
    pub fn new(metrics: &[Metric], median: bool, write_dist: bool, write_combos: bool) -> Self {
        Self {
            metrics: metrics.iter().map(|m| (*m, MetricAggregate::new(median))).collect(),
            distribution: Vec::new(),
            write_dist,
            write_combos,
        }
    }

    /// Record the evaluation of `combo`, with the given point id.
    pub fn record(&mut self, world: &World, id: usize, combo: &[NodeId], eval: &Evaluation) {
        let names = world.topo().names(combo);
        let mut values = BTreeMap::new();
        for (metric, agg) in self.metrics.iter_mut() {
            let Some((_, v)) = eval.iter().find(|(m, _)| m == metric) else {
                continue;
            };
            agg.record(v.value, v.duration, &names);
            values.insert(*metric, v.value);
        }
        if self.write_dist {
            self.distribution.push(DistributionEntry {
                id,
                values,
                combo: self.write_combos.then_some(names),
            });
        }
    }

    /// Merge `other` into `self`.
    pub fn merge(&mut self, other: Aggregate) {
        for ((m, agg), (m_other, agg_other)) in self.metrics.iter_mut().zip(other.metrics) {
            debug_assert_eq!(*m, m_other);
            agg.merge(agg_other);
        }
        self.distribution.extend(other.distribution);
    }

    /// Get the running aggregate of a metric.
    pub fn get(&self, metric: Metric) -> Option<&MetricAggregate> {
        self.metrics.iter().find(|(m, _)| *m == metric).map(|(_, a)| a)
    }

    /// Number of placements recorded.
    pub fn num_points(&self) -> usize {
        self.metrics.first().map(|(_, a)| a.num()).unwrap_or_default()
    }

    /// Finalize all metrics. The distribution is ordered by point id.
    pub fn finalize(self) -> GroupReport {
        let mut distribution = self.distribution;
        distribution.sort_by_key(|e| e.id);
        GroupReport {
            metrics: self.metrics.into_iter().map(|(m, a)| (m, a.finalize())).collect(),
            distribution,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn combo(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    #[test]
    fn extremes_keep_first() {
        let mut agg = MetricAggregate::new(false);
        agg.record(1.0, 0.1, &combo("a"));
        agg.record(1.0, 0.1, &combo("b"));
        agg.record(0.5, 0.1, &combo("c"));
        let s = agg.finalize();
        assert_eq!(s.highest_combo, combo("a"));
        assert_eq!(s.lowest_combo, combo("c"));
        assert_eq!(s.num, 3);
        assert_relative_eq!(s.mean, 2.5 / 3.0);
        assert_relative_eq!(s.duration, 0.3);
        assert_eq!(s.median, None);
    }

    #[test]
    fn median_like_numpy() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(vec![1.0]), 1.0);
        assert!(median(vec![]).is_nan());
    }

    #[test]
    fn merge_equals_single() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let mut single = MetricAggregate::new(true);
        values.iter().enumerate().for_each(|(i, v)| single.record(*v, 0.0, &combo(&i.to_string())));

        let mut left = MetricAggregate::new(true);
        let mut right = MetricAggregate::new(true);
        for (i, v) in values.iter().enumerate() {
            if i % 3 == 0 {
                left.record(*v, 0.0, &combo(&i.to_string()));
            } else {
                right.record(*v, 0.0, &combo(&i.to_string()));
            }
        }
        left.merge(right);

        let (a, b) = (single.finalize(), left.finalize());
        assert_eq!(a.highest, b.highest);
        assert_eq!(a.lowest, b.lowest);
        assert_eq!(a.highest_combo, b.highest_combo);
        assert_eq!(a.num, b.num);
        assert_relative_eq!(a.sum, b.sum);
        assert_eq!(a.median, b.median);
        assert_eq!(a.median, Some(3.5));
    }

    #[test]
    fn distribution_entry_json() {
        let entry = DistributionEntry {
            id: 3,
            values: maplit::btreemap! {Metric::Latency => 1.5, Metric::WcLatency2 => 2.0},
            combo: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"id": 3, "latency": 1.5, "wc_latency_2": 2.0}));
        let back: DistributionEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
