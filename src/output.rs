//! Reports of a run, and how they are written to disk.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use itertools::Itertools;
use log::info;
use serde::{Deserialize, Deserializer, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    metrics::Metric,
    search::{DistributionEntry, MetricSummary},
    Error,
};

/// Results for all placements of one combo size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    /// Summary of each metric.
    #[serde(flatten)]
    pub metrics: BTreeMap<Metric, MetricSummary>,
    /// All placements that were evaluated (empty if the distribution is not written).
    #[serde(default)]
    pub distribution: Vec<DistributionEntry>,
}

/// Results of an entire run, for all combo sizes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// The results, keyed by the combo size.
    pub data: BTreeMap<usize, GroupReport>,
    /// All metrics that were computed.
    pub metric: Vec<Metric>,
    /// All combo sizes, as strings.
    pub group: Vec<String>,
}

impl RunReport {
    /// Create an empty report
    pub fn new(metrics: &[Metric], combo_sizes: &[usize]) -> Self {
        Self {
            data: BTreeMap::new(),
            metric: metrics.to_vec(),
            group: combo_sizes.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Get the summary of a metric for a given combo size.
    pub fn summary(&self, combo_size: usize, metric: Metric) -> Option<&MetricSummary> {
        self.data.get(&combo_size)?.metrics.get(&metric)
    }

    /// Log a summary for each combo size and each metric.
    pub fn log_summary(&self) {
        for (size, group) in self.data.iter() {
            info!("combo size {size}");
            for (metric, s) in group.metrics.iter() {
                info!(
                    "    {:<18} lowest {:>10.4} {:?}, highest {:>10.4}, mean {:>10.4} ({} placements, {:.3}s)",
                    metric.full_name(),
                    s.lowest,
                    s.lowest_combo,
                    s.highest,
                    s.mean,
                    s.num,
                    s.duration
                );
            }
        }
    }
}

/// Read a float that may be `null`. JSON cannot represent NaN or infinities, and `serde_json`
/// writes them as `null`; they are read back as NaN.
pub(crate) fn nan_if_null<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
}

/// Like [`nan_if_null`], for every value of a map of metrics.
pub(crate) fn nan_if_null_values<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<BTreeMap<Metric, f64>, D::Error> {
    Ok(BTreeMap::<Metric, Option<f64>>::deserialize(d)?
        .into_iter()
        .map(|(m, v)| (m, v.unwrap_or(f64::NAN)))
        .collect())
}

/// Generate a filename that carries the current timestamp: `{prefix}-{date}.{ext}`.
pub fn filename_with_timestamp(prefix: impl std::fmt::Display, ext: &str) -> String {
    let now = OffsetDateTime::now_utc();
    let date = now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string());
    format!("{prefix}-{date}.{ext}")
}

/// Write any serializable value as pretty-printed JSON.
pub fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    info!("written {}", path.as_ref().display());
    Ok(())
}

/// Read a report that was previously written with [`write_json`].
pub fn read_report(path: impl AsRef<Path>) -> Result<RunReport, Error> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Write the distribution of all combo sizes as CSV. The columns are the combo size, the point
/// id, one column per metric, and the placement (names separated by `;`, empty if not stored).
pub fn write_distribution_csv(report: &RunReport, path: impl AsRef<Path>) -> Result<(), Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .has_headers(false)
        .from_path(path.as_ref())?;

    let header = ["combo_size", "id"]
        .into_iter()
        .map(String::from)
        .chain(report.metric.iter().map(|m| m.to_string()))
        .chain(std::iter::once("combo".to_string()))
        .collect_vec();
    writer.write_record(&header)?;

    for (size, group) in report.data.iter() {
        for entry in group.distribution.iter() {
            let record = [size.to_string(), entry.id.to_string()]
                .into_iter()
                .chain(report.metric.iter().map(|m| {
                    entry.values.get(m).map(|v| v.to_string()).unwrap_or_default()
                }))
                .chain(std::iter::once(
                    entry.combo.as_ref().map(|c| c.join(";")).unwrap_or_default(),
                ))
                .collect_vec();
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    info!("written {}", path.as_ref().display());
    Ok(())
}
