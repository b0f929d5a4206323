//! Module containing all error types

use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Only link failures are modelled.
    #[error("Only link failures are supported (node failure probability must be 0)")]
    NodeFailureUnsupported,
    /// More than one failure is expected at a time, which the single-failure model cannot handle.
    #[error("Unable to handle the case where more than one failure is typical (p={link_fail_prob} on {nodes} nodes)")]
    FailureRegime {
        /// Per-link failure probability
        link_fail_prob: f64,
        /// Number of nodes in the topology
        nodes: usize,
    },
    /// The single-failure and the multiple-failure code paths disagree.
    #[error("Availability consistency check failed: single={single}, multiple={multiple}")]
    ConsistencyCheck {
        /// Result of the single-failure computation
        single: f64,
        /// Result of the multiple-failure computation
        multiple: f64,
    },
    /// A required extra parameter is missing.
    #[error("Missing required parameter `{0}`")]
    MissingParameter(&'static str),
    /// A parameter has a value outside of its domain.
    #[error("Invalid value for parameter `{name}`: {value}")]
    InvalidParameter {
        /// Name of the parameter
        name: &'static str,
        /// The rejected value
        value: f64,
    },
    /// The metric name is not known.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),
    /// The connection algorithm or search algorithm name is not known.
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),
    /// A node name does not exist in the topology.
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    /// A link cannot be added to the topology.
    #[error("Invalid link {src} -- {dst}: {reason}")]
    InvalidLink {
        /// First endpoint
        src: String,
        /// Second endpoint
        dst: String,
        /// Why the link was rejected
        reason: &'static str,
    },
    /// The requested combo size cannot be realized on the topology.
    #[error("Invalid combo size {size} for a topology with {nodes} nodes")]
    InvalidComboSize {
        /// The requested number of controllers
        size: usize,
        /// Number of nodes in the topology
        nodes: usize,
    },
    /// The topology has no nodes.
    #[error("The topology is empty")]
    EmptyTopology,
    /// Some nodes cannot reach each other.
    #[error("The topology is not connected")]
    Disconnected,
    /// A worker in the pool returned an error or crashed.
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
    /// IO Error
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// Error while reading or writing JSON
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    /// Error while writing CSV
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
}
