//! ctrlplace: evaluating CONTROLLER PLACEments in software-defined networks.
//!
//! Given a topology and a set of candidate controller locations, this crate computes the quality
//! of each placement (latency, worst-case latency, fairness, congestion of control traffic and
//! availability under link failures), and searches the space of placements using exhaustive
//! enumeration, random sampling, greedy construction and simulated annealing.
//!
//! The typical pipeline is:
//!
//! 1. Build a [`algorithms::Topology`] (e.g., [`topologies::os3e`]).
//! 2. Create a [`search::World`], which computes the all-pairs shortest paths once.
//! 3. Configure a [`search::RunOptions`] and call [`search::run`], or use
//!    [`search::iterative::run`] for the step-wise algorithms.

#![deny(missing_docs, missing_debug_implementations)]
#![allow(clippy::type_complexity)]

use indicatif::{ProgressBar, ProgressBarIter, ProgressFinish, ProgressIterator, ProgressStyle};

pub mod algorithms;
pub mod availability;
mod error;
pub mod metrics;
pub mod output;
pub mod search;
#[cfg(test)]
mod tests;
pub mod topologies;

pub use error::Error;

pub(crate) const PROGRESS_TEMPLATE: &str =
    "{msg:50} {pos:>9}/{len:<9} {elapsed:>3}/{eta:<3} [{wide_bar}] {percent:>3}%";

/// The shared progress style
pub fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

pub(crate) fn my_progress(
    msg: impl Into<String>,
    len: usize,
    keep: bool,
    show: bool,
) -> ProgressBar {
    if show {
        ProgressBar::new(len as u64)
            .with_style(progress_style())
            .with_finish(if keep {
                ProgressFinish::AndLeave
            } else {
                ProgressFinish::AndClear
            })
            .with_message(msg.into())
    } else {
        ProgressBar::hidden()
    }
}

pub(crate) trait MyProgressIterator
where
    Self: Sized + Iterator,
{
    /// Wrap an iterator with a custom progress bar.
    fn my_progress_with(self, progress: ProgressBar) -> ProgressBarIter<Self>;

    /// Wrap an iterator with an explicit element count and default styling.
    fn my_progress_count(
        self,
        msg: impl Into<String>,
        len: usize,
        keep: bool,
        show: bool,
    ) -> ProgressBarIter<Self> {
        self.my_progress_with(my_progress(msg, len, keep, show))
    }
}

impl<I, T: Iterator<Item = I>> MyProgressIterator for T {
    fn my_progress_with(self, progress: ProgressBar) -> ProgressBarIter<Self> {
        self.progress_with(progress)
    }
}

/// Binomial coefficient `n choose k`, as a floating-point number.
pub fn choose(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}
