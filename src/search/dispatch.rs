//! Distribute the evaluation of placements over a fixed pool of worker threads.

use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    thread::JoinHandle,
};

use crossbeam::channel::{unbounded, Receiver, Sender};
use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{candidates, score, Aggregate, Combo, RunOptions, World};
use crate::Error;

/// How the candidates of a combo size are distributed over the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dispatch {
    /// Each worker enumerates all candidates, and evaluates every `workers`-th one.
    Coarse,
    /// The driver enumerates all candidates and sends them in rounds, each round containing at
    /// most one chunk of `chunk_size` candidates per worker.
    Fine {
        /// Number of candidates per chunk
        chunk_size: usize,
    },
}

/// A unit of work for a single worker.
#[derive(Debug, Clone)]
enum Task {
    /// Evaluate every candidate whose index `i` satisfies `i % stride == offset`.
    Stride {
        combo_size: usize,
        offset: usize,
        stride: usize,
        base_id: usize,
    },
    /// Evaluate the given candidates.
    Chunk {
        items: Vec<(usize, Combo)>,
        base_id: usize,
    },
}

impl Task {
    fn execute(self, world: &World, options: &RunOptions) -> Result<Aggregate, Error> {
        match self {
            Task::Stride {
                combo_size,
                offset,
                stride,
                base_id,
            } => {
                let items =
                    candidates(world, options, combo_size).filter(|(i, _)| i % stride == offset);
                score(world, options, items, base_id)
            }
            Task::Chunk { items, base_id } => score(world, options, items.into_iter(), base_id),
        }
    }
}

struct Job {
    task: Task,
    slot: usize,
    reply: Sender<(usize, Result<Aggregate, Error>)>,
}

/// A fixed set of worker threads. Each worker holds its own reference to the world and the
/// options, and all results are merged on the driver.
#[derive(Debug)]
pub struct WorkerPool {
    jobs: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    options: Arc<RunOptions>,
    world: Arc<World>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("task", &self.task).field("slot", &self.slot).finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

fn worker_loop(world: Arc<World>, options: Arc<RunOptions>, jobs: Receiver<Job>) {
    for job in jobs.iter() {
        let Job { task, slot, reply } = job;
        let result = catch_unwind(AssertUnwindSafe(|| task.execute(&world, &options)))
            .unwrap_or_else(|payload| Err(Error::WorkerFailed(panic_message(payload))));
        // the driver only stops listening after an error was already received.
        let _ = reply.send((slot, result));
    }
}

impl WorkerPool {
    /// Spawn `workers` threads.
    pub fn new(world: Arc<World>, options: Arc<RunOptions>, workers: usize) -> Result<Self, Error> {
        let (tx, rx) = unbounded::<Job>();
        let handles = (0..workers.max(1))
            .map(|w| {
                let world = world.clone();
                let options = options.clone();
                let rx = rx.clone();
                std::thread::Builder::new()
                    .name(format!("worker-{w}"))
                    .spawn(move || worker_loop(world, options, rx))
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!("spawned {} workers", handles.len());
        Ok(Self {
            jobs: Some(tx),
            handles,
            options,
            world,
        })
    }

    /// Number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    /// Evaluate all candidates of a combo size.
    pub fn run_size(&self, combo_size: usize, base_id: usize) -> Result<Aggregate, Error> {
        let workers = self.num_workers();
        match self.options.dispatch {
            Dispatch::Coarse => self.round(
                (0..workers)
                    .map(|offset| Task::Stride {
                        combo_size,
                        offset,
                        stride: workers,
                        base_id,
                    })
                    .collect(),
            ),
            Dispatch::Fine { chunk_size } => {
                let mut agg = self.options.aggregate();
                let mut items = candidates(&self.world, &self.options, combo_size);
                loop {
                    let tasks = (0..workers)
                        .map(|_| items.by_ref().take(chunk_size.max(1)).collect_vec())
                        .filter(|chunk| !chunk.is_empty())
                        .map(|items| Task::Chunk { items, base_id })
                        .collect_vec();
                    if tasks.is_empty() {
                        break;
                    }
                    agg.merge(self.round(tasks)?);
                }
                Ok(agg)
            }
        }
    }

    /// Send all tasks to the workers, wait for all of them, and merge the results in the order of
    /// the tasks.
    fn round(&self, tasks: Vec<Task>) -> Result<Aggregate, Error> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| Error::WorkerFailed("the pool is shut down".to_string()))?;
        let num_tasks = tasks.len();
        let (reply_tx, reply_rx) = unbounded();
        for (slot, task) in tasks.into_iter().enumerate() {
            jobs.send(Job {
                task,
                slot,
                reply: reply_tx.clone(),
            })
            .map_err(|_| Error::WorkerFailed("all workers have stopped".to_string()))?;
        }
        drop(reply_tx);

        let mut results: Vec<Option<Aggregate>> = (0..num_tasks).map(|_| None).collect();
        for (slot, result) in reply_rx.iter().take(num_tasks) {
            results[slot] = Some(result?);
        }

        let mut agg = self.options.aggregate();
        for result in results {
            let result =
                result.ok_or_else(|| Error::WorkerFailed("a worker did not reply".to_string()))?;
            agg.merge(result);
        }
        Ok(agg)
    }

    fn join_all(&mut self) -> Vec<String> {
        // dropping the sender terminates the loop of every worker.
        self.jobs = None;
        self.handles
            .drain(..)
            .filter_map(|h| h.join().err())
            .map(panic_message)
            .collect()
    }

    /// Stop all workers and wait for them to terminate.
    pub fn shutdown(mut self) -> Result<(), Error> {
        let errors = self.join_all();
        match errors.into_iter().next() {
            Some(e) => Err(Error::WorkerFailed(e)),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for e in self.join_all() {
            warn!("worker failed: {e}");
        }
    }
}
