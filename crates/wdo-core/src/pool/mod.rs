//! Fixed-size worker pool for one order's files.
//!
//! Tasks go onto a shared queue in a single batch; N named OS threads pull
//! from it, each task is acknowledged exactly once, and the pool waits for
//! every acknowledgement before shutting the workers down.

mod debug;
mod guard;
mod log;
mod queue;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};

use crate::api::FileSource;

pub use debug::DebugStepper;
pub use log::{clock_stamp, round_secs, ErrorLogEntry, OrderLog, OrderLogs, ResponseLogEntry};
pub use queue::{Message, TaskQueue};

use worker::{run_worker, WorkerContext};

/// One file to fetch into a run folder.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub order_id: String,
    pub file_id: String,
    pub folder: PathBuf,
    pub file_name: String,
    pub log: Arc<OrderLog>,
}

impl DownloadTask {
    pub fn dest_path(&self) -> PathBuf {
        self.folder.join(&self.file_name)
    }
}

/// Counters for one `run_order` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub enqueued: usize,
    pub processed: usize,
}

pub struct WorkerPool {
    workers: usize,
    source: Arc<dyn FileSource>,
}

impl WorkerPool {
    pub fn new(workers: usize, source: Arc<dyn FileSource>) -> Self {
        Self {
            workers: workers.max(1),
            source,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Download every task and return once all of them have been acknowledged
    /// and the worker threads have exited.
    pub fn run_order(&self, tasks: Vec<DownloadTask>) -> Result<PoolStats> {
        let queue = Arc::new(TaskQueue::new());
        let mut handles = Vec::with_capacity(self.workers);

        for id in 0..self.workers {
            let ctx = WorkerContext {
                id,
                queue: Arc::clone(&queue),
                source: Arc::clone(&self.source),
            };
            let spawned = thread::Builder::new()
                .name(format!("wdo-worker-{}", id))
                .spawn(move || run_worker(ctx));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    queue.shutdown(handles.len());
                    for h in handles {
                        let _ = h.join();
                    }
                    return Err(e).context("failed to spawn download worker");
                }
            }
        }

        let enqueued = queue.push_batch(tasks);
        tracing::debug!(enqueued, workers = self.workers, "queued order files");
        queue.join();
        queue.shutdown(handles.len());

        let mut processed = 0;
        for h in handles {
            match h.join() {
                Ok(n) => processed += n,
                Err(_) => tracing::error!("download worker exited abnormally"),
            }
        }
        Ok(PoolStats {
            enqueued,
            processed,
        })
    }
}
