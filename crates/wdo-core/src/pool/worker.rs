//! Worker loop: take a task, fetch the file, log the outcome, acknowledge.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::api::FileSource;

use super::guard::TaskDoneGuard;
use super::log::{clock_stamp, round_secs, ErrorLogEntry, ResponseLogEntry};
use super::queue::{Message, TaskQueue};
use super::DownloadTask;

/// Everything a worker needs, handed over at spawn time.
pub(super) struct WorkerContext {
    pub(super) id: usize,
    pub(super) queue: Arc<TaskQueue<DownloadTask>>,
    pub(super) source: Arc<dyn FileSource>,
}

/// Runs until a `Shutdown` message arrives. Returns the number of tasks processed.
pub(super) fn run_worker(ctx: WorkerContext) -> usize {
    let mut processed = 0;
    loop {
        let task = match ctx.queue.pop() {
            Message::Shutdown => break,
            Message::Work(task) => task,
        };
        let _done = TaskDoneGuard { queue: &*ctx.queue };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            process_task(ctx.source.as_ref(), &task)
        }));
        if outcome.is_err() {
            tracing::error!(worker = ctx.id, file_id = %task.file_id, "download panicked");
            task.log.record_failure(
                failure_entry(&task, "worker panicked".to_string(), 0.0, clock_stamp()),
                error_entry(ctx.source.as_ref(), &task, clock_stamp()),
            );
        }
        processed += 1;
    }
    tracing::trace!(worker = ctx.id, processed, "worker exiting");
    processed
}

fn failure_entry(
    task: &DownloadTask,
    error_message: String,
    duration: f64,
    timestamp: String,
) -> ResponseLogEntry {
    ResponseLogEntry {
        order_id: task.order_id.clone(),
        file_id: task.file_id.clone(),
        error: true,
        error_message,
        file_size: 0,
        time_to_first_byte: 0.0,
        duration,
        file: None,
        timestamp,
    }
}

fn error_entry(source: &dyn FileSource, task: &DownloadTask, timestamp: String) -> ErrorLogEntry {
    ErrorLogEntry {
        url: source.file_url(&task.order_id, &task.file_id),
        file_id: task.file_id.clone(),
        order_id: task.order_id.clone(),
        folder: task.folder.clone(),
        timestamp,
    }
}

/// Fetch one file and append exactly one response entry (plus one error entry on failure).
fn process_task(source: &dyn FileSource, task: &DownloadTask) {
    let timestamp = clock_stamp();
    let start = Instant::now();
    let result = source.fetch_file(&task.order_id, &task.file_id, &task.dest_path());
    let duration = round_secs(start.elapsed());

    match result {
        Ok(fetched) => {
            tracing::debug!(
                order_id = %task.order_id,
                file_id = %task.file_id,
                bytes = fetched.bytes,
                duration,
                "downloaded"
            );
            task.log.record_success(ResponseLogEntry {
                order_id: task.order_id.clone(),
                file_id: task.file_id.clone(),
                error: false,
                error_message: String::new(),
                file_size: fetched.bytes,
                time_to_first_byte: round_secs(fetched.time_to_first_byte),
                duration,
                file: Some(fetched.path),
                timestamp,
            });
        }
        Err(e) => {
            tracing::warn!(order_id = %task.order_id, file_id = %task.file_id, "file failed: {}", e);
            task.log.record_failure(
                failure_entry(task, e.to_string(), duration, timestamp.clone()),
                error_entry(source, task, timestamp),
            );
        }
    }
}
