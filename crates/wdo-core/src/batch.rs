//! One batch: select runs, plan files, download each order through a fresh
//! worker pool, write reports, then optionally retry the failures.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;

use crate::api::{ApiClient, FileSource, OrderList, OrderSummary};
use crate::layout::OutputLayout;
use crate::plan::{OrderPlan, RunPlan, FILE_EXTENSION};
use crate::pool::{DebugStepper, OrderLog, WorkerPool};
use crate::report::{batch_stamp_now, ReportWriter};
use crate::retry::{RetryCoordinator, RetryManifest, RetryOutcome};
use crate::select::{MarkerStore, RunSelector, Selection, SkipReason};
use crate::settings::{BatchSettings, RunMode};
use crate::storage;

/// How a single order ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    /// Not in the caller's active order list.
    NotFound,
    Skipped(SkipReason),
    /// Runs were selected but the manifest had no matching files.
    NoFiles,
    Downloaded { files: usize, failed: usize },
}

#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub order_id: String,
    pub status: OrderStatus,
    pub summary: Option<PathBuf>,
    pub failures: Option<PathBuf>,
    pub joined: Vec<PathBuf>,
}

impl OrderOutcome {
    fn without_files(order_id: &str, status: OrderStatus) -> Self {
        Self {
            order_id: order_id.to_string(),
            status,
            summary: None,
            failures: None,
            joined: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch_stamp: String,
    pub orders: Vec<OrderOutcome>,
    /// Files enqueued across all orders.
    pub attempted: usize,
    /// Failures of the download phase, before any retry.
    pub manifest: RetryManifest,
    pub retry: Option<RetryOutcome>,
}

impl BatchOutcome {
    pub fn failed(&self) -> usize {
        match &self.retry {
            Some(r) => r.still_in_error.len(),
            None => self.manifest.len(),
        }
    }
}

/// An order whose runs get joined once the retry pass has settled.
struct PendingJoin {
    order_index: usize,
    plan: OrderPlan,
    /// Stored path of every file fetched so far, by file id.
    stored: HashMap<String, PathBuf>,
}

pub struct Batch {
    settings: BatchSettings,
    client: Arc<ApiClient>,
    pool: WorkerPool,
    layout: OutputLayout,
    markers: MarkerStore,
    reports: ReportWriter,
}

impl Batch {
    /// Build the client and output layout. Fails on a bad base URL or an
    /// unwritable root.
    pub fn new(settings: BatchSettings) -> Result<Self> {
        let client = Arc::new(ApiClient::from_settings(&settings)?);
        let layout = OutputLayout::new(&settings.root);
        layout
            .ensure()
            .with_context(|| format!("creating output folders under {}", layout.root().display()))?;

        let source: Arc<dyn FileSource> = if settings.debug {
            Arc::new(DebugStepper::stdio(client.clone()))
        } else {
            client.clone()
        };
        let workers = settings.effective_workers();
        Ok(Self {
            pool: WorkerPool::new(workers, source),
            markers: MarkerStore::new(layout.clone()),
            reports: ReportWriter::new(layout.clone(), batch_stamp_now(), workers),
            layout,
            client,
            settings,
        })
    }

    pub fn run(&self) -> Result<BatchOutcome> {
        let orders = self
            .client
            .fetch_my_orders()
            .context("failed to get the list of active orders")?;
        tracing::info!(active = orders.orders.len(), requested = self.settings.orders.len(), "batch starting");

        let model_runs = match self.settings.run_mode {
            RunMode::Latest => self
                .client
                .fetch_model_runs(&orders.models_for(&self.settings.orders)),
            RunMode::Explicit(_) => HashMap::new(),
        };
        let selector = RunSelector::new(&self.settings.run_mode, &model_runs, &self.markers);

        let mut outcome = BatchOutcome {
            batch_stamp: self.reports.batch_stamp().to_string(),
            orders: Vec::with_capacity(self.settings.orders.len()),
            attempted: 0,
            manifest: RetryManifest::new(),
            retry: None,
        };
        let mut joins = Vec::new();
        for order_id in &self.settings.orders {
            let order = self.process_order(&orders, &selector, order_id, &mut outcome, &mut joins)?;
            outcome.orders.push(order);
        }

        if let Some(cooldown) = self.settings.retry_cooldown {
            if !outcome.manifest.is_empty() {
                let retry = RetryCoordinator::new(self.client.as_ref(), &self.reports, cooldown)
                    .run(outcome.manifest.clone(), outcome.attempted)
                    .context("retry pass aborted")?;
                tracing::info!(
                    recovered = retry.recovered.len(),
                    still_in_error = retry.still_in_error.len(),
                    "retry pass finished"
                );
                outcome.retry = Some(retry);
            }
        }

        self.join_pending(joins, &mut outcome)?;
        Ok(outcome)
    }

    fn process_order(
        &self,
        orders: &OrderList,
        selector: &RunSelector<'_>,
        order_id: &str,
        batch: &mut BatchOutcome,
        joins: &mut Vec<PendingJoin>,
    ) -> Result<OrderOutcome> {
        let Some(order) = orders.find(order_id) else {
            tracing::error!(order_id, "order not found in active orders, skipping");
            return Ok(OrderOutcome::without_files(order_id, OrderStatus::NotFound));
        };
        let runs = match selector
            .select(order)
            .with_context(|| format!("updating latest-run marker for {}", order_id))?
        {
            Selection::Runs(runs) => runs,
            Selection::Skip(reason) => {
                tracing::warn!(order_id, "skipping order: {}", reason);
                return Ok(OrderOutcome::without_files(order_id, OrderStatus::Skipped(reason)));
            }
        };
        self.download_order(order, &runs, batch, joins)
    }

    fn download_order(
        &self,
        order: &OrderSummary,
        runs: &[String],
        batch: &mut BatchOutcome,
        joins: &mut Vec<PendingJoin>,
    ) -> Result<OrderOutcome> {
        let order_id = order.order_id.as_str();
        let started = Local::now();
        let run_filter = match runs {
            [only] => Some(only.as_str()),
            _ => None,
        };
        let details = self
            .client
            .fetch_order_details(order_id, run_filter)
            .with_context(|| format!("failed to get details of order {}", order_id))?;

        let dated = self.settings.folder_date.then_some(started);
        let plan = OrderPlan::build(
            order_id,
            &details.file_ids(),
            runs,
            self.settings.files_per_order,
            &self.layout.downloaded(),
            dated,
        );
        if plan.file_count() == 0 {
            tracing::warn!(order_id, ?runs, "no files in the order for the selected runs");
            return Ok(OrderOutcome::without_files(order_id, OrderStatus::NoFiles));
        }
        plan.create_folders()
            .with_context(|| format!("creating run folders for {}", order_id))?;

        let log = Arc::new(OrderLog::default());
        let tasks = plan.tasks(&log, self.settings.guid_file_names);
        tracing::info!(order_id, files = tasks.len(), workers = self.pool.workers(), "downloading order");
        let stats = self.pool.run_order(tasks)?;
        batch.attempted += stats.enqueued;

        let logs = log.take();
        let finished = Local::now();
        let failures = self.reports.write_failures(order_id, &logs.errors)?;
        if let Some(path) = &failures {
            tracing::warn!(order_id, failed = logs.failed(), path = %path.display(), "detected download failures");
        }
        let summary = self
            .reports
            .write_summary(order_id, &logs.responses, started, finished)?;

        let status = OrderStatus::Downloaded {
            files: logs.responses.len(),
            failed: logs.failed(),
        };
        if self.settings.join_files {
            let stored = logs
                .responses
                .iter()
                .filter(|r| !r.error)
                .filter_map(|r| r.file.clone().map(|p| (r.file_id.clone(), p)))
                .collect();
            joins.push(PendingJoin {
                order_index: batch.orders.len(),
                plan,
                stored,
            });
        }
        batch.manifest.extend(logs.errors);
        Ok(OrderOutcome {
            order_id: order_id.to_string(),
            status,
            summary,
            failures,
            joined: Vec::new(),
        })
    }

    /// Join every pending order over the files that made it, recovered ones
    /// included. A run folder is removed only once none of its files is still
    /// in error, so it stays in place for a later retry.
    fn join_pending(&self, joins: Vec<PendingJoin>, outcome: &mut BatchOutcome) -> Result<()> {
        if joins.is_empty() {
            return Ok(());
        }
        let (recovered, unresolved) = match &outcome.retry {
            Some(r) => (r.recovered.as_slice(), r.still_in_error.as_slice()),
            None => (&[][..], outcome.manifest.entries()),
        };
        let unresolved: HashSet<(String, String)> = unresolved
            .iter()
            .map(|e| (e.order_id.clone(), e.file_id.clone()))
            .collect();
        let mut late: HashMap<&str, Vec<(String, PathBuf)>> = HashMap::new();
        for r in recovered {
            late.entry(r.entry.order_id.as_str())
                .or_default()
                .push((r.entry.file_id.clone(), r.path.clone()));
        }

        let mut results = Vec::with_capacity(joins.len());
        for mut pending in joins {
            if let Some(files) = late.remove(pending.plan.order_id.as_str()) {
                pending.stored.extend(files);
            }
            let joined = self.join_runs(&pending, &unresolved)?;
            results.push((pending.order_index, joined));
        }
        for (index, joined) in results {
            if let Some(order) = outcome.orders.get_mut(index) {
                order.joined = joined;
            }
        }
        Ok(())
    }

    /// Concatenate each run's stored files, in manifest order, into one file
    /// next to the run folder.
    fn join_runs(
        &self,
        pending: &PendingJoin,
        unresolved: &HashSet<(String, String)>,
    ) -> Result<Vec<PathBuf>> {
        let order_id = pending.plan.order_id.as_str();
        let mut joined = Vec::new();
        for run in &pending.plan.runs {
            let inputs: Vec<PathBuf> = run
                .file_ids
                .iter()
                .filter_map(|id| pending.stored.get(id).cloned())
                .collect();
            if inputs.is_empty() {
                continue;
            }
            let dest = joined_path(run);
            let bytes = storage::concat_files(&inputs, &dest)
                .with_context(|| format!("joining files into {}", dest.display()))?;
            tracing::info!(files = inputs.len(), bytes, path = %dest.display(), "joined run files");
            joined.push(dest);

            let missing = run
                .file_ids
                .iter()
                .filter(|id| unresolved.contains(&(order_id.to_string(), id.to_string())))
                .count();
            if missing == 0 {
                fs::remove_dir(&run.folder)
                    .with_context(|| format!("removing joined run folder {}", run.folder.display()))?;
            } else {
                tracing::warn!(missing, folder = %run.folder.display(), "keeping run folder, files still in error");
            }
        }
        Ok(joined)
    }
}

fn joined_path(run: &RunPlan) -> PathBuf {
    let mut name = OsString::from(run.folder.as_os_str());
    name.push(".");
    name.push(FILE_EXTENSION);
    PathBuf::from(name)
}
