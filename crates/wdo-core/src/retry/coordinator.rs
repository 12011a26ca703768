//! Bulk retry pass over a batch's failed files.

use std::collections::HashSet;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use crate::api::FileSource;
use crate::plan::local_file_name;
use crate::pool::ErrorLogEntry;
use crate::report::ReportWriter;

use super::gate::RetryGate;
use super::manifest::RetryManifest;

/// A failure the retry pass fetched, with where it landed.
#[derive(Debug, Clone)]
pub struct RecoveredFile {
    pub entry: ErrorLogEntry,
    pub path: PathBuf,
}

/// What the retry pass achieved.
#[derive(Debug, Clone, Default)]
pub struct RetryOutcome {
    pub recovered: Vec<RecoveredFile>,
    pub still_in_error: Vec<ErrorLogEntry>,
}

pub struct RetryCoordinator<'a> {
    source: &'a dyn FileSource,
    reports: &'a ReportWriter,
    gate: RetryGate,
    cooldown: Duration,
}

impl<'a> RetryCoordinator<'a> {
    pub fn new(source: &'a dyn FileSource, reports: &'a ReportWriter, cooldown: Duration) -> Self {
        Self {
            source,
            reports,
            gate: RetryGate::default(),
            cooldown,
        }
    }

    /// Check the gate, wait out the cooldown, then retry each failure once.
    ///
    /// A gate breach returns `RetryAborted` before any waiting or fetching.
    pub fn run(&self, manifest: RetryManifest, attempted: usize) -> Result<RetryOutcome> {
        self.gate.check(manifest.len(), attempted)?;

        tracing::info!(
            failures = manifest.len(),
            cooldown_secs = self.cooldown.as_secs(),
            "waiting before retrying failed files"
        );
        thread::sleep(self.cooldown);

        let mut outcome = RetryOutcome::default();
        let mut cleared: HashSet<String> = HashSet::new();
        for entry in manifest.into_entries() {
            if cleared.insert(entry.order_id.clone()) {
                self.reports.remove_failures(&entry.order_id)?;
            }
            let dest = entry.folder.join(local_file_name(&entry.file_id, false));
            match self.source.fetch_file(&entry.order_id, &entry.file_id, &dest) {
                Ok(fetched) => {
                    tracing::info!(file_id = %entry.file_id, bytes = fetched.bytes, "recovered on retry");
                    self.reports
                        .append_retry_success(&entry.order_id, &entry.file_id, &fetched.path)?;
                    outcome.recovered.push(RecoveredFile {
                        entry,
                        path: fetched.path,
                    });
                }
                Err(e) => {
                    tracing::warn!(file_id = %entry.file_id, "failed again on retry: {}", e);
                    self.reports
                        .append_retry_failure(&entry.order_id, &entry.file_id, &e)?;
                    outcome.still_in_error.push(entry);
                }
            }
        }
        Ok(outcome)
    }
}
