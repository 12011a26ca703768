//! Per-order summary and failure-manifest files.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::api::DownloadError;
use crate::layout::OutputLayout;
use crate::pool::{clock_stamp, round_secs, ErrorLogEntry, ResponseLogEntry};

const HEADER_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Batch timestamp used in report file names, e.g. `18-Oct-2026-09-30-00`.
pub fn batch_stamp_now() -> String {
    Local::now().format("%d-%b-%Y-%H-%M-%S").to_string()
}

/// One CSV row of the detail section.
#[derive(Debug, Serialize)]
struct DetailRow<'a> {
    order: &'a str,
    duration: f64,
    time_to_first_byte: f64,
    #[serde(rename = "fileSize")]
    file_size: u64,
    #[serde(rename = "fileId")]
    file_id: &'a str,
    error: &'static str,
    #[serde(rename = "errMsg")]
    err_msg: &'a str,
    file: String,
    #[serde(rename = "currentTime")]
    current_time: &'a str,
}

impl<'a> From<&'a ResponseLogEntry> for DetailRow<'a> {
    fn from(e: &'a ResponseLogEntry) -> Self {
        Self {
            order: &e.order_id,
            duration: e.duration,
            time_to_first_byte: e.time_to_first_byte,
            file_size: e.file_size,
            file_id: &e.file_id,
            error: py_bool(e.error),
            err_msg: &e.error_message,
            file: e
                .file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            current_time: &e.timestamp,
        }
    }
}

fn py_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Writes the report files of one batch; every file name carries the batch stamp.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    layout: OutputLayout,
    batch_stamp: String,
    workers: usize,
}

impl ReportWriter {
    pub fn new(layout: OutputLayout, batch_stamp: impl Into<String>, workers: usize) -> Self {
        Self {
            layout,
            batch_stamp: batch_stamp.into(),
            workers,
        }
    }

    pub fn batch_stamp(&self) -> &str {
        &self.batch_stamp
    }

    pub fn summary_path(&self, order_id: &str) -> PathBuf {
        self.layout.summary_path(order_id, &self.batch_stamp)
    }

    pub fn failures_path(&self, order_id: &str) -> PathBuf {
        self.layout.failures_path(order_id, &self.batch_stamp)
    }

    /// One request URL per line. Nothing is written for an empty log.
    pub fn write_failures(
        &self,
        order_id: &str,
        errors: &[ErrorLogEntry],
    ) -> Result<Option<PathBuf>> {
        if errors.is_empty() {
            return Ok(None);
        }
        let path = self.failures_path(order_id);
        let write = || -> io::Result<()> {
            let mut out = BufWriter::new(File::create(&path)?);
            for e in errors {
                writeln!(out, "{}", e.url)?;
            }
            out.flush()
        };
        write().with_context(|| format!("writing failure manifest {}", path.display()))?;
        Ok(Some(path))
    }

    /// Header, totals and CSV detail section. Nothing is written for an empty log.
    pub fn write_summary(
        &self,
        order_id: &str,
        responses: &[ResponseLogEntry],
        started: DateTime<Local>,
        finished: DateTime<Local>,
    ) -> Result<Option<PathBuf>> {
        if responses.is_empty() {
            return Ok(None);
        }
        let path = self.summary_path(order_id);
        let file = File::create(&path)
            .with_context(|| format!("creating summary {}", path.display()))?;
        let mut out = BufWriter::new(file);

        let elapsed = (finished - started).to_std().unwrap_or_default();
        let total_bytes: u64 = responses.iter().map(|r| r.file_size).sum();
        writeln!(
            out,
            "The download of order [{}] started at: {} finished at: {}",
            order_id,
            started.format(HEADER_TIME_FORMAT),
            finished.format(HEADER_TIME_FORMAT)
        )?;
        writeln!(
            out,
            "Total Files: {} Total time taken: {}s Total Size: {} Workers: {}",
            responses.len(),
            round_secs(elapsed),
            total_bytes,
            self.workers
        )?;
        writeln!(out, "===== Detail Section =====")?;

        let mut csv = csv::Writer::from_writer(out);
        for entry in responses {
            csv.serialize(DetailRow::from(entry))?;
        }
        csv.flush()
            .with_context(|| format!("writing summary {}", path.display()))?;
        tracing::debug!(
            order_id,
            files = responses.len(),
            total_bytes,
            path = %path.display(),
            "summary written"
        );
        Ok(Some(path))
    }

    /// Append a `RETRY-OK` row to the order's summary.
    pub fn append_retry_success(&self, order_id: &str, file_id: &str, file: &Path) -> Result<()> {
        let path = self.summary_path(order_id);
        let out = open_append(&path)
            .with_context(|| format!("opening summary {}", path.display()))?;
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(out);
        let file = file.display().to_string();
        let now = clock_stamp();
        csv.write_record([
            order_id,
            "0",
            "0",
            "0",
            file_id,
            "False",
            "RETRY-OK",
            file.as_str(),
            now.as_str(),
        ])?;
        csv.flush()?;
        Ok(())
    }

    /// Append a `FAILED on retry` line to the order's failure manifest.
    pub fn append_retry_failure(
        &self,
        order_id: &str,
        file_id: &str,
        err: &DownloadError,
    ) -> Result<()> {
        let path = self.failures_path(order_id);
        let mut out = open_append(&path)
            .with_context(|| format!("opening failure manifest {}", path.display()))?;
        let status = err
            .status()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string());
        writeln!(
            out,
            "File {} FAILED on retry. errMsg: {} status: {}",
            file_id, err, status
        )?;
        Ok(())
    }

    /// Delete the order's failure manifest; a missing file is fine.
    pub fn remove_failures(&self, order_id: &str) -> Result<()> {
        let path = self.failures_path(order_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}
