//! On-disk output layout under the batch root.
//!
//! ```text
//! <root>/downloaded/   run folders and joined files
//! <root>/latest/       one marker per order (latest processed run)
//! <root>/results/      per-order summaries
//! <root>/failures/     per-order failure manifests
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the four top-level directories if missing.
    pub fn ensure(&self) -> io::Result<()> {
        for dir in [self.downloaded(), self.latest(), self.results(), self.failures()] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn downloaded(&self) -> PathBuf {
        self.root.join("downloaded")
    }

    pub fn latest(&self) -> PathBuf {
        self.root.join("latest")
    }

    pub fn results(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn failures(&self) -> PathBuf {
        self.root.join("failures")
    }

    pub fn summary_path(&self, order_id: &str, batch_stamp: &str) -> PathBuf {
        self.results().join(report_file_name(order_id, batch_stamp))
    }

    pub fn failures_path(&self, order_id: &str, batch_stamp: &str) -> PathBuf {
        self.failures().join(report_file_name(order_id, batch_stamp))
    }

    pub fn marker_path(&self, order_id: &str) -> PathBuf {
        self.latest().join(format!("{}.txt", order_id))
    }
}

fn report_file_name(order_id: &str, batch_stamp: &str) -> String {
    format!("summary-{}-{}.txt", order_id, batch_stamp)
}
