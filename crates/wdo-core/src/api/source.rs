//! Seam between the worker pool and whatever serves file bodies.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::DownloadError;

/// A completed file download.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub time_to_first_byte: Duration,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Fetches one file of an order to a local path. Implemented by `ApiClient`;
/// wrapped by the debug stepper and by test doubles.
pub trait FileSource: Send + Sync {
    fn fetch_file(
        &self,
        order_id: &str,
        file_id: &str,
        dest: &Path,
    ) -> Result<FetchedFile, DownloadError>;

    /// URL recorded in error logs and failure manifests.
    fn file_url(&self, order_id: &str, file_id: &str) -> String;
}
