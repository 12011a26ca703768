//! Per-order result and error logs.
//!
//! Workers append concurrently; nothing reads the logs until the pool has
//! drained and joined, so a plain mutex around each vector is enough.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Outcome of one attempted download.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseLogEntry {
    pub order_id: String,
    pub file_id: String,
    pub error: bool,
    pub error_message: String,
    pub file_size: u64,
    /// Seconds, two decimals.
    pub time_to_first_byte: f64,
    /// Seconds, two decimals.
    pub duration: f64,
    /// Local path of the stored file; `None` on failure.
    pub file: Option<PathBuf>,
    /// Wall-clock time the attempt started, `HH-MM-SS-ffffff`.
    pub timestamp: String,
}

/// Minimal failure record; drives the retry pass and the failure manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLogEntry {
    pub url: String,
    pub file_id: String,
    pub order_id: String,
    pub folder: PathBuf,
    pub timestamp: String,
}

/// Drained contents of an `OrderLog`.
#[derive(Debug, Clone, Default)]
pub struct OrderLogs {
    pub responses: Vec<ResponseLogEntry>,
    pub errors: Vec<ErrorLogEntry>,
}

impl OrderLogs {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.responses.iter().map(|r| r.file_size).sum()
    }
}

/// Shared, append-only log for one order.
#[derive(Debug, Default)]
pub struct OrderLog {
    responses: Mutex<Vec<ResponseLogEntry>>,
    errors: Mutex<Vec<ErrorLogEntry>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OrderLog {
    pub fn record_success(&self, entry: ResponseLogEntry) {
        lock(&self.responses).push(entry);
    }

    pub fn record_failure(&self, entry: ResponseLogEntry, error: ErrorLogEntry) {
        lock(&self.errors).push(error);
        lock(&self.responses).push(entry);
    }

    /// Move everything out. Call only after the pool has joined.
    pub fn take(&self) -> OrderLogs {
        OrderLogs {
            responses: std::mem::take(&mut *lock(&self.responses)),
            errors: std::mem::take(&mut *lock(&self.errors)),
        }
    }
}

/// Wall-clock stamp used in log entries.
pub fn clock_stamp() -> String {
    chrono::Local::now().format("%H-%M-%S-%6f").to_string()
}

/// Seconds rounded to two decimals.
pub fn round_secs(d: Duration) -> f64 {
    // Integer hundredths, so ties round up instead of following the binary float.
    ((d.as_micros() + 5_000) / 10_000) as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(file_id: &str, error: bool, size: u64) -> ResponseLogEntry {
        ResponseLogEntry {
            order_id: "o1".into(),
            file_id: file_id.into(),
            error,
            error_message: String::new(),
            file_size: size,
            time_to_first_byte: 0.0,
            duration: 0.0,
            file: None,
            timestamp: clock_stamp(),
        }
    }

    #[test]
    fn take_drains_both_logs() {
        let log = OrderLog::default();
        log.record_success(entry("a", false, 10));
        log.record_failure(
            entry("b", true, 0),
            ErrorLogEntry {
                url: "http://h/orders/o1/latest/b/data".into(),
                file_id: "b".into(),
                order_id: "o1".into(),
                folder: PathBuf::from("/tmp/o1_00"),
                timestamp: clock_stamp(),
            },
        );
        let logs = log.take();
        assert_eq!(logs.responses.len(), 2);
        assert_eq!(logs.failed(), 1);
        assert_eq!(logs.total_bytes(), 10);
        assert!(log.take().responses.is_empty());
    }

    #[test]
    fn round_secs_two_decimals() {
        assert_eq!(round_secs(Duration::from_millis(1234)), 1.23);
        assert_eq!(round_secs(Duration::from_millis(1235)), 1.24);
        assert_eq!(round_secs(Duration::from_millis(2675)), 2.68);
        assert_eq!(round_secs(Duration::from_micros(1_234_999)), 1.23);
        assert_eq!(round_secs(Duration::ZERO), 0.0);
    }

    #[test]
    fn clock_stamp_shape() {
        let s = clock_stamp();
        // HH-MM-SS-ffffff
        assert_eq!(s.len(), 15);
        assert_eq!(s.matches('-').count(), 3);
    }
}
