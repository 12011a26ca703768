//! Per-order "latest processed run" marker files.
//!
//! One small text file per order holding a `YYYY-MM-DD:HH` stamp. Stamps sort
//! lexicographically in run order, so "newer" is a plain string comparison.
//! Assumes a single process per output root.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::PathBuf;

use crate::layout::OutputLayout;

/// Result of comparing a freshly observed run with the stored marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerCheck {
    /// No marker existed; it now holds the new stamp.
    Created,
    /// The stored stamp was older and has been overwritten.
    Advanced { previous: String },
    /// The stored stamp is the same or newer; nothing written.
    AlreadyProcessed { last: String },
}

#[derive(Debug, Clone)]
pub struct MarkerStore {
    layout: OutputLayout,
}

impl MarkerStore {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    fn path(&self, order_id: &str) -> PathBuf {
        self.layout.marker_path(order_id)
    }

    pub fn read(&self, order_id: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path(order_id)) {
            Ok(s) => Ok(Some(s.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn write(&self, order_id: &str, stamp: &str) -> io::Result<()> {
        let path = self.path(order_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, stamp)
    }

    /// Record `stamp` if it is newer than what is stored.
    pub fn check_and_advance(&self, order_id: &str, stamp: &str) -> io::Result<MarkerCheck> {
        match self.read(order_id)? {
            None => {
                self.write(order_id, stamp)?;
                Ok(MarkerCheck::Created)
            }
            Some(previous) if stamp > previous.as_str() => {
                self.write(order_id, stamp)?;
                Ok(MarkerCheck::Advanced { previous })
            }
            Some(last) => Ok(MarkerCheck::AlreadyProcessed { last }),
        }
    }
}
