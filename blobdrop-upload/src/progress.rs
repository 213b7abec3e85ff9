//! Transfer progress normalization.

use serde::{Deserialize, Serialize};

/// One progress tick as reported by a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes sent so far for this object.
    pub loaded_bytes: u64,
}

impl TransferProgress {
    pub fn new(loaded_bytes: u64) -> Self {
        Self { loaded_bytes }
    }
}

/// Progress of one file, as seen by sink consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub bytes_uploaded: u64,
    pub bytes_total: u64,
}

impl ProgressRecord {
    /// Pair a transport tick with the file's declared size.
    ///
    /// The transport's own idea of the total is ignored: it may be absent
    /// or differ from the logical file size.
    pub fn adapt(tick: TransferProgress, declared_total: u64) -> Self {
        Self {
            bytes_uploaded: tick.loaded_bytes,
            bytes_total: declared_total,
        }
    }

    /// Fraction done in `0.0..=1.0`; `0.0` when the total is unknown.
    pub fn percentage(&self) -> f64 {
        if self.bytes_total == 0 {
            return 0.0;
        }
        (self.bytes_uploaded as f64 / self.bytes_total as f64).min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_total > 0 && self.bytes_uploaded >= self.bytes_total
    }
}
