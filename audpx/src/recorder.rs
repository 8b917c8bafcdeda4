//! Append-only record of every DATA packet the server observed.
//!
//! One [`PacketLogRow`] is appended per DATA arrival, duplicates included,
//! in arrival order.  Rows are never modified or removed; the buffer grows
//! for the life of the run and is handed to [`crate::reconcile`] at shutdown.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while writing a record set to disk.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),
}

/// One server-side observation of a DATA packet.
///
/// Timestamps are Unix seconds.  The CSV column names are those used by the
/// analysis tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketLogRow {
    pub device_id: u16,
    pub seq: u16,
    /// Client clock at send time, from the packet header.
    #[serde(rename = "timestamp")]
    pub send_timestamp: f64,
    /// Server clock at receive time.
    #[serde(rename = "arrival_time")]
    pub arrival_timestamp: f64,
    pub duplicate_flag: u8,
    pub gap_flag: u8,
    /// Bytes after the header.
    pub payload_len: usize,
}

#[derive(Debug, Default)]
pub struct LogRecorder {
    rows: Vec<PacketLogRow>,
}

impl LogRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, row: PacketLogRow) {
        self.rows.push(row);
    }

    /// Rows in arrival order.
    pub fn rows(&self) -> &[PacketLogRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the rows, in arrival order, as CSV with a header line.
    pub fn write_raw(&self, path: &Path) -> Result<(), PersistError> {
        write_csv(path, &self.rows)
    }
}

/// Serialise `rows` to `path` as CSV, replacing any existing file.
pub(crate) fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PersistError> {
    let file = std::fs::File::create(path).map_err(|source| PersistError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|source| PersistError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}
