//! Shutdown-time reconciliation of the packet log.
//!
//! Packets arrive in network order.  Reconciliation sorts the recorded rows
//! by the client's send timestamp, restoring the order in which they were
//! emitted, and annotates each with its one-way network delay
//! (`arrival_time − timestamp`).  The delay is left unclamped:
//! with unsynchronised clocks it can be negative, and that is reported as-is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::recorder::{write_csv, LogRecorder, PacketLogRow, PersistError};

/// A [`PacketLogRow`] plus its computed network delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRow {
    pub device_id: u16,
    pub seq: u16,
    #[serde(rename = "timestamp")]
    pub send_timestamp: f64,
    #[serde(rename = "arrival_time")]
    pub arrival_timestamp: f64,
    pub duplicate_flag: u8,
    pub gap_flag: u8,
    pub payload_len: usize,
    /// Seconds, rounded to the microsecond.
    pub network_delay_s: f64,
}

impl From<&PacketLogRow> for ReconciledRow {
    fn from(row: &PacketLogRow) -> Self {
        Self {
            device_id: row.device_id,
            seq: row.seq,
            send_timestamp: row.send_timestamp,
            arrival_timestamp: row.arrival_timestamp,
            duplicate_flag: row.duplicate_flag,
            gap_flag: row.gap_flag,
            payload_len: row.payload_len,
            network_delay_s: round_micros(row.arrival_timestamp - row.send_timestamp),
        }
    }
}

impl ReconciledRow {
    pub fn is_duplicate(&self) -> bool {
        self.duplicate_flag != 0
    }

    pub fn is_gap(&self) -> bool {
        self.gap_flag != 0
    }
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The log was empty; no file was written.
    NothingToAnalyze,
    Written { rows: usize, path: PathBuf },
}

/// Sort `rows` ascending by send timestamp and compute each row's delay.
///
/// The sort is stable, so rows with equal send timestamps keep their
/// arrival order.
pub fn reconcile(rows: &[PacketLogRow]) -> Vec<ReconciledRow> {
    let mut out: Vec<ReconciledRow> = rows.iter().map(ReconciledRow::from).collect();
    out.sort_by(|a, b| a.send_timestamp.total_cmp(&b.send_timestamp));
    out
}

/// Reconcile everything `recorder` holds and write it to `path`.
///
/// An empty recorder is a no-op: nothing is written and
/// [`ReconcileOutcome::NothingToAnalyze`] is returned.
pub fn reconcile_and_persist(
    recorder: &LogRecorder,
    path: &Path,
) -> Result<ReconcileOutcome, PersistError> {
    if recorder.is_empty() {
        log::info!("[reconcile] no packets logged; nothing to analyze");
        return Ok(ReconcileOutcome::NothingToAnalyze);
    }

    let sorted = reconcile(recorder.rows());
    write_csv(path, &sorted)?;
    log::info!(
        "[reconcile] {} row(s) sorted by send timestamp and saved to {}",
        sorted.len(),
        path.display()
    );
    Ok(ReconcileOutcome::Written {
        rows: sorted.len(),
        path: path.to_path_buf(),
    })
}

/// Load a reconciled record set written by [`reconcile_and_persist`].
pub fn read_reconciled(path: &Path) -> Result<Vec<ReconciledRow>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    reader.deserialize().collect()
}

fn round_micros(seconds: f64) -> f64 {
    (seconds * 1e6).round() / 1e6
}
