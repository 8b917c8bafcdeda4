//! Per-run loss, duplicate, gap and latency metrics.

use audpx::ReconciledRow;

/// One-way delay statistics in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayStats {
    pub min_ms: f64,
    pub median_ms: f64,
    pub max_ms: f64,
}

impl DelayStats {
    /// `None` for an empty sample.
    pub fn from_millis(samples: &[f64]) -> Option<Self> {
        Some(Self {
            min_ms: samples.iter().copied().reduce(f64::min)?,
            median_ms: median(samples)?,
            max_ms: samples.iter().copied().reduce(f64::max)?,
        })
    }
}

/// Metrics for one (scenario, run) record set.
///
/// `total_sent` is configured, not observed: if it is smaller than what
/// actually arrived, `total_lost` and `loss_rate` go negative, which is the
/// signal that the configuration is wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetrics {
    pub total_sent: u64,
    pub total_unique_received: u64,
    pub total_lost: i64,
    pub total_duplicates: u64,
    pub total_gaps: u64,
    /// Percent of `total_sent`.
    pub loss_rate: f64,
    /// Percent of `total_sent`.
    pub duplicate_rate: f64,
    /// Percent of `total_unique_received`; 0.0 when nothing unique arrived.
    pub gap_rate: f64,
    /// Over non-duplicate rows only; `None` when there are none.
    pub delay: Option<DelayStats>,
}

impl RunMetrics {
    pub fn compute(rows: &[ReconciledRow], total_sent: u64) -> Self {
        let unique: Vec<&ReconciledRow> = rows.iter().filter(|r| !r.is_duplicate()).collect();
        let total_unique_received = unique.len() as u64;
        let total_duplicates: u64 = rows.iter().map(|r| u64::from(r.duplicate_flag)).sum();
        let total_gaps: u64 = rows.iter().map(|r| u64::from(r.gap_flag)).sum();
        let total_lost = total_sent as i64 - total_unique_received as i64;

        let delays_ms: Vec<f64> = unique.iter().map(|r| r.network_delay_s * 1000.0).collect();

        Self {
            total_sent,
            total_unique_received,
            total_lost,
            total_duplicates,
            total_gaps,
            loss_rate: percent(total_lost as f64, total_sent),
            duplicate_rate: percent(total_duplicates as f64, total_sent),
            gap_rate: percent(total_gaps as f64, total_unique_received),
            delay: DelayStats::from_millis(&delays_ms),
        }
    }
}

/// `part / whole × 100`, or 0.0 when `whole` is zero.
fn percent(part: f64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part / whole as f64 * 100.0
    }
}

/// Median of `values`; the mean of the two middle values for an even count.
/// NaNs sort last.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}
