//! Rendering and persisting the scenario summary.

use std::path::Path;

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use crate::analyzer::{AnalyzeError, RunRecord};
use crate::metrics::DelayStats;
use crate::scenario::ScenarioSummary;
use serde::Serialize;

pub const SUMMARY_HEADERS: [&str; 5] = [
    "Scenario",
    "Loss Rate (%)",
    "Duplicate Rate (%)",
    "Gap Rate (%)",
    "Latency (min/median/max) (ms)",
];

const NOT_AVAILABLE: &str = "N/A";

/// The five display cells for one scenario.
pub fn summary_cells(summary: &ScenarioSummary) -> [String; 5] {
    let name = summary.name.to_uppercase();
    match &summary.aggregate {
        None => [
            name,
            NOT_AVAILABLE.into(),
            NOT_AVAILABLE.into(),
            NOT_AVAILABLE.into(),
            NOT_AVAILABLE.into(),
        ],
        Some(agg) => [
            name,
            format!("{:.2}", agg.loss_rate),
            format!("{:.2}", agg.duplicate_rate),
            format!("{:.2}", agg.gap_rate),
            agg.delay
                .map(format_latency)
                .unwrap_or_else(|| NOT_AVAILABLE.into()),
        ],
    }
}

fn format_latency(d: DelayStats) -> String {
    format!("{:.2} / {:.2} / {:.2}", d.min_ms, d.median_ms, d.max_ms)
}

/// Console rendering of the summary, one row per scenario.
pub fn render_table(summaries: &[ScenarioSummary]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(SUMMARY_HEADERS);

    for summary in summaries {
        table.add_row(summary_cells(summary));
    }
    table
}

/// Write the summary artifact, one row per scenario.
pub fn write_summary_csv(path: &Path, summaries: &[ScenarioSummary]) -> Result<(), AnalyzeError> {
    let wrap = |source| AnalyzeError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(wrap)?;
    writer.write_record(SUMMARY_HEADERS).map_err(wrap)?;
    for summary in summaries {
        writer.write_record(summary_cells(summary)).map_err(wrap)?;
    }
    writer.flush().map_err(|e| wrap(e.into()))?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct RunRow<'a> {
    scenario: &'a str,
    file: String,
    total_sent: u64,
    total_unique_recv: u64,
    total_lost: i64,
    total_duplicates: u64,
    total_gaps: u64,
    loss_rate: f64,
    duplicate_rate: f64,
    gap_rate: f64,
    delay_min_ms: Option<f64>,
    delay_median_ms: Option<f64>,
    delay_max_ms: Option<f64>,
}

impl<'a> From<&'a RunRecord> for RunRow<'a> {
    fn from(run: &'a RunRecord) -> Self {
        let m = &run.metrics;
        Self {
            scenario: &run.scenario,
            file: run.path.display().to_string(),
            total_sent: m.total_sent,
            total_unique_recv: m.total_unique_received,
            total_lost: m.total_lost,
            total_duplicates: m.total_duplicates,
            total_gaps: m.total_gaps,
            loss_rate: m.loss_rate,
            duplicate_rate: m.duplicate_rate,
            gap_rate: m.gap_rate,
            delay_min_ms: m.delay.map(|d| d.min_ms),
            delay_median_ms: m.delay.map(|d| d.median_ms),
            delay_max_ms: m.delay.map(|d| d.max_ms),
        }
    }
}

/// Write one row of raw metrics per analysed run.  Delay cells are empty
/// for runs without unique packets.
pub fn write_runs_csv(path: &Path, runs: &[RunRecord]) -> Result<(), AnalyzeError> {
    let wrap = |source| AnalyzeError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(wrap)?;
    for run in runs {
        writer.serialize(RunRow::from(run)).map_err(wrap)?;
    }
    writer.flush().map_err(|e| wrap(e.into()))?;
    Ok(())
}
