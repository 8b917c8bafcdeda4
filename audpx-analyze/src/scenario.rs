//! Aggregation of repeated runs into one row per scenario.
//!
//! Rates aggregate as the median of the per-run rates.  Latency aggregates
//! as the minimum of the per-run minima, the median of the per-run medians
//! and the maximum of the per-run maxima.

use std::collections::BTreeMap;

use crate::metrics::{median, DelayStats, RunMetrics};

/// Scenarios reported when none are given explicitly, in output order.
pub const DEFAULT_SCENARIOS: [&str; 3] = ["baseline", "loss", "delay"];

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioAggregate {
    pub loss_rate: f64,
    pub duplicate_rate: f64,
    pub gap_rate: f64,
    /// `None` when no run had a single unique packet.
    pub delay: Option<DelayStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSummary {
    pub name: String,
    pub runs: usize,
    /// `None` when the scenario has no runs.
    pub aggregate: Option<ScenarioAggregate>,
}

/// Aggregate the runs of one scenario.  `None` for an empty slice.
pub fn aggregate(runs: &[RunMetrics]) -> Option<ScenarioAggregate> {
    let rate = |f: fn(&RunMetrics) -> f64| median(&runs.iter().map(f).collect::<Vec<_>>());

    let delays: Vec<DelayStats> = runs.iter().filter_map(|r| r.delay).collect();
    let delay = (!delays.is_empty()).then(|| DelayStats {
        min_ms: delays.iter().map(|d| d.min_ms).fold(f64::INFINITY, f64::min),
        median_ms: median(&delays.iter().map(|d| d.median_ms).collect::<Vec<_>>())
            .unwrap_or(f64::NAN),
        max_ms: delays
            .iter()
            .map(|d| d.max_ms)
            .fold(f64::NEG_INFINITY, f64::max),
    });

    Some(ScenarioAggregate {
        loss_rate: rate(|r| r.loss_rate)?,
        duplicate_rate: rate(|r| r.duplicate_rate)?,
        gap_rate: rate(|r| r.gap_rate)?,
        delay,
    })
}

/// One summary per name in `order`, in that order, whether or not any runs
/// were found for it.  Scenarios not listed in `order` are left out.
pub fn summarize(
    order: &[String],
    runs_by_scenario: &BTreeMap<String, Vec<RunMetrics>>,
) -> Vec<ScenarioSummary> {
    order
        .iter()
        .map(|name| {
            let runs = runs_by_scenario
                .get(name)
                .map(Vec::as_slice)
                .unwrap_or_default();
            ScenarioSummary {
                name: name.clone(),
                runs: runs.len(),
                aggregate: aggregate(runs),
            }
        })
        .collect()
}
