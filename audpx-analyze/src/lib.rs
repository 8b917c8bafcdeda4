//! Offline statistics over reconciled AUDP-X packet logs.
//!
//! Each `*_packets_log.csv` file under a root directory is one run; its
//! parent directory names the scenario it belongs to.  Runs are reduced to
//! [`RunMetrics`], then aggregated per scenario into the summary table.

pub mod analyzer;
pub mod discover;
pub mod metrics;
pub mod report;
pub mod scenario;

pub use analyzer::{Analysis, AnalyzeError, Analyzer, RunRecord};
pub use metrics::{DelayStats, RunMetrics};
pub use scenario::{ScenarioAggregate, ScenarioSummary, DEFAULT_SCENARIOS};
