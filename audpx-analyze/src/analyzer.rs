//! Offline analysis of a directory of reconciled run logs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use audpx::reconcile::read_reconciled;
use thiserror::Error;

use crate::discover::{find_run_files, RUN_FILE_SUFFIX};
use crate::metrics::RunMetrics;
use crate::scenario::{summarize, ScenarioSummary, DEFAULT_SCENARIOS};

/// Configured packets per run in the reference experiment.
pub const DEFAULT_TOTAL_SENT: u64 = 250;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("cannot scan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no *{RUN_FILE_SUFFIX} files found under {0}")]
    NoRunFiles(PathBuf),
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Metrics for one run file.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub scenario: String,
    pub path: PathBuf,
    pub metrics: RunMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Every run that could be read, in path order.
    pub runs: Vec<RunRecord>,
    /// One entry per configured scenario, in configured order.
    pub summaries: Vec<ScenarioSummary>,
}

#[derive(Debug, Clone)]
pub struct Analyzer {
    /// Packets the client was configured to send per run.
    pub total_sent: u64,
    /// Scenarios to report, in output order.
    pub scenarios: Vec<String>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self {
            total_sent: DEFAULT_TOTAL_SENT,
            scenarios: DEFAULT_SCENARIOS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Analyzer {
    /// Analyse every run file under `root`.
    ///
    /// A file that cannot be parsed is logged and left out; its scenario is
    /// reported from the remaining runs (or as N/A if none remain).
    pub fn analyze_dir(&self, root: &Path) -> Result<Analysis, AnalyzeError> {
        let files = find_run_files(root).map_err(|source| AnalyzeError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        if files.is_empty() {
            return Err(AnalyzeError::NoRunFiles(root.to_path_buf()));
        }

        let mut runs = Vec::with_capacity(files.len());
        for file in files {
            log::info!("[analyze] {}", file.path.display());
            match read_reconciled(&file.path) {
                Ok(rows) => runs.push(RunRecord {
                    metrics: RunMetrics::compute(&rows, self.total_sent),
                    scenario: file.scenario,
                    path: file.path,
                }),
                Err(e) => log::error!("[analyze] error reading {}: {e}", file.path.display()),
            }
        }

        Ok(self.summarize_runs(runs))
    }

    /// Group already-computed runs by scenario and aggregate them.
    pub fn summarize_runs(&self, runs: Vec<RunRecord>) -> Analysis {
        let mut by_scenario: BTreeMap<String, Vec<RunMetrics>> = BTreeMap::new();
        for run in &runs {
            by_scenario
                .entry(run.scenario.clone())
                .or_default()
                .push(run.metrics.clone());
        }
        Analysis {
            summaries: summarize(&self.scenarios, &by_scenario),
            runs,
        }
    }
}
