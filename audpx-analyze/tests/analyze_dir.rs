//! Whole-directory analysis over hand-built run files.

use std::path::Path;

use audpx::ReconciledRow;
use audpx_analyze::report::{render_table, write_summary_csv};
use audpx_analyze::{AnalyzeError, Analyzer};
use tempfile::{tempdir, TempDir};

/// ------------------------------------------------------------
/// Fixture helpers
/// ------------------------------------------------------------
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
        }
    }

    fn write_run(&self, scenario: &str, label: &str, rows: &[ReconciledRow]) {
        let dir = self.path().join(scenario);
        std::fs::create_dir_all(&dir).unwrap();
        let mut writer = csv::Writer::from_path(dir.join(format!("{label}_packets_log.csv"))).unwrap();
        for row in rows {
            writer.serialize(row).unwrap();
        }
        writer.flush().unwrap();
    }

    fn write_raw(&self, scenario: &str, label: &str, text: &str) {
        let dir = self.path().join(scenario);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{label}_packets_log.csv")), text).unwrap();
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn row(seq: u16, dup: u8, gap: u8, delay_s: f64) -> ReconciledRow {
    let sent = 1_700_000_000.0 + f64::from(seq);
    ReconciledRow {
        device_id: 42,
        seq,
        send_timestamp: sent,
        arrival_timestamp: sent + delay_s,
        duplicate_flag: dup,
        gap_flag: gap,
        payload_len: 64,
        network_delay_s: delay_s,
    }
}

fn clean_run(n: u16, delay_s: f64) -> Vec<ReconciledRow> {
    (1..=n).map(|s| row(s, 0, 0, delay_s)).collect()
}

/// ------------------------------------------------------------
/// Tests
/// ------------------------------------------------------------
#[test]
fn five_complete_baseline_runs_report_zero_loss() {
    let fx = Fixture::new();
    for i in 1..=5 {
        fx.write_run("baseline", &format!("baseline_run{i}"), &clean_run(250, 0.002));
    }

    let analysis = Analyzer::default().analyze_dir(fx.path()).unwrap();
    assert_eq!(analysis.runs.len(), 5);

    let names: Vec<&str> = analysis.summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["baseline", "loss", "delay"]);

    let baseline = analysis.summaries[0].aggregate.as_ref().unwrap();
    assert_eq!(baseline.loss_rate, 0.0);
    assert_eq!(baseline.duplicate_rate, 0.0);
    assert_eq!(baseline.gap_rate, 0.0);
    let d = baseline.delay.unwrap();
    assert!((d.median_ms - 2.0).abs() < 1e-6);

    assert!(analysis.summaries[1].aggregate.is_none());
    assert!(analysis.summaries[2].aggregate.is_none());
}

#[test]
fn lossy_scenario_uses_median_of_runs() {
    let fx = Fixture::new();
    // 240, 225 and 245 unique of 250 configured.
    let mut run1 = clean_run(240, 0.01);
    run1[100].gap_flag = 1;
    fx.write_run("loss", "loss_run1", &run1);
    fx.write_run("loss", "loss_run2", &clean_run(225, 0.01));
    let mut run3 = clean_run(245, 0.01);
    run3.push(row(10, 1, 0, 0.5));
    fx.write_run("loss", "loss_run3", &run3);

    let analysis = Analyzer::default().analyze_dir(fx.path()).unwrap();
    let loss = analysis.summaries[1].aggregate.as_ref().unwrap();
    assert_eq!(analysis.summaries[1].runs, 3);
    assert!((loss.loss_rate - 4.0).abs() < 1e-9);
    assert_eq!(loss.duplicate_rate, 0.0);
    assert_eq!(loss.gap_rate, 0.0);
}

#[test]
fn unreadable_run_is_skipped() {
    let fx = Fixture::new();
    fx.write_run("delay", "delay_run1", &clean_run(250, 0.1));
    fx.write_raw("delay", "delay_run2", "device_id,seq\nnot,a number\n");

    let analysis = Analyzer::default().analyze_dir(fx.path()).unwrap();
    assert_eq!(analysis.runs.len(), 1);
    assert_eq!(analysis.summaries[2].runs, 1);
    let d = analysis.summaries[2].aggregate.as_ref().unwrap().delay.unwrap();
    assert!((d.min_ms - 100.0).abs() < 1e-6);
}

#[test]
fn custom_scenario_list_controls_output() {
    let fx = Fixture::new();
    fx.write_run("jitter", "jitter_run1", &clean_run(50, 0.0));
    fx.write_run("baseline", "baseline_run1", &clean_run(50, 0.0));

    let analyzer = Analyzer {
        total_sent: 50,
        scenarios: vec!["jitter".into()],
    };
    let analysis = analyzer.analyze_dir(fx.path()).unwrap();
    assert_eq!(analysis.runs.len(), 2);
    assert_eq!(analysis.summaries.len(), 1);
    assert_eq!(analysis.summaries[0].name, "jitter");
    assert!(render_table(&analysis.summaries).to_string().contains("JITTER"));
}

#[test]
fn empty_root_is_an_error() {
    let fx = Fixture::new();
    match Analyzer::default().analyze_dir(fx.path()) {
        Err(AnalyzeError::NoRunFiles(p)) => assert_eq!(p, fx.path()),
        other => panic!("expected NoRunFiles, got {other:?}"),
    }
}

#[test]
fn summary_file_marks_missing_scenarios() {
    let fx = Fixture::new();
    fx.write_run("baseline", "baseline_run1", &clean_run(250, 0.001));

    let analysis = Analyzer::default().analyze_dir(fx.path()).unwrap();
    let out = fx.path().join("final_analysis_summary.csv");
    write_summary_csv(&out, &analysis.summaries).unwrap();

    let text = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1], "BASELINE,0.00,0.00,0.00,1.00 / 1.00 / 1.00");
    assert_eq!(lines[2], "LOSS,N/A,N/A,N/A,N/A");
    assert_eq!(lines[3], "DELAY,N/A,N/A,N/A,N/A");
}
