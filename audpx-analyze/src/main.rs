use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use audpx_analyze::analyzer::DEFAULT_TOTAL_SENT;
use audpx_analyze::{report, Analyzer, DEFAULT_SCENARIOS};

/// Summarise loss, duplication, gaps and latency across experiment runs.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Directory holding `<scenario>/<run>_packets_log.csv` files.
    #[arg(short, long, default_value = "raw_data")]
    root: PathBuf,
    /// Packets the client was configured to send per run.
    #[arg(short = 'n', long, default_value_t = DEFAULT_TOTAL_SENT, value_parser = clap::value_parser!(u64).range(1..))]
    total_sent: u64,
    /// Summary CSV to write.
    #[arg(short, long, default_value = "final_analysis_summary.csv")]
    summary: PathBuf,
    /// Also write per-run metrics here.
    #[arg(long)]
    runs_csv: Option<PathBuf>,
    /// Scenario to report, in order; repeat for several.
    #[arg(long = "scenario", default_values_t = DEFAULT_SCENARIOS.map(String::from))]
    scenarios: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let analyzer = Analyzer {
        total_sent: cli.total_sent,
        scenarios: cli.scenarios,
    };

    let analysis = analyzer
        .analyze_dir(&cli.root)
        .with_context(|| format!("analysing {}", cli.root.display()))?;
    log::info!("[analyze] {} run(s) analysed", analysis.runs.len());

    println!("{}", report::render_table(&analysis.summaries));

    report::write_summary_csv(&cli.summary, &analysis.summaries)?;
    println!("Summary saved to {}", cli.summary.display());

    if let Some(path) = &cli.runs_csv {
        report::write_runs_csv(path, &analysis.runs)?;
        println!("Per-run metrics saved to {}", path.display());
    }

    Ok(())
}
