//! Entry point for `audpx`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, signal handling, argument parsing).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use audpx::config::{self, ClientConfig, ServerConfig};
use audpx::simulator::SimulatorConfig;
use audpx::timer::TimerConfig;
use audpx::{ClientSession, ReconcileOutcome, Server};

/// AUDP-X sequenced-UDP instrumentation harness.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive, deduplicate and log packets until Ctrl-C, then reconcile the log.
    Server {
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:5005")]
        bind: SocketAddr,
        /// Reconciled (send-time ordered) CSV written on shutdown.
        #[arg(short, long, default_value = config::DEFAULT_RECONCILED_LOG)]
        output: PathBuf,
        /// Also write the arrival-order log here.
        #[arg(long)]
        raw_log: Option<PathBuf>,
    },
    /// Handshake with a server and stream synthetic sensor batches.
    Client(ClientArgs),
}

#[derive(Args)]
struct ClientArgs {
    /// Remote server address (e.g. 192.168.1.10:5005).
    #[arg(short, long)]
    server: SocketAddr,
    /// Device id; defaults to the low 16 bits of the process id.
    #[arg(long)]
    device_id: Option<u16>,
    /// Highest target sequence number.
    #[arg(short = 'n', long, default_value_t = 70)]
    messages: u32,
    /// Readings per DATA packet.
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    batch_size: u32,
    /// Seconds between heartbeats.
    #[arg(long, default_value_t = 3.0)]
    heartbeat: f64,
    /// Seconds to pause after each DATA packet.
    #[arg(long, default_value_t = 1.0)]
    interval: f64,
    /// Seconds to wait for the handshake ACK (doubles per attempt).
    #[arg(long, default_value_t = 3.0)]
    ack_timeout: f64,
    /// Handshake retries after the first attempt.
    #[arg(long, default_value_t = 0)]
    retries: u32,
    /// Base back-off in seconds between handshake attempts.
    #[arg(long, default_value_t = 2.0)]
    backoff: f64,
    /// Simulated loss probability on outbound packets.
    #[arg(long, default_value_t = 0.0, value_parser = probability)]
    loss: f64,
    /// Simulated duplication probability on outbound packets.
    #[arg(long, default_value_t = 0.0, value_parser = probability)]
    duplicate: f64,
    /// Simulated delay in milliseconds on outbound packets.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
    /// Seed for the simulator RNG.
    #[arg(long)]
    seed: Option<u64>,
}

impl ClientArgs {
    fn into_config(self) -> anyhow::Result<ClientConfig> {
        let mut cfg = ClientConfig::new(self.server);
        if let Some(id) = self.device_id {
            cfg.device_id = id;
        }
        cfg.num_messages = self.messages;
        cfg.batch_size = self.batch_size;
        cfg.heartbeat_interval = seconds(self.heartbeat, "--heartbeat")?;
        cfg.send_interval = seconds(self.interval, "--interval")?;
        cfg.timer = TimerConfig {
            ack_timeout: seconds(self.ack_timeout, "--ack-timeout")?,
            base_backoff: seconds(self.backoff, "--backoff")?,
            max_retries: self.retries,
        };
        cfg.simulator = SimulatorConfig {
            loss_rate: self.loss,
            duplicate_rate: self.duplicate,
            delay: Duration::from_millis(self.delay_ms),
            seed: self.seed,
        };
        Ok(cfg)
    }
}

fn seconds(value: f64, flag: &str) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{flag} must be a non-negative number of seconds"))
}

fn probability(s: &str) -> Result<f64, String> {
    let p: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(format!("{p} is not a probability in [0, 1]"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to `info`; set RUST_LOG to change verbosity.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Server {
            bind,
            output,
            raw_log,
        } => {
            let config = ServerConfig {
                bind,
                reconciled_log: output,
                raw_log,
            };
            let server = Server::bind(config)
                .await
                .with_context(|| format!("binding server socket on {bind}"))?;
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("[server] cannot listen for Ctrl-C: {e}");
                    std::future::pending::<()>().await;
                }
            };
            match server.run(shutdown).await? {
                ReconcileOutcome::NothingToAnalyze => println!("No packets logged to analyze."),
                ReconcileOutcome::Written { rows, path } => {
                    println!("Analysis complete. {rows} row(s) saved to {}", path.display())
                }
            }
        }
        Mode::Client(args) => {
            let config = args.into_config()?;
            log::info!(
                "[client] device {} streaming to {}",
                config.device_id,
                config.server
            );
            let mut session = ClientSession::connect(config).await?;
            session.run().await?;
        }
    }

    Ok(())
}
