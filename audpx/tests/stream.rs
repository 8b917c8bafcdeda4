//! End-to-end runs: a client streams to an in-process server over loopback,
//! the server is shut down, and the persisted logs are checked.

use std::net::SocketAddr;
use std::time::Duration;

use audpx::client::ClientSession;
use audpx::config::{ClientConfig, ServerConfig};
use audpx::reconcile::read_reconciled;
use audpx::simulator::SimulatorConfig;
use audpx::socket::Socket;
use audpx::state::ClientState;
use audpx::timer::TimerConfig;
use audpx::{ReconcileOutcome, Server};
use tempfile::tempdir;
use tokio::sync::oneshot;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn quick_client(server: SocketAddr, messages: u32, batch_size: u32) -> ClientConfig {
    let mut cfg = ClientConfig::new(server);
    cfg.device_id = 7;
    cfg.num_messages = messages;
    cfg.batch_size = batch_size;
    cfg.send_interval = Duration::from_millis(5);
    cfg.heartbeat_interval = Duration::from_millis(20);
    cfg.timer = TimerConfig {
        ack_timeout: Duration::from_millis(500),
        base_backoff: Duration::from_millis(10),
        max_retries: 3,
    };
    cfg
}

/// Run one client against a fresh server and return the server's outcome.
async fn run_session(
    client_cfg: impl FnOnce(SocketAddr) -> ClientConfig,
    server_cfg: ServerConfig,
) -> (audpx::StreamReport, ReconcileOutcome) {
    let server = Server::bind(server_cfg).await.expect("bind server");
    let addr = server.local_addr();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(server.run(async move {
        let _ = stop_rx.await;
    }));

    let socket = Socket::bind(loopback()).await.unwrap();
    let mut client = ClientSession::new(socket, client_cfg(addr));
    let report = tokio::time::timeout(Duration::from_secs(10), client.run())
        .await
        .expect("client timed out")
        .expect("client run failed");
    assert_eq!(client.state(), ClientState::Terminated);

    // Let the last datagrams land before asking the server to stop.
    tokio::time::sleep(Duration::from_millis(200)).await;
    stop_tx.send(()).unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), server_task)
        .await
        .expect("server did not stop")
        .expect("server task panicked")
        .expect("server failed");
    (report, outcome)
}

#[tokio::test]
async fn clean_stream_is_logged_without_loss_or_gaps() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("reconciled.csv");
    let raw = dir.path().join("raw.csv");
    let server_cfg = ServerConfig {
        bind: loopback(),
        reconciled_log: output.clone(),
        raw_log: Some(raw.clone()),
    };

    // Targets 1..=10 in steps of 2: seqs 1, 3, 5, 7, 9.
    let (report, outcome) = run_session(|a| quick_client(a, 10, 2), server_cfg).await;
    assert_eq!(report.data_packets, 5);
    assert_eq!(report.send_failures, 0);
    assert_eq!(
        outcome,
        ReconcileOutcome::Written {
            rows: 5,
            path: output.clone()
        }
    );

    let rows = read_reconciled(&output).unwrap();
    let seqs: Vec<u16> = rows.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, vec![1, 3, 5, 7, 9]);
    assert!(rows.iter().all(|r| !r.is_duplicate() && !r.is_gap()));
    assert!(rows.iter().all(|r| r.device_id == 7));
    assert!(rows
        .windows(2)
        .all(|w| w[0].send_timestamp <= w[1].send_timestamp));

    assert!(raw.exists(), "raw arrival-order log requested");
}

#[tokio::test]
async fn simulated_duplicates_are_flagged() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("reconciled.csv");
    let server_cfg = ServerConfig {
        bind: loopback(),
        reconciled_log: output.clone(),
        raw_log: None,
    };

    let (report, _) = run_session(
        |a| {
            let mut cfg = quick_client(a, 4, 1);
            cfg.simulator = SimulatorConfig {
                duplicate_rate: 1.0,
                seed: Some(42),
                ..SimulatorConfig::default()
            };
            cfg
        },
        server_cfg,
    )
    .await;
    assert_eq!(report.data_packets, 4);

    let rows = read_reconciled(&output).unwrap();
    assert_eq!(rows.len(), 8);
    assert_eq!(rows.iter().filter(|r| r.is_duplicate()).count(), 4);
    assert_eq!(rows.iter().filter(|r| r.is_gap()).count(), 0);
}

#[tokio::test]
async fn delayed_packets_still_arrive() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("reconciled.csv");
    let server_cfg = ServerConfig {
        bind: loopback(),
        reconciled_log: output.clone(),
        raw_log: None,
    };

    let (_, outcome) = run_session(
        |a| {
            let mut cfg = quick_client(a, 3, 1);
            cfg.simulator = SimulatorConfig {
                delay: Duration::from_millis(30),
                ..SimulatorConfig::default()
            };
            cfg
        },
        server_cfg,
    )
    .await;

    assert!(matches!(outcome, ReconcileOutcome::Written { rows: 3, .. }));
    let rows = read_reconciled(&output).unwrap();
    assert!(rows.iter().all(|r| r.network_delay_s >= 0.0));
}

/// The client binary returns from `main` as soon as `run()` does, tearing
/// down its runtime.  Delayed sends must already be on the wire by then.
#[test]
fn delayed_sends_survive_client_runtime_shutdown() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("reconciled.csv");

    let server_rt = tokio::runtime::Runtime::new().unwrap();
    let (addr, stop_tx, server_task) = server_rt.block_on(async {
        let server = Server::bind(ServerConfig {
            bind: loopback(),
            reconciled_log: output.clone(),
            raw_log: None,
        })
        .await
        .expect("bind server");
        let addr = server.local_addr();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run(async move {
            let _ = stop_rx.await;
        }));
        (addr, stop_tx, task)
    });

    // Delay longer than the send interval so several packets are still in
    // flight when END is queued.
    let client_rt = tokio::runtime::Runtime::new().unwrap();
    let report = client_rt.block_on(async {
        let mut cfg = quick_client(addr, 5, 1);
        cfg.send_interval = Duration::from_millis(50);
        cfg.simulator = SimulatorConfig {
            delay: Duration::from_millis(120),
            ..SimulatorConfig::default()
        };
        let mut client = ClientSession::connect(cfg).await.unwrap();
        client.run().await.expect("client run failed")
    });
    drop(client_rt);
    assert_eq!(report.data_packets, 5);

    let outcome = server_rt.block_on(async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server_task)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
            .expect("server failed")
    });
    assert!(
        matches!(outcome, ReconcileOutcome::Written { rows: 5, .. }),
        "got {outcome:?}"
    );
}
