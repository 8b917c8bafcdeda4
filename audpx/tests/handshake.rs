//! Integration tests for the INIT handshake.
//!
//! Each test binds real `tokio::net::UdpSocket`s on loopback; the server half
//! runs in a background task.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use audpx::client::{ClientError, ClientSession};
use audpx::config::{ClientConfig, ServerConfig};
use audpx::simulator::SimulatorConfig;
use audpx::socket::Socket;
use audpx::state::ClientState;
use audpx::timer::TimerConfig;
use audpx::{ReconcileOutcome, Server};
use tempfile::tempdir;
use tokio::sync::oneshot;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn fast_client(server: SocketAddr) -> ClientConfig {
    let mut cfg = ClientConfig::new(server);
    cfg.device_id = 4242;
    cfg.timer = TimerConfig {
        ack_timeout: Duration::from_millis(50),
        base_backoff: Duration::from_millis(10),
        max_retries: 2,
    };
    cfg
}

/// Start a server on an ephemeral port; returns its address, a shutdown
/// trigger and the task handle.
async fn spawn_server(
    output: PathBuf,
) -> (
    SocketAddr,
    oneshot::Sender<()>,
    tokio::task::JoinHandle<Result<ReconcileOutcome, audpx::ServerError>>,
) {
    let server = Server::bind(ServerConfig {
        bind: loopback(),
        reconciled_log: output,
        raw_log: None,
    })
    .await
    .expect("bind server");
    let addr = server.local_addr();
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run(async move {
        let _ = rx.await;
    }));
    (addr, tx, handle)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// A live server ACKs INIT and the client reaches HANDSHAKE_DONE.
#[tokio::test]
async fn handshake_reaches_handshake_done() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("reconciled.csv");
    let (addr, stop, server) = spawn_server(output.clone()).await;

    let socket = Socket::bind(loopback()).await.unwrap();
    let mut client = ClientSession::new(socket, fast_client(addr));
    assert_eq!(client.state(), ClientState::InitPending);

    let ack = tokio::time::timeout(Duration::from_secs(5), client.handshake())
        .await
        .expect("handshake timed out")
        .expect("handshake failed");

    assert_eq!(client.state(), ClientState::HandshakeDone);
    assert_eq!(ack.device_id, 4242);
    assert_eq!(ack.seq, 0);

    stop.send(()).unwrap();
    let outcome = server.await.unwrap().unwrap();
    // INIT alone produces no DATA rows.
    assert_eq!(outcome, ReconcileOutcome::NothingToAnalyze);
    assert!(!output.exists());
}

/// A peer that never answers exhausts the retry budget; the session ends
/// terminated and streaming is refused.
#[tokio::test]
async fn silent_peer_fails_after_retry_budget() {
    // Bound but never read: INITs vanish without an ICMP error.
    let silent = Socket::bind(loopback()).await.unwrap();

    let socket = Socket::bind(loopback()).await.unwrap();
    let mut client = ClientSession::new(socket, fast_client(silent.local_addr));

    let result = tokio::time::timeout(Duration::from_secs(5), client.run())
        .await
        .expect("client hung");

    assert!(
        matches!(result, Err(ClientError::HandshakeFailed { attempts: 3 })),
        "expected HandshakeFailed after 3 attempts, got: {result:?}"
    );
    assert_eq!(client.state(), ClientState::Terminated);
    assert!(matches!(
        client.stream().await,
        Err(ClientError::BadState(ClientState::Terminated))
    ));
}

/// Streaming is only legal after a successful handshake.
#[tokio::test]
async fn stream_before_handshake_is_rejected() {
    let silent = Socket::bind(loopback()).await.unwrap();
    let socket = Socket::bind(loopback()).await.unwrap();
    let mut client = ClientSession::new(socket, fast_client(silent.local_addr));

    let result = client.stream().await;
    assert!(matches!(
        result,
        Err(ClientError::BadState(ClientState::InitPending))
    ));
    assert_eq!(client.state(), ClientState::InitPending);
}

/// With every packet dropped by the simulator the handshake cannot succeed.
#[tokio::test]
async fn total_simulated_loss_fails_handshake() {
    let dir = tempdir().unwrap();
    let (addr, stop, server) = spawn_server(dir.path().join("reconciled.csv")).await;

    let mut cfg = fast_client(addr);
    cfg.simulator = SimulatorConfig {
        loss_rate: 1.0,
        seed: Some(1),
        ..SimulatorConfig::default()
    };
    let socket = Socket::bind(loopback()).await.unwrap();
    let mut client = ClientSession::new(socket, cfg);

    let result = tokio::time::timeout(Duration::from_secs(5), client.handshake())
        .await
        .expect("client hung");
    assert!(matches!(result, Err(ClientError::HandshakeFailed { .. })));

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

/// A second handshake on the same session object is rejected.
#[tokio::test]
async fn handshake_only_runs_once() {
    let dir = tempdir().unwrap();
    let (addr, stop, server) = spawn_server(dir.path().join("reconciled.csv")).await;

    let socket = Socket::bind(loopback()).await.unwrap();
    let mut client = ClientSession::new(socket, fast_client(addr));
    client.handshake().await.expect("first handshake");
    assert!(matches!(
        client.handshake().await,
        Err(ClientError::BadState(ClientState::HandshakeDone))
    ));

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}
