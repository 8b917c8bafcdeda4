//! `audpx`: the AUDP-X transport instrumentation harness.
//!
//! A client streams sequenced sensor batches over UDP (optionally through a
//! simulated lossy network); the server deduplicates, gap-detects,
//! acknowledges and logs every DATA packet, then reconciles the log into
//! send-time order with per-packet delay when it shuts down.
//!
//! # Architecture
//!
//! ```text
//!  ┌───────────────┐  INIT (reliable)   ┌──────────────────┐
//!  │ ClientSession │───────────────────▶│    Dispatcher    │
//!  │               │◀───────── ACK ─────│ sessions+recorder│
//!  │               │  DATA / HEARTBEAT  │                  │
//!  │               │  / END (lossy)     └────────┬─────────┘
//!  └───────┬───────┘───────────────────▶         │ shutdown
//!          │                                     ▼
//!  ┌───────▼───────┐                      ┌─────────────┐
//!  │   Simulator   │                      │  reconcile  │──▶ CSV
//!  └───────┬───────┘                      └─────────────┘
//!  ┌───────▼───────┐
//!  │    Socket     │  (thin async wrapper around tokio UdpSocket)
//!  └───────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]      wire format (13-byte header + payload)
//! - [`payload`]     typed INIT / DATA JSON bodies
//! - [`client`]      handshake and streaming state machine
//! - [`state`]       client FSM states
//! - [`timer`]       handshake reply timeouts and back-off
//! - [`simulator`]   optional loss/duplication/delay on client sends
//! - [`server`]      dispatcher and receive loop
//! - [`session`]     per-device session table
//! - [`recorder`]    append-only packet log
//! - [`reconcile`]   send-time ordering and delay annotation
//! - [`config`]      run configuration with reference defaults
//! - [`socket`]      async UDP socket abstraction

pub mod client;
pub mod config;
pub mod packet;
pub mod payload;
pub mod reconcile;
pub mod recorder;
pub mod server;
pub mod session;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;

pub use client::{ClientError, ClientSession, StreamReport};
pub use config::{ClientConfig, ServerConfig};
pub use packet::{Header, MessageType, Packet, PacketError, HEADER_LEN};
pub use reconcile::{ReconcileOutcome, ReconciledRow};
pub use server::{Dispatcher, Server, ServerError};
