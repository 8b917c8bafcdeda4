//! Run configuration for the client and server.
//!
//! Every field has a default matching the reference experiment setup, so a
//! bare `audpx server` / `audpx client --server <addr>` reproduces it.  The
//! binary maps command-line flags onto these structs.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::packet::PROTOCOL_VERSION;
use crate::simulator::SimulatorConfig;
use crate::timer::TimerConfig;

/// Well-known server port.
pub const DEFAULT_PORT: u16 = 5005;

/// Default file name of the reconciled, send-time-ordered log.
pub const DEFAULT_RECONCILED_LOG: &str = "packets_log_sorted_by_timestamp.csv";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: SocketAddr,
    pub version: u8,
    pub device_id: u16,
    /// Highest target sequence number; the stream covers `1..=num_messages`.
    pub num_messages: u32,
    /// Readings per DATA packet, and the sequence step between packets.
    pub batch_size: u32,
    pub heartbeat_interval: Duration,
    /// Pause after every DATA send.
    pub send_interval: Duration,
    pub timer: TimerConfig,
    pub simulator: SimulatorConfig,
}

impl ClientConfig {
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            version: PROTOCOL_VERSION,
            device_id: default_device_id(),
            num_messages: 70,
            batch_size: 1,
            heartbeat_interval: Duration::from_secs(3),
            send_interval: Duration::from_secs(1),
            timer: TimerConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

/// Device identity derived from the process id, truncated to 16 bits.
///
/// Two processes whose ids agree in the low 16 bits get the same identity
/// and the server will merge their sessions.
pub fn default_device_id() -> u16 {
    (std::process::id() & 0xFFFF) as u16
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Where the reconciled log is written on shutdown.
    pub reconciled_log: PathBuf,
    /// Where the arrival-order log is written on shutdown, if anywhere.
    pub raw_log: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            reconciled_log: PathBuf::from(DEFAULT_RECONCILED_LOG),
            raw_log: None,
        }
    }
}
