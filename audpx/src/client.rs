//! Client side of an AUDP-X session.
//!
//! A [`ClientSession`] performs one **reliable** handshake and then streams
//! **unreliable** data:
//!
//! 1. INIT (with an [`InitPayload`] descriptor) is sent and the client waits
//!    for an ACK.  Timeouts are retried with jittered exponential back-off
//!    (see [`crate::timer`]) until the retry budget is spent, at which point
//!    the session is terminated and [`ClientError::HandshakeFailed`] is
//!    returned.  No data is ever sent without a completed handshake.
//! 2. The target sequence number walks from 1 to `num_messages` in steps of
//!    `batch_size`.  Each step optionally emits a HEARTBEAT (when the
//!    heartbeat interval has elapsed), then one DATA packet whose readings
//!    carry contiguous ids starting at the current sequence number.
//! 3. END is sent once the sequence passes `num_messages`, and the stream
//!    returns only after any simulator-delayed packets have left the socket.
//!
//! DATA, HEARTBEAT and END are fire-and-forget: no reply is awaited, nothing
//! is retransmitted, and a failed send is logged and skipped.  The sequence
//! always advances, so loss on the wire shows up as loss at the server.

use std::net::SocketAddr;
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tokio::time::{timeout, Instant};

use crate::config::ClientConfig;
use crate::packet::{Header, MessageType, Packet};
use crate::payload::{DataPayload, InitPayload, PayloadError, Reading};
use crate::simulator::{Fate, Simulator, SimulatorStats};
use crate::socket::{Socket, SocketError};
use crate::state::ClientState;
use crate::timer::HandshakeTimer;

/// Unit attached to every synthetic reading.
const READING_UNIT: &str = "C";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("handshake failed: no ACK after {attempts} attempt(s)")]
    HandshakeFailed { attempts: u32 },
    #[error("operation not valid in state {0}")]
    BadState(ClientState),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// Summary of one streaming phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReport {
    /// DATA packets handed to the network layer (including failed sends).
    pub data_packets: u64,
    /// DATA packets whose local send failed.
    pub send_failures: u64,
    pub heartbeats: u64,
    pub simulator: SimulatorStats,
}

pub struct ClientSession {
    config: ClientConfig,
    state: ClientState,
    timer: HandshakeTimer,
    net: Simulator,
}

impl ClientSession {
    /// Bind an ephemeral local socket of the server's address family and
    /// build a session around it.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let local: SocketAddr = if config.server.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = Socket::bind(local).await?;
        Ok(Self::new(socket, config))
    }

    pub fn new(socket: Socket, config: ClientConfig) -> Self {
        let net = Simulator::new(Arc::new(socket), config.server, config.simulator.clone());
        Self {
            timer: HandshakeTimer::new(config.timer.clone()),
            config,
            state: ClientState::InitPending,
            net,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn device_id(&self) -> u16 {
        self.config.device_id
    }

    /// Handshake, then stream.  A failed handshake leaves the session
    /// [`ClientState::Terminated`] without sending any data.
    pub async fn run(&mut self) -> Result<StreamReport, ClientError> {
        self.handshake().await?;
        self.stream().await
    }

    /// Send INIT and wait for its ACK, retrying within the configured budget.
    ///
    /// Returns the header of the ACK that completed the handshake.
    pub async fn handshake(&mut self) -> Result<Header, ClientError> {
        if self.state != ClientState::InitPending {
            return Err(ClientError::BadState(self.state));
        }

        let device_id = self.config.device_id;
        let descriptor = InitPayload::new(self.config.version).encode()?;
        let mut init = Packet::new(MessageType::Init, device_id, 0, descriptor);
        init.header.version = self.config.version;

        let budget = self.timer.attempt_budget();
        for attempt in 0..budget {
            if let Err(e) = self.net.send(&init).await {
                log::warn!("[client] INIT send failed on attempt {}: {e}", attempt + 1);
                self.state = ClientState::Terminated;
                return Err(e.into());
            }

            let wait = self.timer.reply_timeout(attempt);
            match timeout(wait, self.net.socket().recv_from()).await {
                Ok(Ok((reply, from))) if reply.header.msg_type == MessageType::Ack => {
                    self.state = ClientState::HandshakeDone;
                    log::info!(
                        "[client] SUCCESS HANDSHAKE :: DEVICE {device_id} :: ACK from {from} seq={}",
                        reply.header.seq
                    );
                    return Ok(reply.header);
                }
                Ok(Ok((reply, from))) => {
                    // Wrong reply type: counts as an attempt, no back-off.
                    log::debug!(
                        "[client] ignoring {} from {from} while waiting for ACK",
                        reply.header.msg_type
                    );
                    continue;
                }
                Ok(Err(SocketError::Packet(e))) => {
                    log::debug!("[client] malformed handshake reply: {e}");
                    continue;
                }
                Ok(Err(e)) => {
                    log::debug!("[client] handshake receive error: {e}");
                }
                Err(_elapsed) => {
                    log::debug!(
                        "[client] no ACK within {wait:?} (attempt {}/{budget})",
                        attempt + 1
                    );
                }
            }

            if attempt + 1 < budget {
                let pause = self.timer.backoff(attempt + 1, &mut rand::rng());
                tokio::time::sleep(pause).await;
            }
        }

        self.net.flush().await;
        self.state = ClientState::Terminated;
        log::error!("[client] FAILED INITIALIZE :: DEVICE {device_id} :: NO ACK");
        Err(ClientError::HandshakeFailed { attempts: budget })
    }

    /// Emit the data stream and the closing END.  Requires a completed
    /// handshake.
    pub async fn stream(&mut self) -> Result<StreamReport, ClientError> {
        if self.state != ClientState::HandshakeDone {
            return Err(ClientError::BadState(self.state));
        }
        self.state = ClientState::Streaming;

        let device_id = self.config.device_id;
        let step = self.config.batch_size.max(1);
        let mut report = StreamReport::default();
        let mut last_heartbeat = Instant::now();
        let mut seq: u32 = 1;

        while seq <= self.config.num_messages {
            if last_heartbeat.elapsed() >= self.config.heartbeat_interval {
                let hb = self.packet(MessageType::Heartbeat, 0, Vec::new());
                if let Err(e) = self.net.send(&hb).await {
                    log::warn!("[client] HEARTBEAT send failed :: DEVICE {device_id}: {e}");
                } else {
                    log::info!("[client] HEARTBEAT SENT :: DEVICE {device_id}");
                }
                report.heartbeats += 1;
                last_heartbeat = Instant::now();
            }

            let batch = synthetic_batch(seq, step, &mut rand::rng());
            let data = self.packet(MessageType::Data, wire_seq(seq), batch.encode()?);
            report.data_packets += 1;
            match self.net.send(&data).await {
                Ok(Fate::Dropped) => {
                    log::info!("[client] DATA DROPPED (simulated) :: DEVICE {device_id} :: SEQ {seq}")
                }
                Ok(_) => log::info!("[client] DATA SENT OK :: DEVICE {device_id} :: SEQ {seq}"),
                Err(e) => {
                    report.send_failures += 1;
                    log::warn!("[client] DATA SEND FAIL :: DEVICE {device_id} :: SEQ {seq}: {e}");
                }
            }

            seq = match seq.checked_add(step) {
                Some(next) => next,
                None => break,
            };
            tokio::time::sleep(self.config.send_interval).await;
        }

        let end = self.packet(MessageType::End, 0, Vec::new());
        if let Err(e) = self.net.send(&end).await {
            log::warn!("[client] END send failed :: DEVICE {device_id}: {e}");
        }
        if self.net.in_flight() > 0 {
            log::debug!("[client] waiting for {} delayed send(s)", self.net.in_flight());
        }
        self.net.flush().await;
        self.state = ClientState::Terminated;

        report.simulator = self.net.stats;
        log::info!(
            "[client] stream complete :: DEVICE {device_id} :: data={} failures={} heartbeats={} sim_dropped={} sim_duplicated={}",
            report.data_packets,
            report.send_failures,
            report.heartbeats,
            report.simulator.dropped,
            report.simulator.duplicated
        );
        Ok(report)
    }

    fn packet(&self, msg_type: MessageType, seq: u16, payload: Vec<u8>) -> Packet {
        let mut packet = Packet::new(msg_type, self.config.device_id, seq, payload);
        packet.header.version = self.config.version;
        packet
    }
}

/// Build `len` readings with ids `first_id, first_id + 1, ...` and random
/// temperatures in `[20.0, 30.0)` rounded to two decimals.
pub fn synthetic_batch<R: Rng + ?Sized>(first_id: u32, len: u32, rng: &mut R) -> DataPayload {
    let batch = (0..len)
        .map(|offset| Reading {
            reading_id: Some(i64::from(first_id) + i64::from(offset)),
            value: Some((rng.random_range(20.0..30.0_f64) * 100.0).round() / 100.0),
            unit: Some(READING_UNIT.to_string()),
        })
        .collect();
    DataPayload { batch }
}

/// Sequence numbers are 16 bits on the wire; the client's counter is not.
fn wire_seq(seq: u32) -> u16 {
    (seq & 0xFFFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn synthetic_batch_ids_are_contiguous_from_seq() {
        let mut rng = StdRng::seed_from_u64(3);
        let batch = synthetic_batch(11, 4, &mut rng);
        let ids: Vec<_> = batch.batch.iter().map(|r| r.reading_id).collect();
        assert_eq!(ids, vec![Some(11), Some(12), Some(13), Some(14)]);
        assert!(batch.missing_ids(11).is_empty());
    }

    #[test]
    fn synthetic_values_in_range_with_two_decimals() {
        let mut rng = StdRng::seed_from_u64(9);
        for r in synthetic_batch(1, 200, &mut rng).batch {
            let value = r.value.unwrap();
            assert!((20.0..=30.0).contains(&value));
            assert!(((value * 100.0).round() - value * 100.0).abs() < 1e-6);
            assert_eq!(r.unit.as_deref(), Some("C"));
        }
    }

    #[test]
    fn wire_seq_wraps_at_16_bits() {
        assert_eq!(wire_seq(1), 1);
        assert_eq!(wire_seq(65_535), 65_535);
        assert_eq!(wire_seq(65_536), 0);
        assert_eq!(wire_seq(65_537), 1);
    }
}
