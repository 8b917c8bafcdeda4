//! Optional network impairment layer for the client.
//!
//! The harness exists to measure how the server copes with a bad network, so
//! the client can degrade its own traffic before it reaches the wire.  A
//! [`Simulator`] sits between [`crate::client::ClientSession`] and the real
//! [`Socket`] and applies a configurable fault model to every outbound
//! datagram:
//!
//! | Fault        | Description                                          |
//! |--------------|------------------------------------------------------|
//! | Packet loss  | Drop a packet with probability `loss_rate`.          |
//! | Duplication  | Deliver a packet twice with probability `duplicate_rate`. |
//! | Delay        | Hold every packet back by `delay` before sending.    |
//!
//! Delayed packets are sent from spawned tasks, so the caller's sequential
//! loop never waits for them and later packets may overtake earlier ones.
//! The tasks are owned by the simulator; [`Simulator::flush`] must be awaited
//! before the runtime goes away or the packets still in flight are lost.
//! With the default configuration the simulator is a transparent
//! pass-through.  A fixed `seed` makes a run reproducible.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinSet;

use crate::packet::Packet;
use crate::socket::{Socket, SocketError};

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`; out-of-range values are
/// clamped when the [`Simulator`] is built.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Probability that any given packet is silently dropped.
    pub loss_rate: f64,
    /// Probability that a packet is sent twice.
    pub duplicate_rate: f64,
    /// Fixed delay applied to every packet.
    pub delay: Duration,
    /// RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            delay: Duration::ZERO,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    /// `true` when no fault can ever be injected.
    pub fn is_passthrough(&self) -> bool {
        self.loss_rate <= 0.0 && self.duplicate_rate <= 0.0 && self.delay.is_zero()
    }
}

/// What the simulator did with one outbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Dropped,
    Sent,
    Duplicated,
}

/// Counters of injected faults, reported at the end of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    pub dropped: u64,
    pub duplicated: u64,
    pub delayed: u64,
}

/// A fault-injecting wrapper around the socket layer.
pub struct Simulator {
    pub config: SimulatorConfig,
    pub stats: SimulatorStats,
    socket: Arc<Socket>,
    peer: SocketAddr,
    rng: StdRng,
    in_flight: JoinSet<()>,
}

impl Simulator {
    pub fn new(socket: Arc<Socket>, peer: SocketAddr, mut config: SimulatorConfig) -> Self {
        config.loss_rate = probability(config.loss_rate);
        config.duplicate_rate = probability(config.duplicate_rate);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            stats: SimulatorStats::default(),
            socket,
            peer,
            rng,
            in_flight: JoinSet::new(),
        }
    }

    /// The real socket, for receiving replies.
    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Number of delayed sends not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait until every delayed packet has been handed to the socket.
    pub async fn flush(&mut self) {
        while let Some(res) = self.in_flight.join_next().await {
            if let Err(e) = res {
                log::warn!("[sim] delayed send task failed: {e}");
            }
        }
    }

    /// Send a packet through the simulated network.
    ///
    /// Errors are only reported for packets sent inline; a delayed packet's
    /// send error is logged by the task that sends it.
    pub async fn send(&mut self, packet: &Packet) -> Result<Fate, SocketError> {
        if self.config.loss_rate > 0.0 && self.rng.random_bool(self.config.loss_rate) {
            self.stats.dropped += 1;
            log::debug!(
                "[sim] drop {} seq={}",
                packet.header.msg_type,
                packet.header.seq
            );
            return Ok(Fate::Dropped);
        }

        let duplicate =
            self.config.duplicate_rate > 0.0 && self.rng.random_bool(self.config.duplicate_rate);
        let copies = if duplicate { 2 } else { 1 };
        if duplicate {
            self.stats.duplicated += 1;
            log::debug!(
                "[sim] duplicate {} seq={}",
                packet.header.msg_type,
                packet.header.seq
            );
        }

        let bytes = packet.encode();
        if self.config.delay.is_zero() {
            for _ in 0..copies {
                self.socket.send_bytes(&bytes, self.peer).await?;
            }
        } else {
            // Reap finished sends so the set stays bounded on long streams.
            while self.in_flight.try_join_next().is_some() {}

            self.stats.delayed += 1;
            let socket = Arc::clone(&self.socket);
            let (peer, delay) = (self.peer, self.config.delay);
            self.in_flight.spawn(async move {
                tokio::time::sleep(delay).await;
                for _ in 0..copies {
                    if let Err(e) = socket.send_bytes(&bytes, peer).await {
                        log::warn!("[sim] delayed send to {peer} failed: {e}");
                    }
                }
            });
        }

        Ok(if duplicate { Fate::Duplicated } else { Fate::Sent })
    }
}

fn probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}
