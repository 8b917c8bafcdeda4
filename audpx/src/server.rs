//! AUDP-X server: packet dispatch and the receive loop.
//!
//! # Architecture
//!
//! ```text
//!   UDP datagram
//!        │
//!  ┌─────▼──────┐  decode fail → warn, drop
//!  │ Dispatcher │──────────────────────────────
//!  │            │  INIT       → reset session, ACK
//!  │ sessions   │  HEARTBEAT  → stamp session, ACK
//!  │ recorder   │  DATA       → dedup, gap check, log row, ACK
//!  │            │  END/other  → log only
//!  └─────┬──────┘
//!        │ on shutdown
//!  ┌─────▼──────┐
//!  │ reconcile  │  sort by send time, add delay, write CSV
//!  └────────────┘
//! ```
//!
//! Everything runs on one task: a packet is decoded, dispatched, logged and
//! acknowledged before the next one is read, so the session table and the
//! log buffer need no locking.  Shutdown is observed between packets, and
//! [`Server::run`] does not return until the logs have been persisted.

use std::future::Future;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::ServerConfig;
use crate::packet::{unix_timestamp, Header, MessageType, Packet};
use crate::payload::DataPayload;
use crate::reconcile::{reconcile_and_persist, ReconcileOutcome};
use crate::recorder::{LogRecorder, PacketLogRow, PersistError};
use crate::session::{Session, SessionTable};
use crate::socket::{Socket, SocketError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("failed to persist packet log: {0}")]
    Persist(#[from] PersistError),
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// All mutable server state, owned by the receive loop.
#[derive(Debug, Default)]
pub struct Dispatcher {
    pub sessions: SessionTable,
    pub recorder: LogRecorder,
    /// Datagrams discarded because they were too short for a header.
    pub framing_errors: u64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one raw datagram that arrived from `from` at `arrival`
    /// (Unix seconds).  Returns the reply to send, if any.
    pub fn handle_datagram(
        &mut self,
        raw: &[u8],
        from: SocketAddr,
        arrival: f64,
    ) -> Option<Packet> {
        let packet = match Packet::decode(raw) {
            Ok(p) => p,
            Err(e) => {
                self.framing_errors += 1;
                log::warn!("[server] framing error from {from}: {e}; discarding");
                return None;
            }
        };
        let header = packet.header;
        let device_id = header.device_id;

        let (session, created) = self.sessions.get_or_create(device_id, from);
        if created {
            log::info!("[server] new session started by device {device_id} at {from}");
        }

        match header.msg_type {
            MessageType::Init => {
                session.reset();
                log::info!(
                    "[server] INIT from device {device_id} seq={}; ACK sent",
                    header.seq
                );
                Some(Packet::ack_for(&header))
            }
            MessageType::Heartbeat => {
                session.last_heartbeat = arrival;
                log::info!("[server] HEARTBEAT from device {device_id}; ACK sent");
                Some(Packet::ack_for(&header))
            }
            MessageType::Data => Some(on_data(
                session,
                &mut self.recorder,
                &header,
                &packet.payload,
                arrival,
            )),
            MessageType::End => {
                // Advisory only: the session stays as it is.
                log::info!("[server] END from device {device_id}");
                None
            }
            other => {
                log::warn!("[server] unknown message type {other} from device {device_id}");
                None
            }
        }
    }
}

fn on_data(
    session: &mut Session,
    recorder: &mut LogRecorder,
    header: &Header,
    payload: &[u8],
    arrival: f64,
) -> Packet {
    let (device_id, seq) = (header.device_id, header.seq);
    let mut row = PacketLogRow {
        device_id,
        seq,
        send_timestamp: header.timestamp,
        arrival_timestamp: arrival,
        duplicate_flag: 0,
        gap_flag: 0,
        payload_len: payload.len(),
    };

    if session.is_duplicate(seq) {
        row.duplicate_flag = 1;
        recorder.append(row);
        log::warn!("[server] duplicate DATA from device {device_id} seq={seq}; ignoring");
        return Packet::ack_for(header);
    }

    let gap = session.is_gap(seq);
    session.received_seqs.insert(seq);
    session.last_seq = session.last_seq.max(seq);

    let (batch_size, missing) = match DataPayload::decode(payload) {
        Ok(data) => {
            let batch_size = data.batch.len();
            session.last_batch_size = u32::try_from(batch_size).unwrap_or(u32::MAX).max(1);
            (batch_size, data.missing_ids(i64::from(seq)))
        }
        Err(e) => {
            log::warn!("[server] bad payload from device {device_id} seq={seq}: {e}");
            session.last_batch_size = 1;
            (0, Vec::new())
        }
    };

    row.gap_flag = u8::from(gap);
    recorder.append(row);

    let mut line = format!(
        "[server] DATA RECEIVED :: DEVICE {device_id} :: SEQ {seq} :: BATCH {batch_size} :: SIZE {} :: CLIENT TS {:.6}",
        payload.len(),
        header.timestamp
    );
    if gap {
        line.push_str(" :: MISSING PACKET BEFORE THIS");
    }
    if !missing.is_empty() {
        let ids: Vec<String> = missing.iter().map(i64::to_string).collect();
        line.push_str(&format!(" :: BATCH MISSING IDS: {}", ids.join(", ")));
    }
    log::info!("{line}");

    Packet::ack_for(header)
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub struct Server {
    config: ServerConfig,
    socket: Socket,
    dispatcher: Dispatcher,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let socket = Socket::bind(config.bind).await?;
        log::info!("[server] listening on {}", socket.local_addr);
        Ok(Self {
            config,
            socket,
            dispatcher: Dispatcher::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Serve until `shutdown` resolves, then persist the logs.
    ///
    /// The raw log (if configured) and the reconciled log are both written
    /// before this returns.
    pub async fn run<F>(mut self, shutdown: F) -> Result<ReconcileOutcome, ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    log::info!("[server] shutdown requested; processing logs");
                    break;
                }

                result = self.socket.recv_datagram() => {
                    let (raw, from) = match result {
                        Ok(v) => v,
                        Err(e) => {
                            log::warn!("[server] receive error: {e}");
                            continue;
                        }
                    };
                    let arrival = unix_timestamp();
                    if let Some(reply) = self.dispatcher.handle_datagram(&raw, from, arrival) {
                        if let Err(e) = self.socket.send_to(&reply, from).await {
                            log::warn!("[server] failed to send ACK to {from}: {e}");
                        }
                    }
                }
            }
        }

        self.persist()
    }

    fn persist(&self) -> Result<ReconcileOutcome, ServerError> {
        let recorder = &self.dispatcher.recorder;
        log::info!(
            "[server] {} session(s), {} DATA row(s), {} framing error(s)",
            self.dispatcher.sessions.len(),
            recorder.len(),
            self.dispatcher.framing_errors
        );
        if let Some(raw_path) = &self.config.raw_log {
            if !recorder.is_empty() {
                recorder.write_raw(raw_path)?;
                log::info!("[server] raw packet log saved to {}", raw_path.display());
            }
        }
        Ok(reconcile_and_persist(recorder, &self.config.reconciled_log)?)
    }
}
