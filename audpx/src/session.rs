//! Server-side per-device session tracking.
//!
//! Sessions are keyed by the 16-bit device id from the header.  A session is
//! created the first time a device id is seen (recording the sender's
//! address), lives for the lifetime of the server, and is reset, never
//! removed, when the device re-handshakes.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

/// State the server keeps for one device.
#[derive(Debug, Clone)]
pub struct Session {
    /// Address of the first packet seen from this device.
    pub addr: SocketAddr,
    /// Every DATA sequence number accepted so far (duplicate suppression).
    pub received_seqs: HashSet<u16>,
    /// Highest accepted sequence number.
    pub last_seq: u16,
    /// Batch length of the last accepted packet, used to project the next
    /// expected sequence number.  Never zero.
    pub last_batch_size: u32,
    /// Arrival time (Unix seconds) of the last HEARTBEAT, `0.0` if none.
    pub last_heartbeat: f64,
}

impl Session {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            received_seqs: HashSet::new(),
            last_seq: 0,
            last_batch_size: 1,
            last_heartbeat: 0.0,
        }
    }

    /// Re-handshake: forget received sequence numbers and restart from 0.
    ///
    /// `last_batch_size` is left alone.
    pub fn reset(&mut self) {
        self.received_seqs.clear();
        self.received_seqs.insert(0);
        self.last_seq = 0;
    }

    pub fn is_duplicate(&self, seq: u16) -> bool {
        self.received_seqs.contains(&seq)
    }

    /// Sequence number the next packet should carry if nothing was lost.
    pub fn expected_next(&self) -> u32 {
        u32::from(self.last_seq) + self.last_batch_size
    }

    /// A forward jump past [`Self::expected_next`].  Late arrivals of
    /// earlier packets never clear a gap that was already reported.
    pub fn is_gap(&self, seq: u16) -> bool {
        u32::from(seq) > self.expected_next()
    }
}

/// All sessions known to the server.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<u16, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the session for `device_id`, creating it with `addr` if this
    /// is the first packet from that device.  The flag is `true` on creation.
    pub fn get_or_create(&mut self, device_id: u16, addr: SocketAddr) -> (&mut Session, bool) {
        let mut created = false;
        let session = self.sessions.entry(device_id).or_insert_with(|| {
            created = true;
            Session::new(addr)
        });
        (session, created)
    }

    pub fn get(&self, device_id: u16) -> Option<&Session> {
        self.sessions.get(&device_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
