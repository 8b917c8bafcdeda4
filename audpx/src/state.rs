//! Client session finite-state machine (FSM) types.
//!
//! State transitions are driven by [`crate::client::ClientSession`]; this
//! module only names the states so they can be logged and asserted on.
//!
//! ```text
//!  INIT_PENDING ──ACK──▶ HANDSHAKE_DONE ──▶ STREAMING ──END sent──▶ TERMINATED
//!       │                                                              ▲
//!       └──────────────── retry budget exhausted ─────────────────────┘
//! ```

/// All possible states of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// INIT not yet acknowledged; initial state.
    #[default]
    InitPending,
    /// INIT acknowledged; no data sent yet.
    HandshakeDone,
    /// Data batches and heartbeats are being emitted.
    Streaming,
    /// END sent, or the handshake failed.  No further sends.
    Terminated,
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ClientState::InitPending => "INIT_PENDING",
            ClientState::HandshakeDone => "HANDSHAKE_DONE",
            ClientState::Streaming => "STREAMING",
            ClientState::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}
