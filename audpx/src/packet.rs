//! Wire-format definitions for AUDP-X datagrams.
//!
//! Every datagram exchanged between client and server is a [`Packet`].  This
//! module is responsible for:
//! - Defining the fixed 13-byte binary header.
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`], returning an
//!   error for truncated input.
//!
//! No I/O happens here; this is pure data transformation.  The payload is
//! opaque bytes; [`crate::payload`] gives it meaning.
//!
//! # Wire format
//!
//! All multi-byte fields are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Version|MsgType|           Device ID           |   Seq (hi)    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Seq (lo)    |                                               |
//! +-+-+-+-+-+-+-+-+        Timestamp (IEEE 754 f64, seconds)      +
//! |                                                               |
//! +               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |               |            Payload (UTF-8 JSON) ...           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 13 bytes.
//! version/type(1) + device_id(2) + seq(2) + timestamp(8)

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 13;

/// Protocol version carried by every packet this crate emits.
pub const PROTOCOL_VERSION: u8 = 1;

// Byte offsets of each field within the serialised header.
const OFF_VERSION_TYPE: usize = 0;
const OFF_DEVICE_ID: usize = 1;
const OFF_SEQ: usize = 3;
const OFF_TIMESTAMP: usize = 5;

/// The 4-bit message type carried in the low nibble of byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Init,
    Data,
    Ack,
    End,
    Heartbeat,
    /// Any other nibble value.  Decoding never fails on the type; the
    /// dispatcher decides what to do with codes it does not know.
    Unknown(u8),
}

impl MessageType {
    pub fn from_nibble(value: u8) -> Self {
        match value & 0x0F {
            0 => MessageType::Init,
            1 => MessageType::Data,
            2 => MessageType::Ack,
            3 => MessageType::End,
            4 => MessageType::Heartbeat,
            other => MessageType::Unknown(other),
        }
    }

    pub fn to_nibble(self) -> u8 {
        match self {
            MessageType::Init => 0,
            MessageType::Data => 1,
            MessageType::Ack => 2,
            MessageType::End => 3,
            MessageType::Heartbeat => 4,
            MessageType::Unknown(v) => v & 0x0F,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Init => write!(f, "INIT"),
            MessageType::Data => write!(f, "DATA"),
            MessageType::Ack => write!(f, "ACK"),
            MessageType::End => write!(f, "END"),
            MessageType::Heartbeat => write!(f, "HEARTBEAT"),
            MessageType::Unknown(v) => write!(f, "UNKNOWN({v})"),
        }
    }
}

/// Fixed-size protocol header.
///
/// Fields are in host representation; [`Header::encode`] converts to
/// big-endian on the wire and [`Header::decode`] converts back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    /// Protocol version (4 bits; higher bits are masked off on encode).
    pub version: u8,
    pub msg_type: MessageType,
    /// Sender identity.  16 bits, so distinct devices may collide.
    pub device_id: u16,
    pub seq: u16,
    /// Sender wall-clock time in seconds since the Unix epoch.
    pub timestamp: f64,
}

impl Header {
    /// Serialise into exactly [`HEADER_LEN`] bytes.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[OFF_VERSION_TYPE] = ((self.version & 0x0F) << 4) | self.msg_type.to_nibble();
        buf[OFF_DEVICE_ID..OFF_DEVICE_ID + 2].copy_from_slice(&self.device_id.to_be_bytes());
        buf[OFF_SEQ..OFF_SEQ + 2].copy_from_slice(&self.seq.to_be_bytes());
        buf[OFF_TIMESTAMP..OFF_TIMESTAMP + 8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf
    }

    /// Parse the first [`HEADER_LEN`] bytes of `buf`.  Trailing bytes are
    /// ignored here; [`Packet::decode`] treats them as payload.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        let Some(raw) = buf.get(..HEADER_LEN) else {
            return Err(PacketError::BufferTooShort { len: buf.len() });
        };

        let mut device_id = [0u8; 2];
        device_id.copy_from_slice(&raw[OFF_DEVICE_ID..OFF_DEVICE_ID + 2]);
        let mut seq = [0u8; 2];
        seq.copy_from_slice(&raw[OFF_SEQ..OFF_SEQ + 2]);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&raw[OFF_TIMESTAMP..OFF_TIMESTAMP + 8]);

        Ok(Header {
            version: raw[OFF_VERSION_TYPE] >> 4,
            msg_type: MessageType::from_nibble(raw[OFF_VERSION_TYPE]),
            device_id: u16::from_be_bytes(device_id),
            seq: u16::from_be_bytes(seq),
            timestamp: f64::from_be_bytes(timestamp),
        })
    }
}

/// A complete protocol datagram: header + payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a packet of the current [`PROTOCOL_VERSION`] stamped with the
    /// local wall clock.
    pub fn new(msg_type: MessageType, device_id: u16, seq: u16, payload: Vec<u8>) -> Self {
        Packet {
            header: Header {
                version: PROTOCOL_VERSION,
                msg_type,
                device_id,
                seq,
                timestamp: unix_timestamp(),
            },
            payload,
        }
    }

    /// Build the ACK for `request`: same version, device id and sequence
    /// number, type ACK, fresh local timestamp, empty payload.
    pub fn ack_for(request: &Header) -> Self {
        Packet {
            header: Header {
                version: request.version,
                msg_type: MessageType::Ack,
                device_id: request.device_id,
                seq: request.seq,
                timestamp: unix_timestamp(),
            },
            payload: Vec::new(),
        }
    }

    /// Serialise this packet into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Packet`] from a raw datagram.
    ///
    /// Returns [`PacketError::BufferTooShort`] if `buf` cannot hold a header.
    /// Everything after the header is the payload, possibly empty.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        let header = Header::decode(buf)?;
        Ok(Packet {
            header,
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

/// Errors that can arise when framing a raw datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("buffer of {len} bytes is too short to contain a {HEADER_LEN}-byte header")]
    BufferTooShort { len: usize },
}

/// Current wall-clock time as fractional seconds since the Unix epoch.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
