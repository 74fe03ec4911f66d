//! Wire protocol framing
//!
//! Provides the packet codec, the CRC engine, and the streaming packet
//! decoder for the device's framed binary protocol:
//!
//! `[0xD5] [length] [payload 0..=32 bytes] [crc8(payload)]`
//!
//! The first byte of every response payload is a status code from
//! [`ResponseCode`].

pub mod crc;
pub mod decoder;
pub mod packet;

pub use crc::crc8;
pub use decoder::{DecodeState, PacketDecoder};
pub use packet::{decode, encode};

use thiserror::Error;

/// Start-of-packet marker
pub const PACKET_HEADER: u8 = 0xD5;

/// Maximum payload length a packet may carry
pub const MAX_PAYLOAD_LENGTH: usize = 32;

/// Minimum length of a decodable packet (header, length, payload, crc)
pub const MIN_PACKET_LENGTH: usize = 4;

/// Framing error types
///
/// Every variant is local to a single packet; recovery (retransmission) is
/// the driver's responsibility, operating on a fresh decoder per attempt.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// Payload handed to the encoder exceeds the protocol budget
    #[error("payload of {len} bytes exceeds the {MAX_PAYLOAD_LENGTH}-byte budget")]
    PayloadTooLong {
        /// Offending payload length
        len: usize,
    },

    /// Packet handed to the decoder is below the minimum frame size
    #[error("packet of {len} bytes is shorter than the {MIN_PACKET_LENGTH}-byte minimum")]
    PacketTooShort {
        /// Offending packet length
        len: usize,
    },

    /// First byte is not the header marker
    #[error("bad header byte {found:#04x}, expected 0xd5")]
    BadHeader {
        /// Byte found where the header was expected
        found: u8,
    },

    /// Length field exceeds the payload budget
    #[error("length field {len} exceeds the {MAX_PAYLOAD_LENGTH}-byte budget")]
    LengthOutOfRange {
        /// Declared length
        len: u8,
    },

    /// Length field disagrees with the number of bytes present
    #[error("length field declares {declared} payload byte(s) but packet carries {actual}")]
    LengthMismatch {
        /// Length the packet declares
        declared: usize,
        /// Length actually present
        actual: usize,
    },

    /// Checksum over the payload does not match the CRC byte
    #[error("crc mismatch: computed {computed:#04x}, packet carries {found:#04x}")]
    CrcMismatch {
        /// CRC computed over the payload
        computed: u8,
        /// CRC byte carried by the packet
        found: u8,
    },
}

/// Response status codes reported by the device
///
/// The first byte of every response payload is one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// Command accepted
    Success,
    /// Unspecified failure; the command may be retransmitted
    GenericError,
    /// The device's command queue is full; back off and retransmit
    ActionBufferOverflow,
    /// The device saw a CRC failure on our packet; retransmit
    CrcMismatch,
    /// A downstream (tool) bus operation timed out; not recoverable here
    DownstreamTimeout,
    /// The tool lock could not be acquired; not recoverable here
    ToolLockTimeout,
    /// The device cancelled the active build
    CancelBuild,
}

impl ResponseCode {
    /// Decode a status byte; `None` for codes outside the protocol.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x81 => Some(Self::Success),
            0x80 => Some(Self::GenericError),
            0x82 => Some(Self::ActionBufferOverflow),
            0x83 => Some(Self::CrcMismatch),
            0x87 => Some(Self::DownstreamTimeout),
            0x88 => Some(Self::ToolLockTimeout),
            0x89 => Some(Self::CancelBuild),
            _ => None,
        }
    }

    /// Wire value of this code.
    pub fn byte(self) -> u8 {
        match self {
            Self::Success => 0x81,
            Self::GenericError => 0x80,
            Self::ActionBufferOverflow => 0x82,
            Self::CrcMismatch => 0x83,
            Self::DownstreamTimeout => 0x87,
            Self::ToolLockTimeout => 0x88,
            Self::CancelBuild => 0x89,
        }
    }

    /// Whether the driver may transparently retransmit after this code.
    ///
    /// Overflow is retryable but backed off and accounted separately.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::GenericError | Self::ActionBufferOverflow | Self::CrcMismatch
        )
    }
}
