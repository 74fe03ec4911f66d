//! Streaming packet decoder
//!
//! Reconstructs one packet from an unframed, possibly noisy byte stream,
//! validating header, length field, and CRC incrementally. A decoder is
//! built per packet and discarded once [`DecodeState::Ready`] is reached or
//! an unrecoverable byte is seen; it is never reused across packets.

use super::{crc8, PacketError, MAX_PAYLOAD_LENGTH, PACKET_HEADER};
use bytes::{BufMut, Bytes, BytesMut};

/// Decoder progress through one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Waiting for the header marker
    AwaitingHeader,
    /// Header seen, waiting for the length field
    AwaitingLength,
    /// Accumulating payload bytes
    AwaitingData,
    /// Payload complete, waiting for the CRC byte
    AwaitingCrc,
    /// A full, validated packet has been received
    Ready,
}

/// Byte-at-a-time packet decoder
#[derive(Debug)]
pub struct PacketDecoder {
    state: DecodeState,
    expected: usize,
    payload: BytesMut,
}

impl PacketDecoder {
    /// Create a decoder awaiting a packet header.
    pub fn new() -> Self {
        Self {
            state: DecodeState::AwaitingHeader,
            expected: 0,
            payload: BytesMut::with_capacity(MAX_PAYLOAD_LENGTH),
        }
    }

    /// Current state.
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Whether a complete packet has been decoded.
    pub fn is_ready(&self) -> bool {
        self.state == DecodeState::Ready
    }

    /// Consume one byte from the stream.
    ///
    /// Returns the state after the transition. A [`PacketError::BadHeader`]
    /// leaves the decoder in `AwaitingHeader` so the caller may keep
    /// scanning the stream for resynchronization; all other errors leave
    /// the decoder unusable and the instance should be discarded.
    pub fn feed(&mut self, byte: u8) -> Result<DecodeState, PacketError> {
        match self.state {
            DecodeState::AwaitingHeader => {
                if byte != PACKET_HEADER {
                    return Err(PacketError::BadHeader { found: byte });
                }
                self.state = DecodeState::AwaitingLength;
            }
            DecodeState::AwaitingLength => {
                if byte as usize > MAX_PAYLOAD_LENGTH {
                    return Err(PacketError::LengthOutOfRange { len: byte });
                }
                self.expected = byte as usize;
                self.state = if self.expected == 0 {
                    DecodeState::AwaitingCrc
                } else {
                    DecodeState::AwaitingData
                };
            }
            DecodeState::AwaitingData => {
                self.payload.put_u8(byte);
                if self.payload.len() == self.expected {
                    self.state = DecodeState::AwaitingCrc;
                }
            }
            DecodeState::AwaitingCrc => {
                let computed = crc8(&self.payload);
                if byte != computed {
                    return Err(PacketError::CrcMismatch {
                        computed,
                        found: byte,
                    });
                }
                self.state = DecodeState::Ready;
            }
            // A ready decoder ignores further input; callers discard it.
            DecodeState::Ready => {}
        }
        Ok(self.state)
    }

    /// Decoded payload so far; the complete packet payload once `Ready`.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the decoder, yielding the accumulated payload.
    pub fn into_payload(self) -> Bytes {
        self.payload.freeze()
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet;

    fn feed_all(decoder: &mut PacketDecoder, bytes: &[u8]) -> Result<DecodeState, PacketError> {
        let mut state = decoder.state();
        for &b in bytes {
            state = decoder.feed(b)?;
        }
        Ok(state)
    }

    #[test]
    fn test_state_walk() {
        let packet = packet::encode(&[0x81, 0x01]).unwrap();
        let mut decoder = PacketDecoder::new();

        assert_eq!(decoder.feed(packet[0]).unwrap(), DecodeState::AwaitingLength);
        assert_eq!(decoder.feed(packet[1]).unwrap(), DecodeState::AwaitingData);
        assert_eq!(decoder.feed(packet[2]).unwrap(), DecodeState::AwaitingData);
        assert_eq!(decoder.feed(packet[3]).unwrap(), DecodeState::AwaitingCrc);
        assert_eq!(decoder.feed(packet[4]).unwrap(), DecodeState::Ready);
        assert_eq!(decoder.payload(), &[0x81, 0x01]);
    }

    #[test]
    fn test_empty_payload_skips_data_state() {
        let mut decoder = PacketDecoder::new();
        decoder.feed(crate::protocol::PACKET_HEADER).unwrap();
        assert_eq!(decoder.feed(0).unwrap(), DecodeState::AwaitingCrc);
        assert_eq!(decoder.feed(crc8(&[])).unwrap(), DecodeState::Ready);
        assert!(decoder.into_payload().is_empty());
    }

    #[test]
    fn test_header_error_keeps_scanning() {
        let packet = packet::encode(&[0x81]).unwrap();
        let mut decoder = PacketDecoder::new();

        for garbage in [0x00u8, 0xFF, 0x42] {
            assert_eq!(
                decoder.feed(garbage),
                Err(PacketError::BadHeader { found: garbage })
            );
            assert_eq!(decoder.state(), DecodeState::AwaitingHeader);
        }

        assert_eq!(feed_all(&mut decoder, &packet).unwrap(), DecodeState::Ready);
        assert_eq!(decoder.payload(), &[0x81]);
    }

    #[test]
    fn test_length_out_of_range() {
        let mut decoder = PacketDecoder::new();
        decoder.feed(crate::protocol::PACKET_HEADER).unwrap();
        assert_eq!(
            decoder.feed(33),
            Err(PacketError::LengthOutOfRange { len: 33 })
        );
    }

    #[test]
    fn test_crc_error() {
        let mut packet = packet::encode(&[0x81, 0x07]).unwrap().to_vec();
        let last = packet.len() - 1;
        packet[last] ^= 0x01;

        let mut decoder = PacketDecoder::new();
        let err = feed_all(&mut decoder, &packet).unwrap_err();
        assert!(matches!(err, PacketError::CrcMismatch { .. }));
    }

    #[test]
    fn test_streaming_matches_block_decode() {
        for len in 0..=MAX_PAYLOAD_LENGTH {
            let payload: Vec<u8> = (0..len).map(|i| (i * 13 + 1) as u8).collect();
            let packet = packet::encode(&payload).unwrap();

            let mut decoder = PacketDecoder::new();
            assert_eq!(feed_all(&mut decoder, &packet).unwrap(), DecodeState::Ready);
            assert_eq!(decoder.into_payload(), payload);
        }
    }
}
