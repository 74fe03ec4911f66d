//! Packet codec
//!
//! Wraps and unwraps a payload in the protocol framing. The block decoder
//! here expects a complete packet; for byte-at-a-time reception from a
//! stream use [`super::PacketDecoder`].

use super::{crc8, PacketError, MAX_PAYLOAD_LENGTH, MIN_PACKET_LENGTH, PACKET_HEADER};
use bytes::{BufMut, Bytes, BytesMut};

/// Frame a payload into a complete packet.
///
/// Fails with [`PacketError::PayloadTooLong`] when the payload exceeds the
/// 32-byte budget.
pub fn encode(payload: &[u8]) -> Result<Bytes, PacketError> {
    if payload.len() > MAX_PAYLOAD_LENGTH {
        return Err(PacketError::PayloadTooLong { len: payload.len() });
    }

    let mut packet = BytesMut::with_capacity(payload.len() + 3);
    packet.put_u8(PACKET_HEADER);
    packet.put_u8(payload.len() as u8);
    packet.put_slice(payload);
    packet.put_u8(crc8(payload));
    Ok(packet.freeze())
}

/// Unwrap a complete packet, validating header, length field, and CRC.
///
/// Returns the payload slice on success.
pub fn decode(packet: &[u8]) -> Result<&[u8], PacketError> {
    if packet.len() < MIN_PACKET_LENGTH {
        return Err(PacketError::PacketTooShort { len: packet.len() });
    }
    if packet[0] != PACKET_HEADER {
        return Err(PacketError::BadHeader { found: packet[0] });
    }

    let declared = packet[1] as usize;
    let actual = packet.len() - 3;
    if declared != actual {
        return Err(PacketError::LengthMismatch { declared, actual });
    }

    let payload = &packet[2..packet.len() - 1];
    let computed = crc8(payload);
    let found = packet[packet.len() - 1];
    if computed != found {
        return Err(PacketError::CrcMismatch { computed, found });
    }

    Ok(payload)
}
