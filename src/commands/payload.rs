//! Payload field encoding and decoding
//!
//! [`PayloadWriter`] assembles request payloads field by field and enforces
//! the packet payload budget before anything touches the transport;
//! [`PayloadReader`] walks a response payload and fails on truncation or a
//! missing string terminator.

use crate::axes::AxisSet;
use crate::protocol::MAX_PAYLOAD_LENGTH;
use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Request construction errors; all fail fast, before any I/O
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// Tool index outside the addressable range
    #[error("tool index {0} outside the valid range 0..=127")]
    ToolIndexOutOfRange(u8),

    /// Assembled payload would exceed the packet budget
    #[error("request payload of {len} bytes exceeds the {MAX_PAYLOAD_LENGTH}-byte budget")]
    PayloadOverflow {
        /// Assembled payload length
        len: usize,
    },

    /// EEPROM data slice too long for a single message
    #[error("eeprom access of {len} bytes exceeds the per-message limit of {limit}")]
    EepromChunkTooLong {
        /// Requested data length
        len: usize,
        /// Per-message limit for this direction
        limit: usize,
    },
}

/// Response interpretation errors; fatal, never retried
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseError {
    /// Fewer bytes present than the field layout requires
    #[error("response truncated: needed {needed} more byte(s), {remaining} left")]
    Truncated {
        /// Bytes the next field needs
        needed: usize,
        /// Bytes actually remaining
        remaining: usize,
    },

    /// A string field ran to the end of the payload without its terminator
    #[error("string field missing its 0 terminator")]
    UnterminatedString,

    /// Bytes left over after all fields were read
    #[error("response carries {count} unexpected trailing byte(s)")]
    TrailingBytes {
        /// Number of excess bytes
        count: usize,
    },

    /// EEPROM write echoed a different length than was sent
    #[error("eeprom write echoed {echoed} byte(s), wrote {wrote}")]
    EepromEchoMismatch {
        /// Bytes written in the request
        wrote: usize,
        /// Bytes the device acknowledged
        echoed: usize,
    },

    /// Extended stop reported a failure code
    #[error("extended stop reported failure code {0:#04x}")]
    ExtendedStopFailed(u8),
}

/// Builder for one request payload
#[derive(Debug)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    /// Start a payload with the given opcode byte.
    pub fn new(opcode: u8) -> Self {
        let mut buf = BytesMut::with_capacity(MAX_PAYLOAD_LENGTH);
        buf.put_u8(opcode);
        Self { buf }
    }

    /// Append an unsigned byte.
    pub fn u8(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    /// Append an unsigned 16-bit integer, little-endian.
    pub fn u16(mut self, value: u16) -> Self {
        self.buf.put_u16_le(value);
        self
    }

    /// Append a signed 16-bit integer, little-endian.
    pub fn i16(mut self, value: i16) -> Self {
        self.buf.put_i16_le(value);
        self
    }

    /// Append an unsigned 32-bit integer, little-endian.
    pub fn u32(mut self, value: u32) -> Self {
        self.buf.put_u32_le(value);
        self
    }

    /// Append a signed 32-bit integer, little-endian.
    pub fn i32(mut self, value: i32) -> Self {
        self.buf.put_i32_le(value);
        self
    }

    /// Append an axis set as its one-byte bitfield.
    pub fn axes(self, axes: AxisSet) -> Self {
        self.u8(axes.bits())
    }

    /// Append a string byte-for-byte plus its 0 terminator.
    pub fn str(mut self, s: &str) -> Self {
        self.buf.put_slice(s.as_bytes());
        self.buf.put_u8(0);
        self
    }

    /// Append raw bytes.
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.buf.put_slice(data);
        self
    }

    /// Finish the payload, enforcing the packet budget.
    pub fn finish(self) -> Result<Bytes, RequestError> {
        if self.buf.len() > MAX_PAYLOAD_LENGTH {
            return Err(RequestError::PayloadOverflow { len: self.buf.len() });
        }
        Ok(self.buf.freeze())
    }
}

/// Cursor over one response payload (status byte already stripped)
#[derive(Debug)]
pub struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    /// Wrap a response payload.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ResponseError> {
        let remaining = self.data.len() - self.pos;
        if remaining < n {
            return Err(ResponseError::Truncated {
                needed: n,
                remaining,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read an unsigned byte.
    pub fn u8(&mut self) -> Result<u8, ResponseError> {
        Ok(self.take(1)?[0])
    }

    /// Read an unsigned 16-bit integer, little-endian.
    pub fn u16(&mut self) -> Result<u16, ResponseError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a signed 16-bit integer, little-endian.
    pub fn i16(&mut self) -> Result<i16, ResponseError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    /// Read an unsigned 32-bit integer, little-endian.
    pub fn u32(&mut self) -> Result<u32, ResponseError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a signed 32-bit integer, little-endian.
    pub fn i32(&mut self) -> Result<i32, ResponseError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a 0-terminated string.
    ///
    /// Fails with [`ResponseError::UnterminatedString`] when no terminator
    /// appears in the remaining bytes. Non-UTF-8 bytes are replaced.
    pub fn str(&mut self) -> Result<String, ResponseError> {
        let rest = &self.data[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ResponseError::UnterminatedString)?;
        self.pos += nul + 1;
        Ok(String::from_utf8_lossy(&rest[..nul]).into_owned())
    }

    /// Remaining unread bytes, consuming them.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    /// Assert that every byte has been consumed.
    pub fn finish(self) -> Result<(), ResponseError> {
        let count = self.data.len() - self.pos;
        if count > 0 {
            return Err(ResponseError::TrailingBytes { count });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axes::{Axis, AxisSet};

    #[test]
    fn test_writer_little_endian() {
        let payload = PayloadWriter::new(0x01)
            .u16(0x0203)
            .i32(-2)
            .finish()
            .unwrap();
        assert_eq!(
            payload.as_ref(),
            &[0x01, 0x03, 0x02, 0xFE, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_writer_string_terminated() {
        let payload = PayloadWriter::new(0x10).str("ab").finish().unwrap();
        assert_eq!(payload.as_ref(), &[0x10, b'a', b'b', 0x00]);
    }

    #[test]
    fn test_writer_axes_bitfield() {
        let axes = AxisSet::new().with(Axis::Y).with(Axis::A);
        let payload = PayloadWriter::new(0x00).axes(axes).finish().unwrap();
        assert_eq!(payload.as_ref(), &[0x00, 0b0000_1010]);
    }

    #[test]
    fn test_writer_budget_enforced() {
        let result = PayloadWriter::new(0x00).bytes(&[0u8; 32]).finish();
        assert_eq!(result, Err(RequestError::PayloadOverflow { len: 33 }));
    }

    #[test]
    fn test_reader_fields() {
        let data = [0x07, 0x34, 0x12, b'h', b'i', 0x00, 0x2A];
        let mut reader = PayloadReader::new(&data);
        assert_eq!(reader.u8().unwrap(), 0x07);
        assert_eq!(reader.u16().unwrap(), 0x1234);
        assert_eq!(reader.str().unwrap(), "hi");
        assert_eq!(reader.u8().unwrap(), 0x2A);
        reader.finish().unwrap();
    }

    #[test]
    fn test_reader_truncation() {
        let mut reader = PayloadReader::new(&[0x01]);
        assert_eq!(
            reader.u32(),
            Err(ResponseError::Truncated {
                needed: 4,
                remaining: 1
            })
        );
    }

    #[test]
    fn test_reader_unterminated_string() {
        let mut reader = PayloadReader::new(b"abc");
        assert_eq!(reader.str(), Err(ResponseError::UnterminatedString));
    }

    #[test]
    fn test_reader_trailing_bytes() {
        let mut reader = PayloadReader::new(&[0x01, 0x02]);
        reader.u8().unwrap();
        assert_eq!(
            reader.finish(),
            Err(ResponseError::TrailingBytes { count: 1 })
        );
    }
}
