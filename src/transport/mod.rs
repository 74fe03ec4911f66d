//! Byte-stream transports
//!
//! A transport is the raw, blocking byte pipe the driver owns exclusively:
//! a serial port in normal operation, or a capture file for offline work
//! and tests. One transport carries one in-flight command at a time; there
//! is no locking because there is no sharing.

mod replay;
mod serial;

pub use replay::ReplayTransport;
pub use serial::{SerialConfig, SerialFlowControl, SerialParity, SerialTransport};

use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Opening the underlying device failed
    #[error("failed to open {port}: {source}")]
    Open {
        /// Device path or port name
        port: String,
        /// Underlying serial error
        source: serialport::Error,
    },

    /// I/O error while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been closed
    #[error("transport closed")]
    Closed,
}

/// Blocking byte-stream transport owned by one driver instance
pub trait Transport: Send {
    /// Write all of `bytes`.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Flush buffered output to the device.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Read up to `buf.len()` bytes.
    ///
    /// Returns 0 when the per-read deadline passes with nothing available;
    /// the caller owns the overall response timeout.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Close the transport; subsequent operations fail with
    /// [`TransportError::Closed`].
    fn close(&mut self) -> Result<(), TransportError>;
}
