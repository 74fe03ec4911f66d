//! Transport/retry engine
//!
//! [`Driver::send`] drives one command to completion: frame, write, read
//! back through a fresh [`PacketDecoder`], interpret the status byte, and
//! retransmit on transient failure. Decode errors and retryable device
//! codes are recovered transparently up to the retry budget; everything
//! else surfaces as a typed [`Error`]. One driver owns one transport and
//! issues strictly sequential commands.

mod ops;

pub use ops::HOST_API_VERSION;

use crate::commands::host::SdCode;
use crate::commands::{RequestError, ResponseError};
use crate::protocol::{packet, DecodeState, PacketDecoder, PacketError, ResponseCode};
use crate::transport::{Transport, TransportError};
use bytes::Bytes;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Write attempts per command before giving up
pub const MAX_RETRIES: u32 = 5;

/// Overall deadline for one response, measured from the write
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Pause after the device reports a full action buffer
pub const OVERFLOW_BACKOFF: Duration = Duration::from_millis(200);

/// Ceiling on overflow backoffs within one `send` (~60 s) so a device that
/// never drains its queue cannot block the host forever
pub const MAX_OVERFLOW_WAITS: u32 = 300;

/// Why a single attempt failed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptError {
    /// A non-header byte arrived where the header was expected
    #[error("bad header byte")]
    BadHeader,
    /// The length field was out of range or inconsistent
    #[error("bad length field")]
    BadLength,
    /// The response packet failed its CRC check
    #[error("crc mismatch")]
    CrcMismatch,
    /// No complete response within the deadline
    #[error("response timeout")]
    Timeout,
    /// The device reported a generic failure
    #[error("device reported a generic error")]
    DeviceError,
    /// The device saw a CRC failure on our packet
    #[error("device reported a packet crc mismatch")]
    DeviceCrcMismatch,
    /// The device's action buffer was full
    #[error("device action buffer overflow")]
    BufferOverflow,
}

impl AttemptError {
    fn from_packet_error(err: PacketError) -> Self {
        match err {
            PacketError::BadHeader { .. } => Self::BadHeader,
            PacketError::CrcMismatch { .. } => Self::CrcMismatch,
            PacketError::PayloadTooLong { .. }
            | PacketError::PacketTooShort { .. }
            | PacketError::LengthOutOfRange { .. }
            | PacketError::LengthMismatch { .. } => Self::BadLength,
        }
    }
}

/// Driver error types
#[derive(Error, Debug)]
pub enum Error {
    /// The retry budget was exhausted by transient failures
    #[error("transmission failed after {attempts} attempt(s): {history:?}")]
    Transmission {
        /// Budget-consuming attempts made
        attempts: u32,
        /// Failure kind of every attempt, in order
        history: Vec<AttemptError>,
    },

    /// The device cancelled the active build
    #[error("build cancelled by the device")]
    BuildCancelled,

    /// A downstream (tool) bus operation timed out
    #[error("device reported a downstream timeout")]
    DownstreamTimeout,

    /// The device could not acquire its tool lock
    #[error("device reported a tool lock timeout")]
    ToolLockTimeout,

    /// The response status byte is outside the protocol
    #[error("unrecognized response code {0:#04x}")]
    UnknownResponseCode(u8),

    /// The response payload carried no status byte
    #[error("response payload missing the status byte")]
    EmptyResponse,

    /// An SD card operation failed on the device
    #[error("sd card error: {0}")]
    SdCard(SdCode),

    /// Outgoing payload could not be framed
    #[error(transparent)]
    Packet(#[from] PacketError),

    /// Request was malformed before any I/O happened
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Response was well-formed on the wire but semantically invalid
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// The transport itself failed; not retryable
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Retry and backoff counters for one driver's lifetime
///
/// Diagnostics only; never consulted for control flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverStats {
    /// Total retransmissions across all commands
    pub retries: u64,
    /// Total buffer-overflow backoffs across all commands
    pub overflows: u64,
}

enum AttemptFailure {
    Retry(AttemptError),
    Transport(TransportError),
}

impl From<TransportError> for AttemptFailure {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

/// Reliable command channel over one transport
#[derive(Debug)]
pub struct Driver<T: Transport> {
    transport: T,
    timeout: Duration,
    max_retries: u32,
    stats: DriverStats,
}

impl<T: Transport> Driver<T> {
    /// Take exclusive ownership of `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            timeout: RESPONSE_TIMEOUT,
            max_retries: MAX_RETRIES,
            stats: DriverStats::default(),
        }
    }

    /// Override the per-attempt response deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Lifetime retry/backoff counters.
    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Give the transport back, consuming the driver.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Close the underlying transport.
    pub fn close(&mut self) -> Result<(), Error> {
        self.transport.close()?;
        Ok(())
    }

    /// Send one command payload and return the response payload with its
    /// status byte stripped.
    ///
    /// Transient failures (malformed responses, timeouts, retryable device
    /// codes) are recovered transparently; exhausting the budget yields
    /// [`Error::Transmission`]. Everything else is surfaced as-is.
    pub fn send(&mut self, payload: &[u8]) -> Result<Bytes, Error> {
        let packet = packet::encode(payload)?;

        let mut history = Vec::new();
        let mut attempts: u32 = 0;
        let mut overflow_waits: u32 = 0;

        loop {
            attempts += 1;

            let failure = match self.attempt(&packet) {
                Ok(response) => {
                    let Some(&status) = response.first() else {
                        return Err(Error::EmptyResponse);
                    };
                    match ResponseCode::from_byte(status) {
                        Some(ResponseCode::Success) => {
                            trace!(rx = %hex::encode(&response), "command acknowledged");
                            return Ok(response.slice(1..));
                        }
                        Some(ResponseCode::GenericError) => AttemptError::DeviceError,
                        Some(ResponseCode::CrcMismatch) => AttemptError::DeviceCrcMismatch,
                        Some(ResponseCode::ActionBufferOverflow) => {
                            self.stats.overflows += 1;
                            overflow_waits += 1;
                            if overflow_waits > MAX_OVERFLOW_WAITS {
                                history.push(AttemptError::BufferOverflow);
                                warn!(waits = overflow_waits, "device buffer never drained");
                                return Err(Error::Transmission { attempts, history });
                            }
                            // Backoff instead of retry: the packet arrived
                            // intact, the device just has no room for it.
                            // Does not consume the retry budget.
                            attempts -= 1;
                            debug!(waits = overflow_waits, "buffer full, backing off");
                            thread::sleep(OVERFLOW_BACKOFF);
                            continue;
                        }
                        Some(ResponseCode::DownstreamTimeout) => {
                            return Err(Error::DownstreamTimeout)
                        }
                        Some(ResponseCode::ToolLockTimeout) => return Err(Error::ToolLockTimeout),
                        Some(ResponseCode::CancelBuild) => return Err(Error::BuildCancelled),
                        None => return Err(Error::UnknownResponseCode(status)),
                    }
                }
                Err(AttemptFailure::Transport(e)) => return Err(Error::Transport(e)),
                Err(AttemptFailure::Retry(kind)) => kind,
            };

            self.stats.retries += 1;
            history.push(failure);
            debug!(attempt = attempts, error = %failure, "transient failure");

            if attempts >= self.max_retries {
                warn!(attempts, ?history, "retry budget exhausted");
                return Err(Error::Transmission { attempts, history });
            }
        }
    }

    /// One write/read cycle against a fresh decoder.
    fn attempt(&mut self, packet: &[u8]) -> Result<Bytes, AttemptFailure> {
        let mut decoder = PacketDecoder::new();

        self.transport.write(packet)?;
        self.transport.flush()?;
        trace!(tx = %hex::encode(packet), "packet written");

        let deadline = Instant::now() + self.timeout;
        let mut byte = [0u8; 1];

        loop {
            if Instant::now() >= deadline {
                return Err(AttemptFailure::Retry(AttemptError::Timeout));
            }
            if self.transport.read(&mut byte)? == 0 {
                continue;
            }
            match decoder.feed(byte[0]) {
                Ok(DecodeState::Ready) => return Ok(decoder.into_payload()),
                Ok(_) => {}
                Err(e) => {
                    return Err(AttemptFailure::Retry(AttemptError::from_packet_error(e)))
                }
            }
        }
    }
}
