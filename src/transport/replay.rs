//! File-capture transport
//!
//! Replays a recorded device byte stream and records every host write, for
//! decoding captured sessions offline and for deterministic tests. Reads
//! return 0 at end of stream, which the driver surfaces as a response
//! timeout.

use super::{Transport, TransportError};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Transport backed by a recorded byte stream
#[derive(Debug)]
pub struct ReplayTransport {
    stream: Vec<u8>,
    cursor: usize,
    sent: Vec<u8>,
    record: Option<File>,
    closed: bool,
}

impl ReplayTransport {
    /// Replay the device byte stream held in `stream`.
    pub fn from_bytes(stream: Vec<u8>) -> Self {
        Self {
            stream,
            cursor: 0,
            sent: Vec::new(),
            record: None,
            closed: false,
        }
    }

    /// Replay a capture file.
    pub fn open(path: &Path) -> Result<Self, TransportError> {
        let mut stream = Vec::new();
        File::open(path)?.read_to_end(&mut stream)?;
        Ok(Self::from_bytes(stream))
    }

    /// Additionally append every host write to a capture file.
    pub fn recording_to(mut self, path: &Path) -> Result<Self, TransportError> {
        self.record = Some(File::create(path)?);
        Ok(self)
    }

    /// Every byte the host has written so far.
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Bytes of the recorded stream not yet replayed.
    pub fn remaining(&self) -> usize {
        self.stream.len() - self.cursor
    }
}

impl Transport for ReplayTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sent.extend_from_slice(bytes);
        if let Some(file) = self.record.as_mut() {
            file.write_all(bytes)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if let Some(file) = self.record.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let n = buf.len().min(self.stream.len() - self.cursor);
        buf[..n].copy_from_slice(&self.stream[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}
