//! Shared test harness: a scripted in-memory transport
//!
//! Serves a pre-queued device byte stream to the driver and records every
//! packet the host writes. Handles are cheap clones over shared state so a
//! test can keep inspecting while the driver owns the transport.

use fablink::protocol::packet;
use fablink::transport::{Transport, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Opt-in test logging: `RUST_LOG=fablink=trace cargo test -- --nocapture`
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory transport driven by a test script
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    reads: Arc<Mutex<VecDeque<u8>>>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a well-formed response packet with the given status byte and
    /// body.
    pub fn respond(&self, status: u8, body: &[u8]) {
        let mut payload = vec![status];
        payload.extend_from_slice(body);
        let packet = packet::encode(&payload).expect("test response payload too long");
        self.reads.lock().unwrap().extend(packet.iter());
    }

    /// Queue raw bytes, valid or not.
    pub fn queue_raw(&self, bytes: &[u8]) {
        self.reads.lock().unwrap().extend(bytes.iter());
    }

    /// Number of write calls the host has made.
    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    /// Every packet written so far, decoded back to command payloads.
    pub fn sent_commands(&self) -> Vec<Vec<u8>> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|w| packet::decode(w).expect("host wrote a malformed packet").to_vec())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.writes.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut reads = self.reads.lock().unwrap();
        let mut n = 0;
        while n < buf.len() {
            match reads.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
