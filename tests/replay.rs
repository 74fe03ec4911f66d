//! File-capture transport: replaying recorded responses and recording the
//! host side of a session.

mod common;

use fablink::protocol::packet;
use fablink::transport::ReplayTransport;
use fablink::{Driver, Error};
use std::time::Duration;

fn response(status: u8, body: &[u8]) -> Vec<u8> {
    let mut payload = vec![status];
    payload.extend_from_slice(body);
    packet::encode(&payload).unwrap().to_vec()
}

#[test]
fn replayed_session_drives_the_full_stack() {
    common::init_tracing();

    // A recorded device stream: version response, then an ack.
    let mut stream = response(0x81, &[0x6A, 0x00]);
    stream.extend(response(0x81, &[]));

    let transport = ReplayTransport::from_bytes(stream);
    let mut driver = Driver::new(transport).with_timeout(Duration::from_millis(20));

    assert_eq!(driver.get_version().unwrap(), 106);
    driver.clear_buffer().unwrap();

    // The host side of the exchange was recorded along the way.
    let transport = driver.into_transport();
    let sent = transport.sent();
    let first = packet::decode(&sent[..sent[1] as usize + 3]).unwrap();
    assert_eq!(first, &[0x00, 100, 0]);
}

#[test]
fn exhausted_capture_surfaces_as_timeouts() {
    let transport = ReplayTransport::from_bytes(Vec::new());
    let mut driver = Driver::new(transport).with_timeout(Duration::from_millis(10));

    assert!(matches!(
        driver.send(&[0x01]).unwrap_err(),
        Error::Transmission { .. }
    ));
}

#[test]
fn capture_files_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let device_side = dir.path().join("device.bin");
    let host_side = dir.path().join("host.bin");

    std::fs::write(&device_side, response(0x81, &[0x2A])).unwrap();

    let transport = ReplayTransport::open(&device_side)
        .unwrap()
        .recording_to(&host_side)
        .unwrap();
    let mut driver = Driver::new(transport).with_timeout(Duration::from_millis(20));

    let reply = driver.send(&[0x0B]).unwrap();
    assert_eq!(reply.as_ref(), &[0x2A]);
    driver.close().unwrap();

    // The recorded host stream is the framed command we sent.
    let recorded = std::fs::read(&host_side).unwrap();
    assert_eq!(packet::decode(&recorded).unwrap(), &[0x0B]);
}
