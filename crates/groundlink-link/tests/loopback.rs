//! End-to-end tests driving the link against a loopback test stand.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use groundlink_link::wire::{codec, ChannelId, MessageType, PI_PROFILE};
use groundlink_link::{
    CalibratedSample, ConnectionState, LinkConfig, TelemetryLink, TransportMode,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A link configured for fast test turnaround, always speaking the Pi
/// profile regardless of the peer address.
fn pi_config() -> LinkConfig {
    LinkConfig {
        connect_timeout: Duration::from_secs(1),
        read_timeout: Duration::from_millis(10),
        profile_selector: Arc::new(|_| &PI_PROFILE),
        ..LinkConfig::default()
    }
}

fn start_stand() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("loopback listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");
    (listener, addr)
}

fn connect(link: &TelemetryLink, addr: SocketAddr) {
    link.connect(addr.ip(), addr.port())
        .expect("connect to loopback stand should succeed");
}

/// Encode one payload frame in the Pi layout.
fn payload_frame(msg_type: MessageType, records: &[(u64, u64)]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    codec::encode_header(msg_type, (records.len() * 16) as u32, &PI_PROFILE, &mut buf);
    for &(raw, timestamp) in records {
        buf.extend_from_slice(&raw.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
    }
    buf.to_vec()
}

fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn collect_samples(link: &TelemetryLink, count: usize) -> Vec<CalibratedSample> {
    let mut samples = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(2);
    while samples.len() < count && Instant::now() < deadline {
        samples.extend(link.poll_samples());
        std::thread::sleep(Duration::from_millis(5));
    }
    samples
}

/// Give the worker a moment to drain queued control messages (calibration
/// registrations) before the stand starts talking.
fn settle() {
    std::thread::sleep(Duration::from_millis(50));
}

#[test]
fn lc1_payload_is_decoded_and_calibrated() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (mut stand, _) = listener.accept().unwrap();
    link.register_calibration(ChannelId::Lc1, 0.00939, 0.0);
    settle();

    // Header: type=10 (LC1 payload), length=16; one record raw=1000 ts=42.
    stand
        .write_all(&[0x0A, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00])
        .unwrap();
    let mut record = Vec::new();
    record.extend_from_slice(&1000u64.to_le_bytes());
    record.extend_from_slice(&42u64.to_le_bytes());
    stand.write_all(&record).unwrap();

    let samples = collect_samples(&link, 1);
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].channel, ChannelId::Lc1);
    assert!((samples[0].value - 9.39).abs() < 1e-9);
    assert_eq!(samples[0].timestamp, 42);
}

#[test]
fn uncalibrated_channel_passes_through_zero() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (mut stand, _) = listener.accept().unwrap();

    stand
        .write_all(&payload_frame(MessageType::Tc2Send, &[(9999, 7)]))
        .unwrap();

    let samples = collect_samples(&link, 1);
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].channel, ChannelId::Tc2);
    assert_eq!(samples[0].value, 0.0);
    assert_eq!(samples[0].timestamp, 7);
}

#[test]
fn samples_arrive_in_decode_order() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (mut stand, _) = listener.accept().unwrap();

    // Three frames, nine records, strictly increasing timestamps.
    stand
        .write_all(&payload_frame(
            MessageType::Lc1Send,
            &[(1, 1), (2, 2), (3, 3)],
        ))
        .unwrap();
    stand
        .write_all(&payload_frame(MessageType::Lc1Send, &[(4, 4), (5, 5)]))
        .unwrap();
    stand
        .write_all(&payload_frame(
            MessageType::Lc1Send,
            &[(6, 6), (7, 7), (8, 8), (9, 9)],
        ))
        .unwrap();

    let samples = collect_samples(&link, 9);
    assert_eq!(samples.len(), 9);
    let timestamps: Vec<u64> = samples.iter().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
}

#[test]
fn misaligned_payload_is_dropped_without_teardown() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (mut stand, _) = listener.accept().unwrap();

    // Header declares 17 payload bytes against the 16-byte record size.
    let mut bad = BytesMut::new();
    codec::encode_header(MessageType::Lc1Send, 17, &PI_PROFILE, &mut bad);
    bad.extend_from_slice(&[0u8; 17]);
    stand.write_all(&bad).unwrap();

    stand
        .write_all(&payload_frame(MessageType::Lc1Send, &[(5, 99)]))
        .unwrap();

    // Zero samples from the bad frame; the session survives and the good
    // frame still decodes.
    let samples = collect_samples(&link, 1);
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].timestamp, 99);
    assert_eq!(link.state(), ConnectionState::Connected);

    let log = link.poll_log();
    assert!(
        log.iter().any(|line| line.contains("malformed")),
        "dropped frame should be logged: {log:?}"
    );
}

#[test]
fn unknown_type_is_dropped_and_session_survives() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (mut stand, _) = listener.accept().unwrap();

    let mut bad = vec![0xEE, 0, 0, 0, 16, 0, 0, 0];
    bad.extend_from_slice(&[0u8; 16]);
    stand.write_all(&bad).unwrap();
    stand
        .write_all(&payload_frame(MessageType::PtCombSend, &[(11, 3)]))
        .unwrap();

    let samples = collect_samples(&link, 1);
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].channel, ChannelId::PtComb);
    assert_eq!(link.state(), ConnectionState::Connected);
}

#[test]
fn ack_frames_are_ignored() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (mut stand, _) = listener.accept().unwrap();

    let mut ack = BytesMut::new();
    codec::encode_header(MessageType::AckValue, 0, &PI_PROFILE, &mut ack);
    stand.write_all(&ack).unwrap();
    stand
        .write_all(&payload_frame(MessageType::LcMainSend, &[(1, 1)]))
        .unwrap();

    let samples = collect_samples(&link, 1);
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].channel, ChannelId::LcMain);
}

#[test]
fn text_frames_reach_the_log() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (mut stand, _) = listener.accept().unwrap();

    let frame = codec::encode_text("stand ready", &PI_PROFILE).unwrap();
    stand.write_all(&frame).unwrap();

    assert!(wait_until(
        || link.poll_log().iter().any(|line| line == "stand ready"),
        Duration::from_secs(2)
    ));
}

#[test]
fn command_and_text_frames_reach_the_stand() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (mut stand, _) = listener.accept().unwrap();

    assert!(link.send_command(MessageType::SetValve));
    let mut header = [0u8; 8];
    stand.read_exact(&mut header).unwrap();
    assert_eq!(header, [5, 0, 0, 0, 0, 0, 0, 0]);

    assert!(link.send_text("abc"));
    let mut frame = [0u8; 11];
    stand.read_exact(&mut frame).unwrap();
    assert_eq!(&frame[..8], &[3, 0, 0, 0, 3, 0, 0, 0]);
    assert_eq!(&frame[8..], b"abc");
}

#[test]
fn peer_close_transitions_to_idle() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (stand, _) = listener.accept().unwrap();
    assert_eq!(link.state(), ConnectionState::Connected);

    drop(stand);
    assert!(wait_until(
        || link.state() == ConnectionState::Idle,
        Duration::from_secs(2)
    ));

    // Sends now fail silently.
    assert!(!link.send_command(MessageType::SetValve));
}

#[test]
fn reconnect_to_same_endpoint_is_a_noop() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (_stand, _) = listener.accept().unwrap();

    connect(&link, addr);
    assert_eq!(link.state(), ConnectionState::Connected);

    listener.set_nonblocking(true).unwrap();
    assert_eq!(
        listener.accept().unwrap_err().kind(),
        ErrorKind::WouldBlock,
        "no socket churn on same-endpoint reconnect"
    );
}

#[test]
fn disconnect_is_idempotent_and_reconnect_works() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (_stand, _) = listener.accept().unwrap();

    link.disconnect();
    link.disconnect();
    assert!(wait_until(
        || link.state() == ConnectionState::Idle,
        Duration::from_secs(2)
    ));

    connect(&link, addr);
    let (_stand2, _) = listener.accept().unwrap();
    assert_eq!(link.state(), ConnectionState::Connected);
}

#[test]
fn frames_split_across_tcp_segments_are_reassembled() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (mut stand, _) = listener.accept().unwrap();

    let frame = payload_frame(MessageType::PtInjeSend, &[(123, 456)]);
    for byte in frame {
        stand.write_all(&[byte]).unwrap();
        stand.flush().unwrap();
        std::thread::sleep(Duration::from_millis(1));
    }

    let samples = collect_samples(&link, 1);
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].channel, ChannelId::PtInje);
    assert_eq!(samples[0].timestamp, 456);
}

#[test]
fn udp_data_mode_receives_datagrams() {
    init_tracing();
    let (listener, addr) = start_stand();
    let config = LinkConfig {
        transport: TransportMode::TcpWithUdpData,
        ..pi_config()
    };
    let link = TelemetryLink::new(config).unwrap();

    connect(&link, addr);
    let (mut stand, _) = listener.accept().unwrap();

    // Data arrives on the datagram socket bound to the connect port.
    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    let frame = payload_frame(MessageType::Lc3Send, &[(77, 88)]);
    sender
        .send_to(&frame, ("127.0.0.1", addr.port()))
        .unwrap();

    let samples = collect_samples(&link, 1);
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].channel, ChannelId::Lc3);
    assert_eq!(samples[0].timestamp, 88);

    // The TCP side still carries commands upstream.
    assert!(link.send_command(MessageType::LeakCheck));
    let mut header = [0u8; 8];
    stand.read_exact(&mut header).unwrap();
    assert_eq!(header[0], 23);
}

#[test]
fn large_datagram_frames_arrive_whole() {
    init_tracing();
    let (listener, addr) = start_stand();
    let config = LinkConfig {
        transport: TransportMode::TcpWithUdpData,
        ..pi_config()
    };
    let link = TelemetryLink::new(config).unwrap();

    connect(&link, addr);
    let (_stand, _) = listener.accept().unwrap();

    // One burst frame well past any per-read chunk size. A datagram is
    // delivered whole or not at all, so every record must come through.
    let records: Vec<(u64, u64)> = (0..300).map(|i| (i as u64, i as u64)).collect();
    let big = payload_frame(MessageType::Lc1Send, &records);
    assert!(big.len() > 4096);

    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    sender.send_to(&big, ("127.0.0.1", addr.port())).unwrap();
    let small = payload_frame(MessageType::Tc1Send, &[(1, 999)]);
    sender.send_to(&small, ("127.0.0.1", addr.port())).unwrap();

    let samples = collect_samples(&link, 301);
    assert_eq!(samples.len(), 301);
    assert!(samples[..300]
        .iter()
        .enumerate()
        .all(|(i, s)| s.channel == ChannelId::Lc1 && s.timestamp == i as u64));
    assert_eq!(samples[300].channel, ChannelId::Tc1);
    assert_eq!(samples[300].timestamp, 999);
    assert_eq!(link.state(), ConnectionState::Connected);
}

#[test]
fn calibration_survives_reconnect_until_cleared() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    link.register_calibration(ChannelId::Lc2, 2.0, 1.0);
    connect(&link, addr);
    let (mut stand, _) = listener.accept().unwrap();
    settle();

    stand
        .write_all(&payload_frame(MessageType::Lc2Send, &[(10, 1)]))
        .unwrap();
    let samples = collect_samples(&link, 1);
    assert_eq!(samples[0].value, 21.0);

    link.disconnect();
    assert!(wait_until(
        || link.state() == ConnectionState::Idle,
        Duration::from_secs(2)
    ));

    connect(&link, addr);
    let (mut stand2, _) = listener.accept().unwrap();
    link.clear_calibration();
    settle();

    stand2
        .write_all(&payload_frame(MessageType::Lc2Send, &[(10, 2)]))
        .unwrap();
    let samples = collect_samples(&link, 1);
    assert_eq!(samples[0].value, 0.0, "cleared calibration falls back to sentinel");
}

#[test]
fn stream_desync_disconnects() {
    init_tracing();
    let (listener, addr) = start_stand();
    let link = TelemetryLink::new(pi_config()).unwrap();

    connect(&link, addr);
    let (mut stand, _) = listener.accept().unwrap();

    // A length far past the payload cap means framing is gone for good.
    let mut bad = BytesMut::new();
    codec::encode_header(MessageType::Lc1Send, u32::MAX, &PI_PROFILE, &mut bad);
    stand.write_all(&bad).unwrap();

    assert!(wait_until(
        || link.state() == ConnectionState::Idle,
        Duration::from_secs(2)
    ));
}
