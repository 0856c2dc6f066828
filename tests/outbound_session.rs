//! Outbound session tests over loopback
//!
//! A plain `TcpListener` plays the peer. Covers the streaming scenario
//! (frames on the wire, then one idle close), reconnect after idle,
//! retry while the peer is down, and the host lifecycle.
//!
//! Run with: `cargo test --test outbound_session`

mod common;

use common::{ToggleSource, closed_port, session_config, wait_until};
use setu::streaming::FrameReader;
use setu::{ConnectionState, StreamSession, ThreadState};
use std::io::Read;
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(20);
const WAIT: Duration = Duration::from_secs(5);

/// What the peer saw on one connection
struct PeerReport {
    first_header: [u8; 4],
    frame_sizes: Vec<usize>,
    closed_at: Instant,
}

/// Accept `connections` peers in turn, reading each until EOF
fn spawn_peer(listener: TcpListener, connections: usize) -> mpsc::Receiver<PeerReport> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for _ in 0..connections {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut first_header = [0u8; 4];
            let mut frame_sizes = Vec::new();
            if stream.read_exact(&mut first_header).is_ok() {
                let mut first_payload = vec![0u8; u32::from_be_bytes(first_header) as usize];
                if stream.read_exact(&mut first_payload).is_ok() {
                    frame_sizes.push(first_payload.len());
                    let mut reader = FrameReader::new(stream);
                    while let Ok(Some(frame)) = reader.read_frame() {
                        frame_sizes.push(frame.len());
                    }
                }
            }
            let report = PeerReport {
                first_header,
                frame_sizes,
                closed_at: Instant::now(),
            };
            if tx.send(report).is_err() {
                return;
            }
        }
    });
    rx
}

fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[test]
fn test_streams_frames_then_closes_once_when_idle() {
    let (listener, port) = listener();
    let peer = spawn_peer(listener, 1);

    let source = Arc::new(ToggleSource::new(100));
    let mut session = StreamSession::outbound(session_config(20, 500), source.clone());
    session.start(TICK, "127.0.0.1", port).unwrap();

    thread::sleep(Duration::from_millis(1000));
    source.set_producing(false);
    let quiet_since = Instant::now();

    let report = peer.recv_timeout(WAIT).expect("peer connection never closed");
    assert_eq!(report.first_header, [0, 0, 0, 100]);
    assert!(report.frame_sizes.iter().all(|&len| len == 100));
    assert!(
        report.frame_sizes.len() >= 10,
        "expected a steady stream, got {} frames",
        report.frame_sizes.len()
    );

    // Idle close comes roughly one idle timeout after the last frame
    let quiet_for = report.closed_at - quiet_since;
    assert!(quiet_for >= Duration::from_millis(400), "closed after {:?}", quiet_for);

    let status = session.status();
    assert!(wait_until(WAIT, || status.connection_state() == ConnectionState::Closed));
    thread::sleep(Duration::from_millis(300));

    let stats = status.stats();
    assert_eq!(stats.idle_closes, 1);
    assert_eq!(stats.thread_state, ThreadState::Streaming);
    assert_eq!(stats.frames_sent as usize, report.frame_sizes.len());
    assert_eq!(stats.bytes_sent, stats.frames_sent * 104);

    session.stop();
}

#[test]
fn test_reconnects_when_frames_return() {
    let (listener, port) = listener();
    let peer = spawn_peer(listener, 2);

    let source = Arc::new(ToggleSource::new(32));
    let mut session = StreamSession::outbound(session_config(10, 100), source.clone());
    session.start(Duration::from_millis(10), "127.0.0.1", port).unwrap();

    thread::sleep(Duration::from_millis(150));
    source.set_producing(false);
    let first = peer.recv_timeout(WAIT).expect("first connection never closed");
    assert!(!first.frame_sizes.is_empty());

    source.set_producing(true);
    let status = session.status();
    assert!(wait_until(WAIT, || status.connection_state() == ConnectionState::Open));
    thread::sleep(Duration::from_millis(50));
    source.set_producing(false);

    let second = peer.recv_timeout(WAIT).expect("second connection never closed");
    assert!(!second.frame_sizes.is_empty());
    assert!(wait_until(WAIT, || status.stats().idle_closes == 2));

    session.stop();
}

#[test]
fn test_retries_while_peer_is_down() {
    let port = closed_port();
    let source = Arc::new(ToggleSource::new(16));
    let mut session = StreamSession::outbound(session_config(10, 100), source);
    session.start(Duration::from_millis(10), "127.0.0.1", port).unwrap();

    let status = session.status();
    assert!(wait_until(WAIT, || status.stats().connect_failures >= 3));
    assert_eq!(session.thread_state(), ThreadState::Initializing);
    assert_ne!(session.connection_state(), ConnectionState::Open);

    // Peer comes up on the same port: the next attempt succeeds
    let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
    let _peer = spawn_peer(listener, 1);
    assert!(wait_until(WAIT, || session.thread_state() == ThreadState::Streaming));
    assert!(wait_until(WAIT, || status.stats().frames_sent > 0));

    session.stop();
}

#[test]
fn test_double_start_keeps_first_session() {
    let (listener, port) = listener();
    let _peer = spawn_peer(listener, 1);

    let source = Arc::new(ToggleSource::new(16));
    let mut session = StreamSession::outbound(session_config(10, 200), source);
    session.start(Duration::from_millis(10), "127.0.0.1", port).unwrap();
    session
        .start(Duration::from_millis(10), "127.0.0.1", closed_port())
        .unwrap();

    assert_eq!(session.config().port, port);
    let status = session.status();
    assert!(wait_until(WAIT, || status.stats().frames_sent > 0));
    assert_eq!(status.stats().connect_attempts, 1);

    session.stop();
}

#[test]
fn test_pause_resume_round_trip() {
    let (listener, port) = listener();
    let _peer = spawn_peer(listener, 1);

    let source = Arc::new(ToggleSource::new(16));
    let mut session = StreamSession::outbound(session_config(10, 200), source);
    session.start(Duration::from_millis(10), "127.0.0.1", port).unwrap();
    assert!(wait_until(WAIT, || session.thread_state() == ThreadState::Streaming));

    session.pause().unwrap();
    assert!(wait_until(WAIT, || session.thread_state() == ThreadState::Paused));
    assert_eq!(session.connection_state(), ConnectionState::Open);

    let status = session.status();
    let sent = status.stats().frames_sent;
    thread::sleep(Duration::from_millis(100));
    assert_eq!(status.stats().frames_sent, sent);

    session.resume().unwrap();
    assert!(wait_until(WAIT, || session.thread_state() == ThreadState::Streaming));
    assert!(wait_until(WAIT, || status.stats().frames_sent > sent));

    session.stop();
}

#[test]
fn test_stop_closes_and_allows_restart() {
    let (listener, port) = listener();
    let peer = spawn_peer(listener, 2);

    let source = Arc::new(ToggleSource::new(16));
    let mut session = StreamSession::outbound(session_config(10, 500), source);

    for _ in 0..2 {
        session.start(Duration::from_millis(10), "127.0.0.1", port).unwrap();
        let status = session.status();
        let sent = status.stats().frames_sent;
        assert!(wait_until(WAIT, || status.stats().frames_sent > sent));

        session.stop();
        assert_eq!(session.connection_state(), ConnectionState::Closed);
        assert_eq!(session.thread_state(), ThreadState::PreInit);
        // The peer sees EOF: the socket was released before stop returned
        assert!(peer.recv_timeout(WAIT).is_ok());
    }
}
