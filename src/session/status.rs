//! Read-only session status shared with the host
//!
//! Only the session worker writes here. The host reads it to observe state
//! and to build snapshots; it never mutates the socket or state machine.

use super::state::{ConnectionState, ThreadState};
use crate::snapshot::{Snapshot, SnapshotSource, SnapshotValue};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Atomically published session state and counters
#[derive(Debug, Default)]
pub struct SessionStatus {
    thread_state: AtomicU8,
    connection_state: AtomicU8,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    connect_attempts: AtomicU64,
    connect_failures: AtomicU64,
    write_failures: AtomicU64,
    idle_closes: AtomicU64,
    rejected_peers: AtomicU64,
    local_addr: Mutex<Option<SocketAddr>>,
}

/// Point-in-time copy of [`SessionStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub thread_state: ThreadState,
    pub connection_state: ConnectionState,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub write_failures: u64,
    pub idle_closes: u64,
    pub rejected_peers: u64,
}

impl SessionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_state(&self) -> ThreadState {
        ThreadState::from_u8(self.thread_state.load(Ordering::Acquire))
    }

    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.connection_state.load(Ordering::Acquire))
    }

    /// Address the session's socket or listener is bound to
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            thread_state: self.thread_state(),
            connection_state: self.connection_state(),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            idle_closes: self.idle_closes.load(Ordering::Relaxed),
            rejected_peers: self.rejected_peers.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn set_thread_state(&self, state: ThreadState) {
        self.thread_state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn set_connection_state(&self, state: ConnectionState) {
        self.connection_state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn set_local_addr(&self, addr: SocketAddr) {
        *self.local_addr.lock() = Some(addr);
    }

    pub(crate) fn record_frame(&self, wire_bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(wire_bytes as u64, Ordering::Relaxed);
    }

    /// Returns the attempt number (1-based)
    pub(crate) fn record_connect_attempt(&self) -> u64 {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the failure count including this one
    pub(crate) fn record_connect_failure(&self) -> u64 {
        self.connect_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_idle_close(&self) {
        self.idle_closes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_peers(&self, count: u64) {
        self.rejected_peers.fetch_add(count, Ordering::Relaxed);
    }
}

impl SnapshotSource for SessionStatus {
    fn snapshot(&self) -> Snapshot {
        let stats = self.stats();
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "thread_state".into(),
            SnapshotValue::Text(stats.thread_state.to_string()),
        );
        snapshot.insert(
            "connection_state".into(),
            SnapshotValue::Text(stats.connection_state.to_string()),
        );
        snapshot.insert(
            "connected".into(),
            SnapshotValue::Bool(stats.connection_state == ConnectionState::Open),
        );
        let counters = [
            ("frames_sent", stats.frames_sent),
            ("bytes_sent", stats.bytes_sent),
            ("connect_attempts", stats.connect_attempts),
            ("connect_failures", stats.connect_failures),
            ("write_failures", stats.write_failures),
            ("idle_closes", stats.idle_closes),
            ("rejected_peers", stats.rejected_peers),
        ];
        for (name, value) in counters {
            snapshot.insert(name.into(), SnapshotValue::Int(value as i64));
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let status = SessionStatus::new();
        assert_eq!(status.thread_state(), ThreadState::PreInit);
        assert_eq!(status.connection_state(), ConnectionState::Closed);
        assert_eq!(status.stats().frames_sent, 0);
    }

    #[test]
    fn test_counters() {
        let status = SessionStatus::new();
        status.record_frame(104);
        status.record_frame(104);
        assert_eq!(status.record_connect_attempt(), 1);
        assert_eq!(status.record_connect_attempt(), 2);

        let stats = status.stats();
        assert_eq!(stats.frames_sent, 2);
        assert_eq!(stats.bytes_sent, 208);
        assert_eq!(stats.connect_attempts, 2);
    }

    #[test]
    fn test_snapshot_fields() {
        let status = SessionStatus::new();
        status.set_thread_state(ThreadState::Streaming);
        status.set_connection_state(ConnectionState::Open);
        status.record_frame(10);

        let snapshot = status.snapshot();
        assert_eq!(
            snapshot.get("thread_state"),
            Some(&SnapshotValue::Text("streaming".into()))
        );
        assert_eq!(snapshot.get("connected"), Some(&SnapshotValue::Bool(true)));
        assert_eq!(snapshot.get("frames_sent"), Some(&SnapshotValue::Int(1)));
    }
}
