//! Shared helpers for loopback session tests
#![allow(dead_code)]

use setu::config::SessionConfig;
use setu::source::{Frame, FrameSource};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Produces a fixed-size frame on every call while switched on
pub struct ToggleSource {
    producing: AtomicBool,
    frame_size: usize,
    served: AtomicU64,
}

impl ToggleSource {
    pub fn new(frame_size: usize) -> Self {
        Self {
            producing: AtomicBool::new(true),
            frame_size,
            served: AtomicU64::new(0),
        }
    }

    pub fn set_producing(&self, producing: bool) {
        self.producing.store(producing, Ordering::SeqCst);
    }

    pub fn served(&self) -> u64 {
        self.served.load(Ordering::SeqCst)
    }
}

impl FrameSource for ToggleSource {
    fn try_get_frame(&self) -> Option<Frame> {
        if !self.producing.load(Ordering::SeqCst) {
            return None;
        }
        let n = self.served.fetch_add(1, Ordering::SeqCst);
        Some(Frame::new(vec![n as u8; self.frame_size]))
    }
}

pub fn session_config(tick_period_ms: u64, idle_timeout_ms: u64) -> SessionConfig {
    SessionConfig {
        tick_period_ms,
        idle_timeout_ms,
        connect_timeout_ms: 200,
        accept_timeout_ms: 10,
        ..SessionConfig::default()
    }
}

/// A loopback port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
