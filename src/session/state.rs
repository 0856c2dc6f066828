//! Session state types

use std::fmt;
use std::time::Duration;

/// Lifecycle of the session worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ThreadState {
    /// Constructed (or stopped), no worker running
    PreInit = 0,
    /// Worker running, establishing the first connection
    Initializing = 1,
    /// Worker running, pushing frames
    Streaming = 2,
    /// Worker running, ticks are no-ops
    Paused = 3,
}

impl ThreadState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Initializing,
            2 => Self::Streaming,
            3 => Self::Paused,
            _ => Self::PreInit,
        }
    }

    /// True for the states `pause()` may be called from
    pub fn is_working(self) -> bool {
        matches!(self, Self::Initializing | Self::Streaming)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreInit => "preinit",
            Self::Initializing => "initializing",
            Self::Streaming => "streaming",
            Self::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Lifecycle of the socket, orthogonal to [`ThreadState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Closed = 0,
    /// Attempt in progress (inbound: listening, no peer yet)
    Connecting = 1,
    Open = 2,
}

impl ConnectionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Open,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Open => "open",
        };
        f.write_str(name)
    }
}

/// Time elapsed since the last non-empty frame
///
/// Advanced by one tick period on every tick without a frame, so idle
/// detection follows the scheduler's clock rather than I/O jitter.
#[derive(Debug, Clone, Copy)]
pub struct IdleTimer {
    elapsed: Duration,
    threshold: Duration,
}

impl IdleTimer {
    pub fn new(threshold: Duration) -> Self {
        Self {
            elapsed: Duration::ZERO,
            threshold,
        }
    }

    /// A frame arrived
    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    /// A tick passed without a frame; returns true once the threshold is reached
    pub fn advance(&mut self, by: Duration) -> bool {
        self.elapsed = self.elapsed.saturating_add(by);
        self.expired()
    }

    pub fn expired(&self) -> bool {
        self.elapsed >= self.threshold
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}
