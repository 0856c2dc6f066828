//! Frame producers
//!
//! The session pulls at most one [`Frame`] per tick from a [`FrameSource`].
//! Sources must never block: returning `None` means "nothing new since the
//! last call", not an error.
//!
//! | Source | Use |
//! |--------|-----|
//! | [`LatestFrameSlot`] | Producer thread publishes, session takes newest |
//! | [`SyntheticSource`] | Patterned payloads for the daemon and tests |

mod slot;
mod synthetic;

pub use slot::LatestFrameSlot;
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// One immutable payload unit, written as one wire message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a payload
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero-length payload (treated as "no data" by sessions)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for Frame {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for Frame {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

/// Non-blocking payload producer polled once per tick
pub trait FrameSource: Send + Sync {
    /// Take the newest frame, or `None` when nothing new is available
    fn try_get_frame(&self) -> Option<Frame>;
}
