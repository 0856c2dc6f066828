//! Single-slot mailbox between a producer thread and the session worker

use super::{Frame, FrameSource};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Holds at most one frame: the newest one the producer published
///
/// There is no queue. Publishing over an unread frame replaces it, so a
/// slow peer never builds a backlog on the producer side.
#[derive(Default)]
pub struct LatestFrameSlot {
    latest: Mutex<Option<Frame>>,
    published: AtomicU64,
    replaced: AtomicU64,
}

impl LatestFrameSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a frame, replacing any unread one
    pub fn publish(&self, frame: Frame) {
        let previous = self.latest.lock().replace(frame);
        self.published.fetch_add(1, Ordering::Relaxed);
        if previous.is_some() {
            self.replaced.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Frames published since creation
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames overwritten before the session took them
    pub fn replaced(&self) -> u64 {
        self.replaced.load(Ordering::Relaxed)
    }
}

impl FrameSource for LatestFrameSlot {
    fn try_get_frame(&self) -> Option<Frame> {
        self.latest.lock().take()
    }
}
