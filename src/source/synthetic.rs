//! Synthetic frame producer
//!
//! Stands in for the camera pipeline when running the daemon without one,
//! and drives the session in tests. Payloads are deterministic for a given
//! seed:
//!
//! ```text
//! ┌────────────────────────┬──────────────────────────────┐
//! │ Sequence (8 bytes, BE) │ Pattern: (seq + i) as u8 ... │
//! └────────────────────────┴──────────────────────────────┘
//! ```

use super::{Frame, FrameSource, LatestFrameSlot};
use parking_lot::Mutex;
use rand::prelude::*;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Synthetic producer settings (`[source]` config section)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Payload size in bytes
    pub frame_size: usize,
    /// Interval between frames when run as a producer thread
    pub frame_period_ms: u64,
    /// Probability (0.0 - 1.0) that a frame is skipped
    pub dropout_probability: f64,
    /// RNG seed; 0 uses random entropy
    pub seed: u64,
    /// Stop producing after this many frames (simulates a stalled camera)
    pub frame_limit: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            frame_size: 16 * 1024,
            frame_period_ms: 33,
            dropout_probability: 0.0,
            seed: 0,
            frame_limit: None,
        }
    }
}

struct GeneratorState {
    rng: SmallRng,
    sequence: u64,
}

/// Deterministic patterned frame generator
pub struct SyntheticSource {
    config: SyntheticConfig,
    state: Mutex<GeneratorState>,
}

impl SyntheticSource {
    /// Create a generator from config
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = if config.seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(config.seed)
        };
        Self {
            config,
            state: Mutex::new(GeneratorState { rng, sequence: 0 }),
        }
    }

    /// Frames produced so far
    pub fn produced(&self) -> u64 {
        self.state.lock().sequence
    }

    /// Build the payload for a sequence number
    pub fn payload(sequence: u64, size: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(size);
        let header = sequence.to_be_bytes();
        data.extend_from_slice(&header[..size.min(header.len())]);
        let base = sequence as u8;
        data.extend((data.len()..size).map(|i| base.wrapping_add(i as u8)));
        data
    }

    fn next_frame(&self) -> Option<Frame> {
        let mut state = self.state.lock();

        if let Some(limit) = self.config.frame_limit
            && state.sequence >= limit
        {
            return None;
        }

        let p = self.config.dropout_probability;
        if p > 0.0 && state.rng.r#gen::<f64>() < p {
            return None;
        }

        let frame = Frame::new(Self::payload(state.sequence, self.config.frame_size));
        state.sequence += 1;
        Some(frame)
    }

    /// Publish frames into `slot` every `frame_period_ms` until `running` clears
    ///
    /// Blocks the calling thread; intended to run on its own producer thread.
    pub fn run_producer(&self, slot: Arc<LatestFrameSlot>, running: Arc<AtomicBool>) {
        let period = Duration::from_millis(self.config.frame_period_ms.max(1));
        log::info!(
            "Synthetic producer started ({} bytes every {:?})",
            self.config.frame_size,
            period
        );

        while running.load(Ordering::Relaxed) {
            if let Some(frame) = self.next_frame() {
                slot.publish(frame);
            }
            std::thread::sleep(period);
        }

        log::info!(
            "Synthetic producer stopped ({} frames produced)",
            self.produced()
        );
    }
}

impl FrameSource for SyntheticSource {
    fn try_get_frame(&self) -> Option<Frame> {
        self.next_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(seed: u64) -> SyntheticConfig {
        SyntheticConfig {
            frame_size: 32,
            seed,
            ..Default::default()
        }
    }

    #[test]
    fn test_payload_layout() {
        let data = SyntheticSource::payload(258, 12);
        assert_eq!(data.len(), 12);
        assert_eq!(&data[..8], &258u64.to_be_bytes());
        assert_eq!(data[8], 2u8.wrapping_add(8));
    }

    #[test]
    fn test_payload_smaller_than_header() {
        let data = SyntheticSource::payload(1, 3);
        assert_eq!(data, vec![0, 0, 0]);
    }

    #[test]
    fn test_sequence_increments() {
        let source = SyntheticSource::new(config(7));
        let first = source.try_get_frame().unwrap();
        let second = source.try_get_frame().unwrap();

        assert_eq!(&first.as_bytes()[..8], &0u64.to_be_bytes());
        assert_eq!(&second.as_bytes()[..8], &1u64.to_be_bytes());
        assert_eq!(source.produced(), 2);
    }

    #[test]
    fn test_frame_limit_stalls_source() {
        let source = SyntheticSource::new(SyntheticConfig {
            frame_limit: Some(2),
            ..config(7)
        });
        assert!(source.try_get_frame().is_some());
        assert!(source.try_get_frame().is_some());
        assert!(source.try_get_frame().is_none());
        assert!(source.try_get_frame().is_none());
    }

    #[test]
    fn test_dropout_is_deterministic_per_seed() {
        let make = || {
            SyntheticSource::new(SyntheticConfig {
                dropout_probability: 0.5,
                ..config(42)
            })
        };
        let a = make();
        let b = make();

        let pattern_a: Vec<bool> = (0..50).map(|_| a.try_get_frame().is_some()).collect();
        let pattern_b: Vec<bool> = (0..50).map(|_| b.try_get_frame().is_some()).collect();
        assert_eq!(pattern_a, pattern_b);
        assert!(pattern_a.iter().any(|&x| x));
        assert!(pattern_a.iter().any(|&x| !x));
    }

    #[test]
    fn test_full_dropout_produces_nothing() {
        let source = SyntheticSource::new(SyntheticConfig {
            dropout_probability: 1.0,
            ..config(3)
        });
        assert!((0..20).all(|_| source.try_get_frame().is_none()));
    }
}
