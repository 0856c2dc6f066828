//! Peer-side frame reader
//!
//! Reads length-prefixed messages from any blocking [`Read`] (usually the
//! peer's end of a session socket). Read timeouts surface as I/O errors; a
//! timeout in the middle of a message leaves the stream unusable, since the
//! protocol has no resynchronization marker.

use super::wire::{self, HEADER_LEN};
use crate::error::{FramingError, Result};
use crate::source::Frame;
use std::io::{ErrorKind, Read};

/// Decodes consecutive frames from a byte stream
pub struct FrameReader<R> {
    inner: R,
    frames_read: u64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            frames_read: 0,
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Read the next frame
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between frames. An end
    /// of stream inside a frame is [`FramingError::Truncated`].
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut header = [0u8; HEADER_LEN];
        let got = fill(&mut self.inner, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_LEN {
            return Err(FramingError::Truncated {
                needed: HEADER_LEN,
                available: got,
            }
            .into());
        }

        let len = wire::decode_header(header)?;
        // Each frame owns its payload, so read straight into a fresh buffer
        let mut payload = vec![0u8; len];
        let got = fill(&mut self.inner, &mut payload)?;
        if got < len {
            return Err(FramingError::Truncated {
                needed: HEADER_LEN + len,
                available: HEADER_LEN + got,
            }
            .into());
        }

        self.frames_read += 1;
        Ok(Some(Frame::new(payload)))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

/// Read until `buf` is full or the stream ends; returns bytes read
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
