//! Wire protocol for frame streaming
//!
//! - [`wire`]: length-prefixed message codec
//! - [`reader`]: blocking peer-side reader built on the codec

pub mod reader;
pub mod wire;

pub use reader::FrameReader;
pub use wire::{HEADER_LEN, MAX_FRAME_LEN};
