//! Setu - frame streaming bridge
//!
//! Pushes frames from a local producer (a camera pipeline, or the synthetic
//! source) to one TCP peer as length-prefixed messages. A session either
//! dials its peer or waits for the peer to connect, retries every tick until
//! the link is up, and closes the link when the producer goes quiet.
//!
//! ## Modules
//!
//! - [`session`]: state machine, socket links and the host-side handle
//! - [`scheduler`]: fixed-delay worker threads with pause/resume/stop
//! - [`streaming`]: wire codec and peer-side reader
//! - [`source`]: frame sources
//! - [`snapshot`]: periodic JSON status documents
//! - [`config`]: TOML configuration

pub mod config;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod source;
pub mod streaming;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, FramingError, Result};
pub use session::{ConnectionState, SessionStatus, StreamSession, ThreadState};
pub use source::{Frame, FrameSource};
