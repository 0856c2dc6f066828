//! Stream sessions
//!
//! A session pushes frames from a [`FrameSource`](crate::source::FrameSource)
//! to one TCP peer, either dialing out ([`Dialer`]) or waiting for the peer
//! to connect ([`Acceptor`]). The host owns a [`StreamSession`] and drives
//! its lifecycle; the per-tick state machine ([`Session`]) runs on a
//! scheduler worker.

mod handle;
mod link;
mod machine;
mod state;
mod status;

pub use handle::StreamSession;
pub use link::{Acceptor, Attempt, Dialer, Link, StreamOptions};
pub use machine::Session;
pub use state::{ConnectionState, IdleTimer, ThreadState};
pub use status::{SessionStats, SessionStatus};
