//! Session state machine over `(ThreadState, ConnectionState)`
//!
//! ```text
//!             start / resume                 establish ok
//!   PreInit ────────────────► Initializing ─────────────────► Streaming
//!      ▲                          │   ▲                           │
//!      │ stop                     │   │ retry every tick          │ no frame: idle timer
//!      │                          ▼   │                           │ frame: reconnect if closed,
//!      └──────────── any ◄──── (connect failed)                   │        encode, write
//!                                                                 ▼
//!                         pause: remember state ──► Paused ──► resume: restore it
//! ```
//!
//! All methods run on the session worker. Nothing here is shared except
//! [`SessionStatus`], which the worker publishes after every step.

use super::link::{Attempt, Link};
use super::state::{ConnectionState, IdleTimer, ThreadState};
use super::status::SessionStatus;
use crate::error::{Error, Result};
use crate::scheduler::Tickable;
use crate::source::FrameSource;
use crate::streaming::wire;
use std::sync::Arc;
use std::time::Duration;

/// Log connect failures at warn level once per this many consecutive failures
const CONNECT_WARN_INTERVAL: u64 = 100;

/// One logical stream endpoint (outbound or inbound, decided by its link)
pub struct Session {
    name: String,
    link: Box<dyn Link>,
    source: Arc<dyn FrameSource>,
    status: Arc<SessionStatus>,
    thread_state: ThreadState,
    paused_from: Option<ThreadState>,
    connection: ConnectionState,
    idle: IdleTimer,
    tick_period: Duration,
    /// Reused encode buffer
    buffer: Vec<u8>,
    failures_in_row: u64,
}

impl Session {
    pub fn new(
        name: impl Into<String>,
        link: Box<dyn Link>,
        source: Arc<dyn FrameSource>,
        status: Arc<SessionStatus>,
        tick_period: Duration,
        idle_timeout: Duration,
    ) -> Self {
        let session = Self {
            name: name.into(),
            link,
            source,
            status,
            thread_state: ThreadState::PreInit,
            paused_from: None,
            connection: ConnectionState::Closed,
            idle: IdleTimer::new(idle_timeout),
            tick_period,
            buffer: Vec::new(),
            failures_in_row: 0,
        };
        session.publish();
        session
    }

    pub fn thread_state(&self) -> ThreadState {
        self.thread_state
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn idle_timer(&self) -> &IdleTimer {
        &self.idle
    }

    /// PreInit → Initializing with a closed connection
    pub fn begin(&mut self) -> Result<()> {
        if self.thread_state != ThreadState::PreInit {
            return Err(Error::IllegalStateTransition {
                action: "start",
                state: self.thread_state,
            });
        }
        self.thread_state = ThreadState::Initializing;
        self.connection = ConnectionState::Closed;
        self.idle.reset();
        log::debug!("{}: initializing ({})", self.name, self.link.endpoint());
        self.publish();
        Ok(())
    }

    /// Remember the working state and go quiet; the socket stays open
    pub fn pause(&mut self) -> Result<()> {
        if !self.thread_state.is_working() {
            return Err(Error::IllegalStateTransition {
                action: "pause",
                state: self.thread_state,
            });
        }
        self.paused_from = Some(self.thread_state);
        self.thread_state = ThreadState::Paused;
        log::info!("{}: paused", self.name);
        self.publish();
        Ok(())
    }

    /// Restore the state held before `pause`, or begin from PreInit
    pub fn resume(&mut self) -> Result<()> {
        match self.thread_state {
            ThreadState::Paused => {
                self.thread_state = self.paused_from.take().unwrap_or(ThreadState::Initializing);
                log::info!("{}: resumed ({})", self.name, self.thread_state);
                self.publish();
                Ok(())
            }
            ThreadState::PreInit => self.begin(),
            state => Err(Error::IllegalStateTransition {
                action: "resume",
                state,
            }),
        }
    }

    /// One scheduled step
    pub fn tick(&mut self) {
        match self.thread_state {
            ThreadState::PreInit => {
                log::debug!("{}: tick before start, ignoring", self.name);
            }
            ThreadState::Paused => {}
            ThreadState::Initializing => self.tick_initializing(),
            ThreadState::Streaming => self.tick_streaming(),
        }
        self.publish();
    }

    /// Release the socket and return to PreInit
    pub fn shutdown(&mut self) {
        self.link.shutdown();
        self.connection = ConnectionState::Closed;
        self.thread_state = ThreadState::PreInit;
        self.paused_from = None;
        self.idle.reset();
        log::info!("{}: stopped", self.name);
        self.publish();
    }

    fn tick_initializing(&mut self) {
        if self.try_establish() {
            self.thread_state = ThreadState::Streaming;
            log::info!("{}: streaming to {}", self.name, self.link.endpoint());
        }
    }

    fn tick_streaming(&mut self) {
        let rejected = self.link.maintain();
        if rejected > 0 {
            self.status.record_rejected_peers(rejected);
        }

        // Payload first: an idle producer is detected by the timer, never
        // by writing to a socket already known to be stale.
        let Some(frame) = self.source.try_get_frame().filter(|f| !f.is_empty()) else {
            // Only an open socket is torn down; a pending accept keeps waiting
            if self.idle.advance(self.tick_period) && self.connection == ConnectionState::Open {
                log::info!(
                    "{}: no frame for {:?} (limit {:?}), closing connection",
                    self.name,
                    self.idle.elapsed(),
                    self.idle.threshold()
                );
                self.link.close();
                self.connection = ConnectionState::Closed;
                self.status.record_idle_close();
            }
            return;
        };
        self.idle.reset();

        if (self.connection != ConnectionState::Open || !self.link.is_open())
            && !self.try_establish()
        {
            log::trace!("{}: not connected, dropping {} byte frame", self.name, frame.len());
            return;
        }

        if let Err(e) = wire::encode_into(&mut self.buffer, frame.as_bytes()) {
            log::warn!("{}: dropping frame: {}", self.name, e);
            return;
        }

        match self.link.send(&self.buffer) {
            Ok(()) => self.status.record_frame(self.buffer.len()),
            Err(e) => {
                log::warn!("{}: {}, closing connection", self.name, e);
                self.link.close();
                self.connection = ConnectionState::Closed;
                self.status.record_write_failure();
            }
        }
    }

    /// Advance Closed/Connecting towards Open; true once open
    fn try_establish(&mut self) -> bool {
        if self.connection == ConnectionState::Open && self.link.is_open() {
            return true;
        }
        if self.connection != ConnectionState::Connecting {
            self.connection = ConnectionState::Connecting;
            let attempt = self.status.record_connect_attempt();
            log::trace!("{}: connect attempt {}", self.name, attempt);
        }

        let outcome = self.link.establish();
        if let Some(addr) = self.link.local_addr() {
            self.status.set_local_addr(addr);
        }

        match outcome {
            Ok(Attempt::Open) => {
                self.connection = ConnectionState::Open;
                self.failures_in_row = 0;
                true
            }
            Ok(Attempt::Pending) => false,
            Err(e) => {
                self.connection = ConnectionState::Closed;
                self.status.record_connect_failure();
                self.failures_in_row += 1;
                if self.failures_in_row == 1 || self.failures_in_row % CONNECT_WARN_INTERVAL == 0 {
                    log::warn!(
                        "{}: {} (attempt {}, retrying every {:?})",
                        self.name,
                        e,
                        self.failures_in_row,
                        self.tick_period
                    );
                } else {
                    log::debug!("{}: {}", self.name, e);
                }
                false
            }
        }
    }

    fn publish(&self) {
        self.status.set_thread_state(self.thread_state);
        self.status.set_connection_state(self.connection);
    }
}

impl Tickable for Session {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self) {
        Session::tick(self);
    }

    fn pause(&mut self) -> Result<()> {
        Session::pause(self)
    }

    fn resume(&mut self) -> Result<()> {
        Session::resume(self)
    }

    fn shutdown(&mut self) {
        Session::shutdown(self);
    }
}
