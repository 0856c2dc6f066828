//! Host-side session handle
//!
//! [`StreamSession`] is what an application keeps. It never touches the
//! socket: lifecycle calls become control requests for the scheduler
//! worker, and state is read back from the shared [`SessionStatus`].

use super::link::{Acceptor, Dialer, Link, StreamOptions};
use super::machine::Session;
use super::state::{ConnectionState, ThreadState};
use super::status::SessionStatus;
use crate::config::{Role, SessionConfig};
use crate::error::{Error, Result};
use crate::scheduler::{ScheduledTask, SessionScheduler};
use crate::source::FrameSource;
use std::sync::Arc;
use std::time::Duration;

/// What the host has asked for so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Paused,
}

/// Owned handle to one outbound or inbound stream session
pub struct StreamSession {
    name: String,
    config: SessionConfig,
    source: Arc<dyn FrameSource>,
    status: Arc<SessionStatus>,
    task: Option<ScheduledTask>,
    lifecycle: Lifecycle,
}

impl StreamSession {
    pub fn new(config: SessionConfig, source: Arc<dyn FrameSource>) -> Self {
        let name = match config.role {
            Role::Outbound => "outbound-session",
            Role::Inbound => "inbound-session",
        };
        Self {
            name: name.to_string(),
            config,
            source,
            status: Arc::new(SessionStatus::new()),
            task: None,
            lifecycle: Lifecycle::Idle,
        }
    }

    /// Session that dials its peer
    pub fn outbound(config: SessionConfig, source: Arc<dyn FrameSource>) -> Self {
        Self::new(
            SessionConfig {
                role: Role::Outbound,
                ..config
            },
            source,
        )
    }

    /// Session that waits for its peer to connect
    pub fn inbound(config: SessionConfig, source: Arc<dyn FrameSource>) -> Self {
        Self::new(
            SessionConfig {
                role: Role::Inbound,
                ..config
            },
            source,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Shared status, updated by the worker after every step
    pub fn status(&self) -> Arc<SessionStatus> {
        Arc::clone(&self.status)
    }

    pub fn thread_state(&self) -> ThreadState {
        self.status.thread_state()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.status.connection_state()
    }

    pub fn is_started(&self) -> bool {
        self.task.is_some()
    }

    /// Begin ticking every `tick_period` towards `host:port`
    ///
    /// Starting an already started session does nothing and logs a warning.
    pub fn start(&mut self, tick_period: Duration, host: &str, port: u16) -> Result<()> {
        if self.task.is_some() {
            log::warn!(
                "{}: start ignored, already started ({})",
                self.name,
                self.status.thread_state()
            );
            return Ok(());
        }

        let candidate = SessionConfig {
            tick_period_ms: whole_millis(tick_period)?,
            host: host.to_string(),
            port,
            ..self.config.clone()
        };
        candidate.validate()?;
        self.config = candidate;
        self.spawn()
    }

    /// Start with the endpoint and timing from the session config
    pub fn start_configured(&mut self) -> Result<()> {
        let tick_period = self.config.tick_period();
        let host = self.config.host.clone();
        let port = self.config.port;
        self.start(tick_period, &host, port)
    }

    /// Hold the current state; the connection is kept open
    pub fn pause(&mut self) -> Result<()> {
        match (self.lifecycle, self.task.as_ref()) {
            (Lifecycle::Running, Some(task)) => {
                task.pause()?;
                self.lifecycle = Lifecycle::Paused;
                Ok(())
            }
            _ => Err(self.illegal("pause")),
        }
    }

    /// Undo a pause, or start a stopped session with its last endpoint
    pub fn resume(&mut self) -> Result<()> {
        match (self.lifecycle, self.task.as_ref()) {
            (Lifecycle::Paused, Some(task)) => {
                task.resume()?;
                self.lifecycle = Lifecycle::Running;
                Ok(())
            }
            (Lifecycle::Idle, None) => self.spawn(),
            _ => Err(self.illegal("resume")),
        }
    }

    /// Tear down from any state
    ///
    /// Returns once the worker has exited and the socket is closed. The
    /// session can be started again afterwards.
    pub fn stop(&mut self) {
        self.lifecycle = Lifecycle::Idle;
        if let Some(task) = self.task.take() {
            log::debug!("{}: stopping", self.name);
            task.cancel();
        }
    }

    fn spawn(&mut self) -> Result<()> {
        self.config.validate()?;

        let options = StreamOptions {
            write_timeout: self.config.write_timeout(),
        };
        let link: Box<dyn Link> = match self.config.role {
            Role::Outbound => Box::new(Dialer::new(
                &self.config.host,
                self.config.port,
                self.config.connect_timeout(),
                options,
            )?),
            Role::Inbound => Box::new(Acceptor::new(
                &self.config.host,
                self.config.port,
                self.config.accept_timeout(),
                options,
            )),
        };

        let mut session = Session::new(
            self.name.clone(),
            link,
            Arc::clone(&self.source),
            Arc::clone(&self.status),
            self.config.tick_period(),
            self.config.idle_timeout(),
        );
        session.begin()?;

        let task = SessionScheduler::schedule(self.config.tick_period(), session)?;
        log::info!(
            "{}: started ({}:{}, tick {:?}, idle timeout {:?})",
            self.name,
            self.config.host,
            self.config.port,
            self.config.tick_period(),
            self.config.idle_timeout()
        );
        self.task = Some(task);
        self.lifecycle = Lifecycle::Running;
        Ok(())
    }

    fn illegal(&self, action: &'static str) -> Error {
        let state = self.status.thread_state();
        log::warn!("{}: cannot {} while {}", self.name, action, state);
        Error::IllegalStateTransition { action, state }
    }
}

/// Tick periods are configured in whole milliseconds
fn whole_millis(period: Duration) -> Result<u64> {
    let millis = u64::try_from(period.as_millis())
        .map_err(|_| Error::InvalidParameter(format!("tick period {:?} is too long", period)))?;
    if Duration::from_millis(millis) != period {
        return Err(Error::InvalidParameter(format!(
            "tick period {:?} is not a whole number of milliseconds",
            period
        )));
    }
    Ok(millis)
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LatestFrameSlot;

    fn inbound() -> StreamSession {
        let config = SessionConfig {
            port: 0,
            tick_period_ms: 5,
            idle_timeout_ms: 50,
            ..SessionConfig::default()
        };
        StreamSession::inbound(config, Arc::new(LatestFrameSlot::new()))
    }

    #[test]
    fn test_illegal_before_start() {
        let mut session = inbound();
        assert!(matches!(
            session.pause(),
            Err(Error::IllegalStateTransition {
                action: "pause",
                state: ThreadState::PreInit
            })
        ));
        assert!(!session.is_started());
    }

    #[test]
    fn test_double_start_is_noop() {
        let mut session = inbound();
        session
            .start(Duration::from_millis(5), "127.0.0.1", 0)
            .unwrap();
        session
            .start(Duration::from_millis(5), "127.0.0.1", 0)
            .unwrap();
        assert!(session.is_started());
        assert_eq!(session.thread_state(), ThreadState::Initializing);
        session.stop();
        assert_eq!(session.thread_state(), ThreadState::PreInit);
    }

    #[test]
    fn test_pause_twice_is_illegal() {
        let mut session = inbound();
        session
            .start(Duration::from_millis(5), "127.0.0.1", 0)
            .unwrap();
        session.pause().unwrap();
        assert!(session.pause().is_err());
        session.resume().unwrap();
        assert!(session.resume().is_err());
    }

    #[test]
    fn test_resume_from_stopped_starts() {
        let mut session = inbound();
        session.resume().unwrap();
        assert!(session.is_started());
        session.stop();
        assert!(!session.is_started());
        assert_eq!(session.connection_state(), ConnectionState::Closed);
    }

    #[test]
    fn test_invalid_tick_period_rejected() {
        let mut session = inbound();
        assert!(session.start(Duration::ZERO, "127.0.0.1", 0).is_err());
        assert!(!session.is_started());
    }

    #[test]
    fn test_rejected_start_keeps_previous_config() {
        let mut session = inbound();
        assert!(matches!(
            session.start(Duration::ZERO, "127.0.0.1", 0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            session.start(Duration::from_micros(1500), "127.0.0.1", 0),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(session.config().tick_period_ms, 5);

        // Resume from stopped reuses the last good config
        session.resume().unwrap();
        assert!(session.is_started());
        session.stop();
    }
}
