//! Application orchestration for the Setu daemon
//!
//! Wires the synthetic producer, the stream session and the optional
//! snapshot writer together, then waits for signals.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use setu::config::AppConfig;
use setu::error::Result;
use setu::scheduler::{ScheduledTask, SessionScheduler};
use setu::session::{SessionStatus, StreamSession};
use setu::snapshot::{Snapshot, SnapshotSource, SnapshotValue, SnapshotWriter};
use setu::source::{FrameSource, LatestFrameSlot, SyntheticSource};
use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::iterator::{Handle, Signals};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Host requests raised by signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Stop,
    Pause,
    Resume,
}

/// Session status plus producer counters, as written to the snapshot file
struct DaemonStatus {
    session: Arc<SessionStatus>,
    slot: Arc<LatestFrameSlot>,
}

impl SnapshotSource for DaemonStatus {
    fn snapshot(&self) -> Snapshot {
        let mut snapshot = self.session.snapshot();
        snapshot.insert(
            "frames_published".into(),
            SnapshotValue::Int(self.slot.published() as i64),
        );
        snapshot.insert(
            "frames_replaced".into(),
            SnapshotValue::Int(self.slot.replaced() as i64),
        );
        snapshot
    }
}

/// Main application structure that owns every component
pub struct SetuApp {
    config: AppConfig,
    source: Arc<SyntheticSource>,
    slot: Arc<LatestFrameSlot>,
    session: StreamSession,
    snapshot_task: Option<ScheduledTask>,
    producer: Option<JoinHandle<()>>,
    producing: Arc<AtomicBool>,
    signals: Option<Handle>,
}

impl SetuApp {
    pub fn new(config: AppConfig) -> Self {
        let slot = Arc::new(LatestFrameSlot::new());
        let frames: Arc<dyn FrameSource> = Arc::clone(&slot) as Arc<dyn FrameSource>;
        let session = StreamSession::new(config.session.clone(), frames);

        Self {
            source: Arc::new(SyntheticSource::new(config.source.clone())),
            slot,
            session,
            snapshot_task: None,
            producer: None,
            producing: Arc::new(AtomicBool::new(false)),
            signals: None,
            config,
        }
    }

    /// Start all components and block until a stop signal arrives
    pub fn run(&mut self) -> Result<()> {
        let requests = self.setup_signal_handler()?;

        self.start_producer()?;
        self.session.start_configured()?;
        self.start_snapshot_writer()?;

        info!(
            "{} running ({}:{})",
            self.session.name(),
            self.config.session.host,
            self.config.session.port
        );
        info!("SIGUSR1 pauses, SIGUSR2 resumes, Ctrl+C stops");

        let mut last_stats = Instant::now();
        loop {
            match requests.recv_timeout(Duration::from_millis(100)) {
                Ok(Request::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(Request::Pause) => {
                    if let Err(e) = self.session.pause() {
                        warn!("Pause rejected: {}", e);
                    }
                }
                Ok(Request::Resume) => {
                    if let Err(e) = self.session.resume() {
                        warn!("Resume rejected: {}", e);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            if last_stats.elapsed() >= STATS_INTERVAL {
                self.log_statistics();
                last_stats = Instant::now();
            }
        }

        info!("Stop requested, shutting down...");
        self.shutdown();
        Ok(())
    }

    fn start_producer(&mut self) -> Result<()> {
        let source = Arc::clone(&self.source);
        let slot = Arc::clone(&self.slot);
        let producing = Arc::clone(&self.producing);
        producing.store(true, Ordering::Relaxed);

        let handle = std::thread::Builder::new()
            .name("frame-producer".to_string())
            .spawn(move || source.run_producer(slot, producing))?;
        self.producer = Some(handle);
        Ok(())
    }

    fn start_snapshot_writer(&mut self) -> Result<()> {
        let settings = &self.config.snapshot;
        if !settings.enabled {
            debug!("Snapshot writer disabled");
            return Ok(());
        }

        let status = DaemonStatus {
            session: self.session.status(),
            slot: Arc::clone(&self.slot),
        };
        let writer = SnapshotWriter::new(settings.path.clone(), Arc::new(status));
        let task = SessionScheduler::schedule(Duration::from_millis(settings.period_ms), writer)?;
        info!(
            "Writing status snapshot to {} every {} ms",
            settings.path.display(),
            settings.period_ms
        );
        self.snapshot_task = Some(task);
        Ok(())
    }

    /// Forward SIGINT/SIGTERM/SIGUSR1/SIGUSR2 to the main loop
    fn setup_signal_handler(&mut self) -> Result<Receiver<Request>> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGUSR1, SIGUSR2])?;
        self.signals = Some(signals.handle());
        let (tx, rx): (Sender<Request>, Receiver<Request>) = crossbeam_channel::unbounded();

        std::thread::Builder::new()
            .name("signal-handler".to_string())
            .spawn(move || {
                for sig in signals.forever() {
                    let request = match sig {
                        SIGUSR1 => Request::Pause,
                        SIGUSR2 => Request::Resume,
                        _ => Request::Stop,
                    };
                    info!("Received signal {}, requesting {:?}", sig, request);
                    if tx.send(request).is_err() || request == Request::Stop {
                        break;
                    }
                }
            })?;
        Ok(rx)
    }

    fn log_statistics(&self) {
        let stats = self.session.status().stats();
        info!(
            "Session: {} / {} | frames={} bytes={} connects={} (failed {}) write_failures={} idle_closes={} rejected={}",
            stats.thread_state,
            stats.connection_state,
            stats.frames_sent,
            stats.bytes_sent,
            stats.connect_attempts,
            stats.connect_failures,
            stats.write_failures,
            stats.idle_closes,
            stats.rejected_peers
        );
        info!(
            "Producer: published={} replaced={}",
            self.slot.published(),
            self.slot.replaced()
        );
    }

    /// Stop every component; safe to call more than once
    fn shutdown(&mut self) {
        self.session.stop();

        if let Some(task) = self.snapshot_task.take() {
            task.cancel();
        }

        self.producing.store(false, Ordering::Relaxed);
        if let Some(producer) = self.producer.take()
            && producer.join().is_err()
        {
            warn!("Frame producer thread panicked");
        }

        if let Some(signals) = self.signals.take() {
            signals.close();
        }
    }
}

impl Drop for SetuApp {
    fn drop(&mut self) {
        debug!("SetuApp cleaning up...");
        self.shutdown();
    }
}
