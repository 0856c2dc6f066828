//! Fixed-delay task scheduler
//!
//! Each scheduled task gets one dedicated, named worker thread:
//!
//! ```text
//! loop {
//!     wait `period`, applying pause/resume requests as they arrive
//!     (stop wakes the wait immediately)
//!     task.tick()            // never overlaps: one thread, one tick at a time
//! }
//! task.shutdown()            // always runs before cancel() returns
//! ```
//!
//! Host threads never touch the task directly. [`ScheduledTask`] only sends
//! control requests over a channel, so a request made while a tick is in
//! flight takes effect after that tick and before the next one.

use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Work driven by the scheduler
pub trait Tickable: Send + 'static {
    /// Name used for the worker thread and logs
    fn name(&self) -> &str;

    /// One step; must return within a bounded time
    fn tick(&mut self);

    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    /// Release resources; the last call the task receives
    fn shutdown(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Pause,
    Resume,
    Stop,
}

/// Spawns fixed-delay workers
pub struct SessionScheduler;

impl SessionScheduler {
    /// Run `task.tick()` every `period` on a new worker thread
    ///
    /// The first tick happens one period after scheduling. The returned
    /// handle cancels the worker when dropped.
    pub fn schedule<T: Tickable>(period: Duration, task: T) -> Result<ScheduledTask> {
        if period.is_zero() {
            return Err(Error::InvalidParameter(
                "tick period must be non-zero".to_string(),
            ));
        }

        let name = task.name().to_string();
        let (control_tx, control_rx) = crossbeam_channel::unbounded();

        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(task, period, control_rx))?;

        log::debug!("Scheduled {} every {:?}", name, period);

        Ok(ScheduledTask {
            name,
            control: control_tx,
            worker: Some(worker),
        })
    }
}

fn run_worker<T: Tickable>(mut task: T, period: Duration, control: Receiver<Control>) {
    log::debug!("{} worker started", task.name());
    let mut next_tick = Instant::now() + period;

    'worker: loop {
        loop {
            let now = Instant::now();
            if now >= next_tick {
                break;
            }
            match control.recv_timeout(next_tick - now) {
                Ok(Control::Pause) => {
                    if let Err(e) = task.pause() {
                        log::warn!("{}: {}", task.name(), e);
                    }
                }
                Ok(Control::Resume) => {
                    if let Err(e) = task.resume() {
                        log::warn!("{}: {}", task.name(), e);
                    }
                }
                Ok(Control::Stop) | Err(RecvTimeoutError::Disconnected) => break 'worker,
                Err(RecvTimeoutError::Timeout) => break,
            }
        }

        task.tick();
        next_tick = Instant::now() + period;
    }

    task.shutdown();
    log::debug!("{} worker exiting", task.name());
}

/// Cancellation handle for a scheduled task
pub struct ScheduledTask {
    name: String,
    control: Sender<Control>,
    worker: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Request a pause before the next tick
    pub fn pause(&self) -> Result<()> {
        self.send(Control::Pause)
    }

    /// Request a resume before the next tick
    pub fn resume(&self) -> Result<()> {
        self.send(Control::Resume)
    }

    /// True until the worker has exited
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop the worker and wait for the task's shutdown to complete
    pub fn cancel(mut self) {
        self.stop_and_join();
    }

    fn send(&self, request: Control) -> Result<()> {
        self.control
            .send(request)
            .map_err(|_| Error::Other(format!("{} worker is not running", self.name)))
    }

    fn stop_and_join(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // A closed channel means the worker already left its loop
        let _ = self.control.send(Control::Stop);
        if worker.join().is_err() {
            log::error!("{} worker panicked", self.name);
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
