//! Periodic tick scheduling
//!
//! The countdown controller never touches a clock directly. It asks a
//! [`Scheduler`] for a periodic process and keeps the returned handle, so the
//! tokio implementation can be swapped for [`ManualScheduler`] in tests.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, warn};

/// Called with the boundary reached, measured from the start of the process
pub type TickCallback = Box<dyn FnMut(Duration) + Send>;
/// Called once when the process reaches its total duration
pub type CompleteCallback = Box<dyn FnOnce() + Send>;

/// Cancellable handle to a scheduled periodic process
pub trait ScheduleHandle: Send {
    /// Stop the process. No callback fires after this returns.
    fn cancel(&mut self);
}

/// Host timer facility
pub trait Scheduler: Send + Sync {
    /// Fire `on_tick` every `interval` strictly before `total` has elapsed,
    /// then `on_complete` once at the first boundary at or past `total`.
    /// The tick argument is always a whole multiple of `interval`.
    fn schedule(
        &self,
        interval: Duration,
        total: Duration,
        on_tick: TickCallback,
        on_complete: CompleteCallback,
    ) -> Box<dyn ScheduleHandle>;
}

/// Scheduler backed by a tokio task per process
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    /// Build a scheduler on the current tokio runtime
    pub fn try_new() -> Result<Self, String> {
        Handle::try_current()
            .map(Self::with_handle)
            .map_err(|e| format!("No tokio runtime available for the scheduler: {}", e))
    }

    pub fn with_handle(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(
        &self,
        interval: Duration,
        total: Duration,
        mut on_tick: TickCallback,
        on_complete: CompleteCallback,
    ) -> Box<dyn ScheduleHandle> {
        let task = self.runtime.spawn(async move {
            let start = Instant::now();
            let mut ticker = interval_at(start + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                // The deadline, not the wake-up time; wake-ups run a little late.
                let deadline = ticker.tick().await;
                let elapsed = deadline.duration_since(start);
                if elapsed >= total {
                    debug!("Periodic process reached {:?}", total);
                    on_complete();
                    break;
                }
                on_tick(elapsed);
            }
        });

        Box::new(TokioScheduleHandle { task: Some(task) })
    }
}

struct TokioScheduleHandle {
    task: Option<JoinHandle<()>>,
}

impl ScheduleHandle for TokioScheduleHandle {
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TokioScheduleHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Virtual-clock scheduler. Nothing fires until [`ManualScheduler::advance`].
#[derive(Clone, Default)]
pub struct ManualScheduler {
    processes: Arc<Mutex<Vec<ManualProcess>>>,
}

struct ManualProcess {
    interval: Duration,
    total: Duration,
    clock: Duration,
    elapsed: Duration,
    on_tick: TickCallback,
    on_complete: Option<CompleteCallback>,
    cancelled: Arc<AtomicBool>,
}

impl ManualProcess {
    fn is_live(&self) -> bool {
        self.on_complete.is_some() && !self.cancelled.load(Ordering::SeqCst)
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move virtual time forward, firing every boundary crossed
    pub fn advance(&self, by: Duration) {
        let mut processes = match self.processes.lock() {
            Ok(processes) => processes,
            Err(e) => {
                warn!("Manual scheduler lock poisoned: {}", e);
                return;
            }
        };

        for process in processes.iter_mut() {
            process.clock += by;
            while process.is_live()
                && !process.interval.is_zero()
                && process.elapsed + process.interval <= process.clock
            {
                process.elapsed += process.interval;
                if process.elapsed >= process.total {
                    if let Some(on_complete) = process.on_complete.take() {
                        on_complete();
                    }
                } else {
                    (process.on_tick)(process.elapsed);
                }
            }
        }

        processes.retain(ManualProcess::is_live);
    }

    /// Number of processes that have neither completed nor been cancelled
    pub fn active_count(&self) -> usize {
        self.processes
            .lock()
            .map(|processes| processes.iter().filter(|p| p.is_live()).count())
            .unwrap_or(0)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(
        &self,
        interval: Duration,
        total: Duration,
        on_tick: TickCallback,
        on_complete: CompleteCallback,
    ) -> Box<dyn ScheduleHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        match self.processes.lock() {
            Ok(mut processes) => processes.push(ManualProcess {
                interval,
                total,
                clock: Duration::ZERO,
                elapsed: Duration::ZERO,
                on_tick,
                on_complete: Some(on_complete),
                cancelled: Arc::clone(&cancelled),
            }),
            Err(e) => warn!("Manual scheduler lock poisoned: {}", e),
        }
        Box::new(ManualScheduleHandle { cancelled })
    }
}

struct ManualScheduleHandle {
    cancelled: Arc<AtomicBool>,
}

impl ScheduleHandle for ManualScheduleHandle {
    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
