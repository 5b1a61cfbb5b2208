//! Deferred execution for polling retries.
//!
//! [`DelayScheduler::schedule_after`] runs an action once, no earlier than
//! the requested delay, off the calling task. The returned
//! [`ScheduledTask`] cancels the action when dropped unless it has been
//! detached.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::trace;

/// Action run by a scheduler.
pub type ScheduledAction = Box<dyn FnOnce() + Send + 'static>;

/// Schedules one-shot deferred actions.
pub trait DelayScheduler: Send + Sync {
    /// Runs `action` once after `delay`.
    fn schedule_after(&self, delay: Duration, action: ScheduledAction) -> ScheduledTask;
}

// ============================================================================
// Scheduled Task
// ============================================================================

#[derive(Debug)]
enum TaskInner {
    Tokio(AbortHandle),
    Thread(Arc<AtomicBool>),
    Done,
}

/// Cancellation handle for a scheduled action.
#[derive(Debug)]
#[must_use = "dropping a ScheduledTask cancels it; call detach() to let it run"]
pub struct ScheduledTask {
    inner: TaskInner,
}

impl ScheduledTask {
    /// A handle for an action that already ran or never needs cancelling.
    pub fn completed() -> Self {
        Self {
            inner: TaskInner::Done,
        }
    }

    /// Cancels the action if it has not run yet.
    pub fn cancel(&mut self) {
        match std::mem::replace(&mut self.inner, TaskInner::Done) {
            TaskInner::Tokio(handle) => handle.abort(),
            TaskInner::Thread(cancelled) => cancelled.store(true, Ordering::SeqCst),
            TaskInner::Done => {}
        }
    }

    /// Lets the action run even after this handle is dropped.
    pub fn detach(mut self) {
        self.inner = TaskInner::Done;
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// Tokio Scheduler
// ============================================================================

/// Scheduler backed by the tokio timer.
///
/// Outside a tokio runtime the delay runs on a dedicated thread instead.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    handle: Option<Handle>,
}

impl TokioScheduler {
    /// Creates a scheduler that uses whichever runtime is current.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scheduler bound to a specific runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl DelayScheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, action: ScheduledAction) -> ScheduledTask {
        trace!(delay_ms = delay.as_millis(), "Scheduling deferred action");

        let handle = self.handle.clone().or_else(|| Handle::try_current().ok());

        let inner = match handle {
            Some(handle) => {
                let task = handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    action();
                });
                TaskInner::Tokio(task.abort_handle())
            }
            None => {
                let cancelled = Arc::new(AtomicBool::new(false));
                let flag = Arc::clone(&cancelled);
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    if !flag.load(Ordering::SeqCst) {
                        action();
                    }
                });
                TaskInner::Thread(cancelled)
            }
        };

        ScheduledTask { inner }
    }
}

// ============================================================================
// Tests
// ============================================================================
