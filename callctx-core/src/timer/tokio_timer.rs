use super::scheduler::{Scheduler, TimerCallback, TimerId};
use crate::sync::lock;
use crate::types::SchedulerError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

type TimerTable = Arc<Mutex<HashMap<TimerId, AbortHandle>>>;

/// A [`Scheduler`] backed by tokio tasks sleeping on the runtime's timer
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
    timers: TimerTable,
    next_id: Arc<AtomicU64>,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Bind to the tokio runtime the caller is running in
    pub fn try_current() -> Result<Self, SchedulerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::NoRuntime(e.to_string()))
    }

    /// Number of callbacks that have neither fired nor been cancelled
    pub fn pending(&self) -> usize {
        lock(&self.timers).len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let timers = Arc::clone(&self.timers);

        // Hold the table while spawning so the task cannot observe a missing entry.
        let mut table = lock(&self.timers);
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            // Losing the race with `cancel` means the callback must not run.
            let armed = lock(&timers).remove(&id).is_some();
            if armed {
                tracing::trace!(timer = %id, "timer fired");
                callback();
            }
        });
        table.insert(id, task.abort_handle());

        tracing::trace!(timer = %id, delay_ms = delay.as_millis() as u64, "timer scheduled");
        id
    }

    fn cancel(&self, id: TimerId) {
        if let Some(task) = lock(&self.timers).remove(&id) {
            task.abort();
            tracing::trace!(timer = %id, "timer cancelled");
        }
    }
}
