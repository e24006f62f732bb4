use std::fmt;
use std::time::Duration;

/// Identifies a callback registered with a [`Scheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Callback run by a scheduler when its delay elapses
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Runs callbacks after a delay. Deadline enforcement goes through this trait
/// so contexts can be driven by any timer source.
pub trait Scheduler: Send + Sync {
    /// Run `callback` once after `delay`
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Release a scheduled callback. Unknown or already-fired ids are ignored.
    fn cancel(&self, id: TimerId);
}
