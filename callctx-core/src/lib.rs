//! Cancellation, deadline and request-scoped data propagation.
//!
//! A [`Context`] travels alongside an operation. It is cancelled at most once,
//! explicitly or when its deadline passes, and every listener observes the same
//! [`TerminalError`]. Children derived with [`Context::child`] inherit the
//! deadline and a snapshot of the data store, and are cancelled with their
//! parent.

pub mod context;
mod sync;
pub mod timer;
pub mod types;

pub mod prelude {
    //! Convenient re-exports of commonly used types
    pub use crate::context::{
        CancelListener, Context, ContextOptions, ContextOptionsBuilder, Subscription,
    };
    pub use crate::timer::{Scheduler, TimerCallback, TimerId, TokioScheduler};
    pub use crate::types::{
        CancelReason, ContextError, DataValue, ErrorCode, Metadata, SchedulerError, TerminalError,
    };
}

// Re-export main types
pub use prelude::*;
