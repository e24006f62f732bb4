mod error;
mod metadata;
mod tests;

pub use error::{CancelReason, ContextError, ErrorCode, SchedulerError, TerminalError};
pub use metadata::Metadata;

use std::any::Any;
use std::sync::Arc;

/// A value held in a context's data store; shared, never deep-cloned
pub type DataValue = Arc<dyn Any + Send + Sync>;
