use crate::timer::Scheduler;
use crate::types::Metadata;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Options for creating a root context
#[derive(Clone, Default, Deserialize)]
pub struct ContextOptions {
    /// Initial metadata, owned by the new context
    #[serde(default)]
    pub metadata: Option<Metadata>,
    /// Absolute instant after which the context cancels itself
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Timer source for deadline enforcement; defaults to the current tokio runtime
    #[serde(skip)]
    pub scheduler: Option<Arc<dyn Scheduler>>,
}

// Instead of #[derive(Debug)]
impl Debug for ContextOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOptions")
            .field("metadata", &self.metadata)
            .field("deadline", &self.deadline)
            // Schedulers are opaque trait objects
            .field("scheduler", &self.scheduler.as_ref().map(|_| "<scheduler>"))
            .finish()
    }
}

impl ContextOptions {
    pub fn builder() -> ContextOptionsBuilder {
        ContextOptionsBuilder::new()
    }
}

/// Builder for context options
#[derive(Debug, Default)]
pub struct ContextOptionsBuilder {
    options: ContextOptions,
}

impl ContextOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: ContextOptions::default(),
        }
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.options.metadata = Some(metadata);
        self
    }

    pub fn metadata_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options
            .metadata
            .get_or_insert_with(Metadata::new)
            .insert(key, value);
        self
    }

    pub fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.options.deadline = Some(deadline);
        self
    }

    /// Set the deadline relative to now
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        self.options.deadline = Some(
            Utc::now()
                .checked_add_signed(timeout)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.options.scheduler = Some(scheduler);
        self
    }

    pub fn build(self) -> ContextOptions {
        self.options
    }
}
