use super::latch::{Latch, Subscription};
use super::options::ContextOptions;
use super::store::DataStore;
use crate::sync::lock;
use crate::timer::{Scheduler, TimerId, TokioScheduler};
use crate::types::{
    CancelReason, ContextError, DataValue, Metadata, SchedulerError, TerminalError,
};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Carries cancellation, a deadline and request-scoped data along one
/// logical operation.
///
/// `Context` is a cheap handle: clones share the same latch, store and
/// timer. A context is cancelled at most once, either directly through
/// [`Context::cancel`], by its deadline timer, or by the parent it was derived
/// from. Whichever happens first decides the [`TerminalError`] every listener
/// observes.
#[derive(Clone)]
pub struct Context {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    id: String,
    parent_id: Option<String>,
    deadline: Option<DateTime<Utc>>,
    metadata: Mutex<Metadata>,
    data: DataStore,
    pub(crate) latch: Arc<Latch>,
    scheduler: Option<Arc<dyn Scheduler>>,
    timer: Mutex<Option<TimerId>>,
    parent: Mutex<Option<ParentLink>>,
}

/// A child's hold on the context it was derived from. The parent stays alive
/// as long as any descendant does; the parent only sees the child weakly.
struct ParentLink {
    // Declared first so it unregisters before the parent can be released.
    _subscription: Subscription,
    _context: Arc<Inner>,
}

impl Context {
    /// Create a root context.
    ///
    /// A deadline strictly in the future arms a timer that cancels the
    /// context with [`TerminalError::deadline_exceeded`]. A deadline at or
    /// before now is kept as a value but never enforced. When no scheduler is
    /// given and no tokio runtime is running, the deadline is likewise left
    /// unenforced; use [`Context::try_create`] to treat that as an error.
    pub fn create(options: ContextOptions) -> Self {
        let ContextOptions {
            metadata,
            deadline,
            scheduler,
        } = options;

        let scheduler = scheduler_for(scheduler, deadline).unwrap_or_else(|e| {
            tracing::warn!(error = %e, deadline = ?deadline, "deadline will not be enforced");
            None
        });
        Self::assemble(
            None,
            deadline,
            metadata.unwrap_or_default(),
            DataStore::default(),
            scheduler,
        )
    }

    /// Like [`Context::create`], but fails if a future deadline has no timer to enforce it
    pub fn try_create(options: ContextOptions) -> Result<Self, ContextError> {
        let ContextOptions {
            metadata,
            deadline,
            scheduler,
        } = options;

        let scheduler = scheduler_for(scheduler, deadline)?;
        Ok(Self::assemble(
            None,
            deadline,
            metadata.unwrap_or_default(),
            DataStore::default(),
            scheduler,
        ))
    }

    /// A root context with no deadline and no metadata
    pub fn background() -> Self {
        Self::create(ContextOptions::default())
    }

    /// Derive a child context.
    ///
    /// The child gets the parent's deadline (armed under the same future-only
    /// rule) and a shallow copy of the parent's data. Metadata is not
    /// inherited. The child is cancelled when the parent is, unless it has
    /// already been cancelled on its own. Deriving from a cancelled parent
    /// yields a cancelled child.
    pub fn child(&self) -> Self {
        let parent = &self.inner;
        let scheduler = match &parent.scheduler {
            Some(scheduler) => Some(Arc::clone(scheduler)),
            None => scheduler_for(None, parent.deadline).unwrap_or_else(|e| {
                tracing::warn!(error = %e, parent_id = %parent.id, "deadline will not be enforced");
                None
            }),
        };

        let child = Self::assemble(
            Some(parent.id.clone()),
            parent.deadline,
            Metadata::new(),
            DataStore::from_snapshot(parent.data.snapshot()),
            scheduler,
        );
        child.attach(parent);
        child
    }

    fn assemble(
        parent_id: Option<String>,
        deadline: Option<DateTime<Utc>>,
        metadata: Metadata,
        data: DataStore,
        scheduler: Option<Arc<dyn Scheduler>>,
    ) -> Self {
        let inner = Arc::new(Inner {
            id: Uuid::new_v4().to_string(),
            parent_id,
            deadline,
            metadata: Mutex::new(metadata),
            data,
            latch: Arc::new(Latch::new()),
            scheduler,
            timer: Mutex::new(None),
            parent: Mutex::new(None),
        });
        Inner::arm_deadline(&inner);

        tracing::debug!(
            context_id = %inner.id,
            parent_id = ?inner.parent_id,
            deadline = ?inner.deadline,
            "context created"
        );
        Self { inner }
    }

    fn attach(&self, parent: &Arc<Inner>) {
        let weak = Arc::downgrade(&self.inner);
        let subscription = parent.latch.on_resolve(Box::new(move |err| {
            if let Some(inner) = weak.upgrade() {
                inner.cancel(err.clone());
            }
        }));
        if !self.inner.latch.is_set() {
            *lock(&self.inner.parent) = Some(ParentLink {
                _subscription: subscription,
                _context: Arc::clone(parent),
            });
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.inner.parent_id.as_deref()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.inner.deadline
    }

    /// Time left until the deadline; `None` without a deadline or once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .and_then(|deadline| (deadline - Utc::now()).to_std().ok())
    }

    /// A copy of this context's metadata
    pub fn metadata(&self) -> Metadata {
        lock(&self.inner.metadata).clone()
    }

    pub fn metadata_value(&self, key: &str) -> Option<String> {
        lock(&self.inner.metadata).get(key).map(str::to_owned)
    }

    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<String>) {
        lock(&self.inner.metadata).insert(key, value);
    }

    /// Insert or overwrite `key` in this context's store only
    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.set_value(key, Arc::new(value));
    }

    pub fn set_value(&self, key: impl Into<String>, value: DataValue) {
        self.inner.data.insert(key.into(), value);
    }

    /// Typed lookup; `None` when absent or stored with a different type
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get_value(key)
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn get_value(&self, key: &str) -> Option<DataValue> {
        self.inner.data.get(key)
    }

    /// Snapshot of the whole store
    pub fn get_all(&self) -> HashMap<String, DataValue> {
        self.inner.data.snapshot()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.data.contains_key(key)
    }

    /// Cancel with the default client cancellation error
    pub fn cancel(&self) {
        self.cancel_with(CancelReason::default());
    }

    /// Cancel, overriding fields of the default error.
    ///
    /// Only the first cancellation is recorded; later calls still release the
    /// deadline timer but do not change the terminal error.
    pub fn cancel_with(&self, reason: impl Into<CancelReason>) {
        let err = reason.into().apply(TerminalError::cancelled());
        self.inner.cancel(err);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.latch.is_set()
    }

    /// The latched terminal error, if cancelled
    pub fn error(&self) -> Option<TerminalError> {
        self.inner.latch.get()
    }
}

impl Inner {
    fn arm_deadline(this: &Arc<Self>) {
        let (Some(deadline), Some(scheduler)) = (this.deadline, this.scheduler.as_ref()) else {
            return;
        };
        let Some(delay) = delay_until(deadline) else {
            tracing::debug!(context_id = %this.id, deadline = %deadline, "deadline already passed");
            return;
        };

        let weak = Arc::downgrade(this);
        let id = scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.cancel(TerminalError::deadline_exceeded(deadline));
                }
            }),
        );
        *lock(&this.timer) = Some(id);

        // The timer may have fired, or a cancel slipped in, before the id was stored.
        if this.latch.is_set() {
            this.release_timer();
        }
    }

    pub(crate) fn cancel(&self, err: TerminalError) -> bool {
        self.release_timer();
        let won = self.latch.resolve(err);
        if won {
            // No longer interested in the parent; release it outside the lock.
            let link = lock(&self.parent).take();
            drop(link);
            if let Some(err) = self.latch.get() {
                tracing::debug!(
                    context_id = %self.id,
                    code = %err.code,
                    message = %err.message,
                    "context cancelled"
                );
            }
        }
        won
    }

    fn release_timer(&self) {
        let Some(id) = lock(&self.timer).take() else {
            return;
        };
        if let Some(scheduler) = &self.scheduler {
            scheduler.cancel(id);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.release_timer();
        tracing::trace!(context_id = %self.id, "context dropped");
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl From<&Context> for Context {
    fn from(parent: &Context) -> Self {
        parent.child()
    }
}

// Instead of #[derive(Debug)]
impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("parent_id", &self.inner.parent_id)
            .field("deadline", &self.inner.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Pick the scheduler for a new context. A timer driver is only required when
/// the deadline lies in the future.
fn scheduler_for(
    explicit: Option<Arc<dyn Scheduler>>,
    deadline: Option<DateTime<Utc>>,
) -> Result<Option<Arc<dyn Scheduler>>, SchedulerError> {
    if explicit.is_some() {
        return Ok(explicit);
    }
    if deadline.and_then(delay_until).is_none() {
        return Ok(None);
    }
    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::try_current()?);
    Ok(Some(scheduler))
}

fn delay_until(deadline: DateTime<Utc>) -> Option<Duration> {
    (deadline - Utc::now())
        .to_std()
        .ok()
        .filter(|delay| !delay.is_zero())
}
