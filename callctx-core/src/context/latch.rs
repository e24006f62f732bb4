use crate::sync::lock;
use crate::types::TerminalError;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;

pub(crate) type Listener = Box<dyn FnOnce(&TerminalError) + Send + 'static>;

/// One-shot cell holding the terminal error of a context.
///
/// The first `resolve` wins; its value is published on a watch channel (so
/// late receivers still see it) and handed to every registered callback.
/// Callbacks registered after resolution are invoked immediately with the
/// stored value.
pub(crate) struct Latch {
    state: watch::Sender<Option<TerminalError>>,
    listeners: Mutex<Listeners>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

impl Latch {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            listeners: Mutex::new(Listeners::default()),
        }
    }

    pub(crate) fn get(&self) -> Option<TerminalError> {
        self.state.borrow().clone()
    }

    pub(crate) fn is_set(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Latch `err` if nothing has been latched yet. Returns whether this call won.
    pub(crate) fn resolve(&self, err: TerminalError) -> bool {
        let latched = err.clone();
        let won = self.state.send_if_modified(move |slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(latched);
            true
        });
        if !won {
            return false;
        }

        // Callbacks run outside the lock: they may cancel children, which
        // unregister from this latch.
        let drained = std::mem::take(&mut lock(&self.listeners).entries);
        for (_, listener) in drained {
            listener(&err);
        }
        true
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<TerminalError>> {
        self.state.subscribe()
    }

    /// Register a callback for the terminal error, replaying it right away if
    /// the latch is already resolved.
    pub(crate) fn on_resolve(self: &Arc<Self>, listener: Listener) -> Subscription {
        let mut listeners = lock(&self.listeners);
        // Checked under the lock: `resolve` publishes before draining, so a
        // listener inserted here is guaranteed to be drained.
        if let Some(err) = self.get() {
            drop(listeners);
            listener(&err);
            return Subscription::detached();
        }

        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.insert(id, listener);

        Subscription {
            latch: Arc::downgrade(self),
            id: Some(id),
        }
    }

    fn unregister(&self, id: u64) {
        lock(&self.listeners).entries.remove(&id);
    }

    pub(crate) fn listener_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }
}

/// Registration of a cancellation callback.
///
/// Dropping the subscription unregisters the callback. It holds only a weak
/// reference to the context it listens on.
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    latch: Weak<Latch>,
    id: Option<u64>,
}

impl Subscription {
    fn detached() -> Self {
        Self {
            latch: Weak::new(),
            id: None,
        }
    }

    /// Whether the callback is still waiting for cancellation
    pub fn is_active(&self) -> bool {
        let (Some(id), Some(latch)) = (self.id, self.latch.upgrade()) else {
            return false;
        };
        let active = lock(&latch.listeners).entries.contains_key(&id);
        active
    }

    /// Keep the callback registered for as long as the observed context lives
    pub fn forget(mut self) {
        self.id = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let (Some(id), Some(latch)) = (self.id.take(), self.latch.upgrade()) {
            latch.unregister(id);
        }
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
