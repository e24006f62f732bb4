use super::core::Context;
use super::latch::Subscription;
use crate::types::TerminalError;
use futures::Stream;
use std::future::Future;
use tokio::sync::watch;

/// Owned receiver for a context's terminal error.
///
/// A listener replays the error if the context was already cancelled when it
/// was created. It does not keep the context alive.
#[derive(Debug, Clone)]
pub struct CancelListener {
    rx: watch::Receiver<Option<TerminalError>>,
}

impl CancelListener {
    /// Wait for cancellation.
    ///
    /// Returns `None` if every handle to the context was dropped before it
    /// was cancelled.
    pub async fn recv(&mut self) -> Option<TerminalError> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(latched) => latched.clone(),
            Err(_) => None,
        }
    }

    /// The terminal error if already latched, without waiting
    pub fn try_recv(&self) -> Option<TerminalError> {
        self.rx.borrow().clone()
    }
}

impl Context {
    pub fn listen(&self) -> CancelListener {
        CancelListener {
            rx: self.inner.latch.subscribe(),
        }
    }

    /// Resolves with the terminal error once this context is cancelled
    pub async fn cancelled(&self) -> TerminalError {
        let mut listener = self.listen();
        match listener.recv().await {
            Some(err) => err,
            // `self` keeps the latch alive, so the channel cannot close under us.
            None => std::future::pending().await,
        }
    }

    /// Run `callback` with the terminal error once cancelled, or right away if
    /// already cancelled. Drop the returned [`Subscription`] to unregister.
    pub fn on_cancel<F>(&self, callback: F) -> Subscription
    where
        F: FnOnce(&TerminalError) + Send + 'static,
    {
        self.inner.latch.on_resolve(Box::new(callback))
    }

    /// A stream yielding the terminal error once, then ending.
    ///
    /// The stream ends without an item if the context is dropped uncancelled.
    pub fn cancellation_stream(&self) -> impl Stream<Item = TerminalError> + Send + 'static {
        let mut listener = self.listen();
        async_stream::stream! {
            if let Some(err) = listener.recv().await {
                yield err;
            }
        }
    }

    /// Drive `fut` until it completes or this context is cancelled
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, TerminalError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            err = self.cancelled() => {
                tracing::trace!(context_id = %self.id(), "operation aborted by cancellation");
                Err(err)
            }
            out = fut => Ok(out),
        }
    }
}
