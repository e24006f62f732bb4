use callctx_core::{Context, TerminalError};
use std::future::Future;
use tokio::task::JoinHandle;

/// Spawn `f` on the current tokio runtime under a child of `parent`.
///
/// The task receives its own derived context and stops as soon as that
/// context is cancelled, yielding the terminal error instead of its output.
pub fn spawn_child<F, Fut>(parent: &Context, f: F) -> JoinHandle<Result<Fut::Output, TerminalError>>
where
    F: FnOnce(Context) -> Fut + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let ctx = parent.child();
    tracing::debug!(
        context_id = %ctx.id(),
        parent_id = %parent.id(),
        "spawning task under child context"
    );
    tokio::spawn(async move {
        let work = f(ctx.clone());
        ctx.run(work).await
    })
}
