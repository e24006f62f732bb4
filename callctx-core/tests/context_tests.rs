use callctx_core::prelude::*;
use chrono::{Duration as ChronoDuration, Utc};
use futures::StreamExt;
use std::time::Duration;
use tokio_test::{assert_pending, assert_ready, task};

fn deadline_in(millis: i64) -> ContextOptions {
    ContextOptions::builder()
        .deadline(Utc::now() + ChronoDuration::milliseconds(millis))
        .build()
}

#[tokio::test]
async fn test_deadline_fires() {
    let ctx = Context::create(deadline_in(50));
    let deadline = ctx.deadline().unwrap();

    let err = tokio::time::timeout(Duration::from_secs(2), ctx.cancelled())
        .await
        .expect("deadline should cancel the context");

    assert_eq!(err.code, ErrorCode::Cancelled);
    assert_eq!(err.source, "client");
    assert!(err
        .message
        .contains(&deadline.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)));
}

#[tokio::test]
async fn test_past_deadline_is_inert() {
    let ctx = Context::create(deadline_in(-1000));

    let waited = tokio::time::timeout(Duration::from_millis(100), ctx.cancelled()).await;
    assert!(waited.is_err(), "a past deadline must not auto-cancel");
    assert!(!ctx.is_cancelled());

    ctx.cancel();
    assert_eq!(ctx.cancelled().await, TerminalError::cancelled());
}

#[tokio::test]
async fn test_explicit_cancel_beats_deadline() {
    let ctx = Context::create(deadline_in(50));
    ctx.cancel_with(CancelReason::new().message("user abort"));

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(ctx.error().unwrap().message, "user abort");
}

#[tokio::test]
async fn test_late_listener_replays() {
    let ctx = Context::background();
    ctx.cancel_with(CancelReason::new().code(ErrorCode::Aborted));

    let mut listener = ctx.listen();
    let err = listener.recv().await.unwrap();
    assert_eq!(err.code, ErrorCode::Aborted);
    assert_eq!(listener.try_recv(), Some(err));
}

#[tokio::test]
async fn test_listener_is_pending_until_cancel() {
    let ctx = Context::background();
    let mut listener = ctx.listen();
    let mut recv = task::spawn(async move { listener.recv().await });

    assert_pending!(recv.poll());

    ctx.cancel();
    assert!(recv.is_woken());
    let err = assert_ready!(recv.poll());
    assert_eq!(err, Some(TerminalError::cancelled()));
}

#[tokio::test]
async fn test_listener_ends_when_context_dropped_uncancelled() {
    let ctx = Context::background();
    let mut listener = ctx.listen();
    drop(ctx);

    assert_eq!(listener.recv().await, None);
}

#[tokio::test]
async fn test_many_listeners_see_the_same_error() {
    let root = Context::background();
    let child = root.child();

    let waiters: Vec<_> = (0..8)
        .map(|i| {
            let ctx = if i % 2 == 0 { root.clone() } else { child.clone() };
            tokio::spawn(async move { ctx.cancelled().await })
        })
        .collect();

    tokio::task::yield_now().await;
    root.cancel_with(CancelReason::new().message("shutdown"));

    for waiter in waiters {
        let err = waiter.await.unwrap();
        assert_eq!(err.message, "shutdown");
    }
}

#[tokio::test]
async fn test_parent_and_child_racing_resolve_once() {
    let root = Context::background();
    let child = root.child();

    let a = {
        let root = root.clone();
        tokio::spawn(async move { root.cancel_with(CancelReason::new().message("parent")) })
    };
    let b = {
        let child = child.clone();
        tokio::spawn(async move { child.cancel_with(CancelReason::new().message("child")) })
    };
    a.await.unwrap();
    b.await.unwrap();

    let winner = child.error().unwrap();
    assert!(winner.message == "parent" || winner.message == "child");
    // Every later observer sees the same winner
    assert_eq!(child.cancelled().await, winner);
    assert_eq!(child.listen().try_recv(), Some(winner));
}

#[tokio::test]
async fn test_cancellation_stream_yields_once() {
    let ctx = Context::background();
    let stream = ctx.cancellation_stream();
    ctx.cancel();
    ctx.cancel_with(CancelReason::new().message("again"));

    let items: Vec<_> = stream.collect().await;
    assert_eq!(items, vec![TerminalError::cancelled()]);
}

#[tokio::test]
async fn test_cancellation_stream_ends_empty_when_dropped() {
    let ctx = Context::background();
    let stream = ctx.cancellation_stream();
    drop(ctx);

    let items: Vec<_> = stream.collect().await;
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_run_aborts_on_deadline() {
    let ctx = Context::create(deadline_in(30));

    let result = ctx
        .run(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "finished"
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.message.starts_with("Request exceeded deadline"));
}

#[tokio::test]
async fn test_run_completes_before_cancel() {
    let ctx = Context::create(
        ContextOptions::builder()
            .timeout(Duration::from_secs(5))
            .build(),
    );

    let result = ctx.run(async { 21 * 2 }).await;
    assert_eq!(result, Ok(42));

    let cancelled = Context::background();
    cancelled.cancel();
    assert_eq!(
        cancelled.run(async { 1 }).await,
        Err(TerminalError::cancelled())
    );
}

#[tokio::test]
async fn test_deadline_propagates_down_a_long_chain() {
    let root = Context::create(deadline_in(50));
    let mut leaf = root.clone();
    for _ in 0..64 {
        leaf = leaf.child();
    }

    let err = tokio::time::timeout(Duration::from_secs(2), leaf.cancelled())
        .await
        .unwrap();
    assert!(err.message.starts_with("Request exceeded deadline"));
    assert_eq!(leaf.deadline(), root.deadline());
}

#[tokio::test]
async fn test_root_cancel_reaches_deep_descendant_without_deadline() {
    let root = Context::background();
    let mut leaf = root.child();
    for _ in 0..32 {
        leaf = leaf.child();
    }
    assert!(leaf.deadline().is_none());

    let mut listener = leaf.listen();
    let mut recv = task::spawn(async move { listener.recv().await });
    assert_pending!(recv.poll());

    root.cancel_with(CancelReason::new().message("shutdown"));

    let err = assert_ready!(recv.poll()).unwrap();
    assert_eq!(err.message, "shutdown");
}

#[tokio::test]
async fn test_timer_released_on_cancel() {
    let scheduler = std::sync::Arc::new(TokioScheduler::try_current().unwrap());
    let root = Context::create(
        ContextOptions::builder()
            .timeout(Duration::from_secs(30))
            .scheduler(scheduler.clone())
            .build(),
    );
    let children: Vec<_> = (0..4).map(|_| root.child()).collect();
    assert_eq!(scheduler.pending(), 5);

    root.cancel();
    assert_eq!(scheduler.pending(), 0);
    assert!(children.iter().all(Context::is_cancelled));
}
