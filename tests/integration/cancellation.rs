//! Cooperative cancellation tests.
//!
//! Cancellation is a first-class outcome: an operation stops at the next
//! object boundary and reports `Cancelled`, never an error. Partial uploads
//! are inert in the content-addressed store.

use super::test_utils::{commit_of, point, CancelAfterSaves, FakeConverter, FakeHost};
use skein::config::SyncConfig;
use skein::progress::{CancellationToken, ProgressCounters};
use skein::session::{Outcome, SessionController, SessionState};
use skein::sync;
use skein::transport::{MemoryTransport, Transport};
use std::sync::Arc;

#[tokio::test]
async fn test_cancel_before_send_writes_nothing() {
    let root = commit_of(vec![point(1.0), point(2.0)], "Walls");
    let memory = Arc::new(MemoryTransport::new());
    let transport: Arc<dyn Transport> = memory.clone();

    let token = CancellationToken::new();
    token.cancel();

    let completion = sync::send(&root, &[transport], &token, &ProgressCounters::new(), 4)
        .await
        .unwrap();

    assert!(completion.is_cancelled());
    assert_eq!(memory.save_call_count(), 0);
}

#[tokio::test]
async fn test_cancel_mid_send_stops_at_object_boundary() {
    let root = commit_of(
        vec![point(1.0), point(2.0), point(3.0), point(4.0)],
        "Walls",
    );
    let token = CancellationToken::new();

    // The transport cancels the token right after the first save lands.
    let cancelling = Arc::new(CancelAfterSaves::new(token.clone(), 1));
    let transport: Arc<dyn Transport> = cancelling.clone();

    let completion = sync::send(&root, &[transport], &token, &ProgressCounters::new(), 1)
        .await
        .unwrap();

    assert!(completion.is_cancelled());
    // One save went through; no further object was started, so the root
    // (five objects total) never uploaded.
    let saves = cancelling.save_call_count();
    assert!(saves >= 1 && saves < 5, "unexpected save count {saves}");
}

#[tokio::test]
async fn test_cancel_before_receive_frontier() {
    let root = commit_of(vec![point(1.0), point(2.0)], "Walls");
    let root_id = root.id().unwrap();
    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());

    sync::send(
        &root,
        std::slice::from_ref(&transport),
        &CancellationToken::new(),
        &ProgressCounters::new(),
        4,
    )
    .await
    .unwrap();

    let token = CancellationToken::new();
    token.cancel();

    let completion = sync::receive(
        &root_id,
        &transport,
        None,
        &token,
        &ProgressCounters::new(),
        4,
    )
    .await
    .unwrap();
    assert!(completion.is_cancelled());
}

#[tokio::test]
async fn test_cancelled_receive_reports_cancelled_outcome() {
    let root = commit_of(vec![point(1.0), point(2.0)], "Walls");
    let root_id = root.id().unwrap();
    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());

    sync::send(
        &root,
        std::slice::from_ref(&transport),
        &CancellationToken::new(),
        &ProgressCounters::new(),
        4,
    )
    .await
    .unwrap();

    let mut controller =
        SessionController::new(FakeConverter, FakeHost::new(), SyncConfig::default());
    let mut session = SessionState::new("fake");
    session.cancellation_token().cancel();

    let summary = controller
        .receive_commit(&root_id, "Job", transport, None, &mut session)
        .await
        .unwrap();

    assert_eq!(summary.outcome, Outcome::Cancelled);
    assert_eq!(summary.processed, 0);
    assert!(controller.host().baked().is_empty());
}
