//! Session controller tests: full receive-and-bake and convert-and-send
//! pipelines against the fake host.

use super::test_utils::{commit_of, point, FakeConverter, FakeHost};
use skein::config::SyncConfig;
use skein::model::Node;
use skein::progress::{CancellationToken, ProgressCounters};
use skein::session::{Diagnostic, Outcome, SessionController, SessionState};
use skein::sync;
use skein::transport::{MemoryTransport, Transport};
use skein::types::ObjectId;
use std::sync::Arc;

async fn stage_commit(root: &Node, transport: &Arc<dyn Transport>) -> ObjectId {
    sync::send(
        root,
        std::slice::from_ref(transport),
        &CancellationToken::new(),
        &ProgressCounters::new(),
        4,
    )
    .await
    .unwrap();
    root.id().unwrap()
}

#[tokio::test]
async fn test_receive_bakes_all_convertible_leaves() {
    let root = commit_of(vec![point(1.0), point(2.0), point(3.0)], "Walls");
    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
    let root_id = stage_commit(&root, &transport).await;

    let mut controller =
        SessionController::new(FakeConverter, FakeHost::new(), SyncConfig::default());
    let mut session = SessionState::new("fake");

    let summary = controller
        .receive_commit(&root_id, "Job 42", transport, None, &mut session)
        .await
        .unwrap();

    assert_eq!(summary.outcome, Outcome::Completed);
    assert_eq!(summary.processed, 3);
    assert!(summary.diagnostics.is_empty());

    let baked = controller.host().baked();
    assert_eq!(baked.len(), 3);
    // Destination paths are rooted at the commit label and extend through
    // the detached group name.
    assert!(baked.iter().all(|(container, _)| container == "Job 42$Walls"));
}

#[tokio::test]
async fn test_one_bad_object_does_not_abort_the_batch() {
    let mut items = vec![point(1.0), point(2.0), point(3.0), point(4.0), point(5.0)];
    items.push(Node::new("Cursed"));
    let root = commit_of(items, "Walls");

    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
    let root_id = stage_commit(&root, &transport).await;

    let mut controller =
        SessionController::new(FakeConverter, FakeHost::new(), SyncConfig::default());
    let mut session = SessionState::new("fake");

    let summary = controller
        .receive_commit(&root_id, "Job", transport, None, &mut session)
        .await
        .unwrap();

    // Five good points baked, the failure recorded, the run demoted.
    assert_eq!(summary.processed, 5);
    assert_eq!(summary.outcome, Outcome::CompletedWithErrors);
    assert_eq!(controller.host().baked().len(), 5);

    let failures: Vec<_> = summary
        .diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::ConversionFailed { .. }))
        .collect();
    assert_eq!(failures.len(), 1);
}

#[tokio::test]
async fn test_forbidden_path_characters_are_sanitized() {
    let root = commit_of(vec![point(1.0)], "ground:floor*plan");
    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
    let root_id = stage_commit(&root, &transport).await;

    let mut controller =
        SessionController::new(FakeConverter, FakeHost::new(), SyncConfig::default());
    let mut session = SessionState::new("fake");

    let summary = controller
        .receive_commit(&root_id, "Job", transport, None, &mut session)
        .await
        .unwrap();

    // Sanitization is a warning, not a failure.
    assert_eq!(summary.outcome, Outcome::Completed);
    assert_eq!(summary.processed, 1);
    assert!(summary
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::SanitizedPaths { count: 1, .. })));

    let baked = controller.host().baked();
    assert_eq!(baked[0].0, "Job$ground-floor-plan");
}

#[tokio::test]
async fn test_send_commit_converts_selection_and_uploads() {
    let host = FakeHost::new()
        .with_handle("h1", 1.0, "Walls")
        .with_handle("h2", 2.0, "Walls")
        .with_handle("h3", 3.0, "Roof");

    let mut controller = SessionController::new(FakeConverter, host, SyncConfig::default());
    let mut session = SessionState::new("fake");
    session.selected_handles = vec!["h1".into(), "h2".into(), "h3".into()];

    let memory = Arc::new(MemoryTransport::new());
    let transport: Arc<dyn Transport> = memory.clone();

    let summary = controller
        .send_commit(vec![Arc::clone(&transport)], &mut session)
        .await
        .unwrap();

    assert_eq!(summary.outcome, Outcome::Completed);
    assert_eq!(summary.processed, 3);
    let root_id = summary.root_id.expect("send produces a root id");
    assert!(!memory.is_empty());

    // The uploaded commit bakes back into a fresh document.
    let mut receiver =
        SessionController::new(FakeConverter, FakeHost::new(), SyncConfig::default());
    let mut receive_session = SessionState::new("fake");
    let received = receiver
        .receive_commit(&root_id, "Remote", transport, None, &mut receive_session)
        .await
        .unwrap();

    assert_eq!(received.outcome, Outcome::Completed);
    assert_eq!(received.processed, 3);
    let baked = receiver.host().baked();
    assert_eq!(
        baked.iter().filter(|(c, _)| c == "Remote$Walls").count(),
        2
    );
    assert_eq!(baked.iter().filter(|(c, _)| c == "Remote$Roof").count(), 1);
}

#[tokio::test]
async fn test_unsupported_entity_skip_names_the_converter() {
    let host = FakeHost::new()
        .with_handle("good", 1.0, "Walls")
        .with_handle("bad", -1.0, "Walls");

    let mut controller = SessionController::new(FakeConverter, host, SyncConfig::default());
    let mut session = SessionState::new("fake");
    session.selected_handles = vec!["good".into(), "bad".into()];

    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
    let summary = controller
        .send_commit(vec![transport], &mut session)
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert!(summary.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::SkippedHandle { handle, reason }
            if handle == "bad" && reason.contains("fake")
    )));
}

#[tokio::test]
async fn test_summary_echoes_target_application() {
    let root = commit_of(vec![point(1.0)], "Walls");
    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
    let root_id = stage_commit(&root, &transport).await;

    let mut controller =
        SessionController::new(FakeConverter, FakeHost::new(), SyncConfig::default());
    let mut session = SessionState::new("rhino");

    let summary = controller
        .receive_commit(&root_id, "Job", transport, None, &mut session)
        .await
        .unwrap();

    assert_eq!(summary.target_application, "rhino");
}

#[tokio::test]
async fn test_unresolvable_reference_bakes_nothing() {
    let child = point(1.0);
    let child_id = child.id().unwrap();
    let root = commit_of(vec![child, point(2.0)], "Walls");

    let memory = Arc::new(MemoryTransport::new());
    let transport: Arc<dyn Transport> = memory.clone();
    let root_id = stage_commit(&root, &transport).await;
    memory.remove(&child_id);

    let mut controller =
        SessionController::new(FakeConverter, FakeHost::new(), SyncConfig::default());
    let mut session = SessionState::new("fake");

    let result = controller
        .receive_commit(&root_id, "Job", transport, None, &mut session)
        .await;

    // The incomplete graph aborts the whole receive before any bake.
    assert!(result.is_err());
    assert!(controller.host().baked().is_empty());
}

#[tokio::test]
async fn test_stale_handles_are_skipped_and_reported() {
    let host = FakeHost::new().with_handle("h1", 1.0, "Walls");

    let mut controller = SessionController::new(FakeConverter, host, SyncConfig::default());
    let mut session = SessionState::new("fake");
    session.selected_handles = vec!["h1".into(), "deleted".into()];

    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
    let summary = controller
        .send_commit(vec![transport], &mut session)
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.outcome, Outcome::CompletedWithErrors);
    assert!(summary
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::SkippedHandle { handle, .. } if handle == "deleted")));
}
