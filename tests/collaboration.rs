//! Multi-operator collaboration scenarios: claim races, cross-tab badge
//! agreement, and completion gating.

use serde_json::json;
use shopfloor::bus::TabBus;
use shopfloor::client::{MutationClient, TransportError};
use shopfloor::core::{
    Artifact, ArtifactKind, NotificationEvent, NotificationId, SplitChild, TabMessage, Task,
    TaskId, TaskStatus, TaskType,
};
use shopfloor::reconcile::{MemorySummaryStore, NotificationReconciler};
use shopfloor::test_harness::{AllowAllCapabilities, RecordingTransport};
use shopfloor::workflow::{CompleteOptions, Recovery, TaskWorkflow, WorkflowError};

fn pending_task(id: u64, version: u64) -> Task {
    serde_json::from_value(json!({
        "id": id,
        "version": version,
        "status": "pending",
        "task_type": "general",
        "work_order_process": 12,
        "work_content": "foil stamping",
        "production_quantity": 500,
        "quantity_completed": 0,
        "quantity_defective": 0,
    }))
    .expect("task json")
}

fn task_json(id: u64, version: u64, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "version": version,
        "status": status,
        "task_type": "general",
        "work_order_process": 12,
        "work_content": "foil stamping",
        "production_quantity": 500,
        "quantity_completed": 0,
        "quantity_defective": 0,
    })
}

fn workflow(
    transport: &RecordingTransport,
) -> TaskWorkflow<&RecordingTransport, AllowAllCapabilities> {
    TaskWorkflow::new(MutationClient::new(transport), AllowAllCapabilities)
}

#[test]
fn losing_a_claim_race_names_the_winner_and_a_way_out() {
    // Both operators loaded the task at version 3. A's claim landed first.
    let transport_a = RecordingTransport::with_responses(vec![Ok(task_json(1, 4, "in_progress"))]);
    let won = workflow(&transport_a)
        .claim(&pending_task(1, 3), None)
        .expect("first claim wins");
    assert_eq!(won.version, 4);
    assert_eq!(won.status, TaskStatus::InProgress);

    // B's claim carries the now-stale version and is rejected, not merged.
    let transport_b = RecordingTransport::with_responses(vec![Err(TransportError {
        status: 409,
        body: json!({
            "detail": "task updated by another operator",
            "current_owner": "A",
            "current_version": 4,
        }),
    })]);
    let err = workflow(&transport_b)
        .claim(&pending_task(1, 3), None)
        .unwrap_err();
    match err {
        WorkflowError::Conflict(prompt) => {
            assert_eq!(prompt.current_owner.as_deref(), Some("A"));
            assert_eq!(prompt.current_version, Some(4));
            assert_eq!(prompt.recovery, Recovery::ReloadAndRetry);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    // Exactly one round-trip: a conflict is never silently re-issued.
    assert_eq!(transport_b.request_count(), 1);
}

#[test]
fn two_tabs_agree_on_the_badge() {
    let bus = TabBus::new();
    let sub_a = bus.subscribe().expect("tab a");
    let sub_b = bus.subscribe().expect("tab b");
    let mut tab_a = NotificationReconciler::new(MemorySummaryStore::new());
    let mut tab_b = NotificationReconciler::new(MemorySummaryStore::new());

    // Tab A holds the live push connection and mirrors what it receives.
    let event = NotificationEvent::unread(NotificationId(7), json!({ "task_id": 1 }), 100);
    tab_a.apply_incoming(event.clone());
    bus.publish(sub_a.tab_id(), &TabMessage::NewNotification { data: event })
        .expect("publish");

    assert!(sub_a.try_recv().is_err(), "no echo to the origin tab");
    for message in sub_b.drain() {
        tab_b.apply_tab_message(message);
    }
    assert_eq!(tab_a.unread_count(), 1);
    assert_eq!(tab_b.unread_count(), 1);

    // Tab B marks it read and broadcasts; A converges.
    tab_b.mark_read(NotificationId(7));
    bus.publish(
        sub_b.tab_id(),
        &TabMessage::MarkRead {
            id: NotificationId(7),
        },
    )
    .expect("publish");
    for message in sub_a.drain() {
        tab_a.apply_tab_message(message);
    }
    assert_eq!(tab_a.unread_count(), 0);
    assert_eq!(tab_b.unread_count(), 0);
}

#[test]
fn duplicate_broadcast_delivery_is_harmless() {
    let mut reconciler = NotificationReconciler::new(MemorySummaryStore::new());
    let event = NotificationEvent::unread(NotificationId(9), json!({}), 0);

    // The medium is at-least-once; the same broadcast lands twice.
    reconciler.apply_tab_message(TabMessage::NewNotification { data: event.clone() });
    reconciler.apply_tab_message(TabMessage::NewNotification { data: event });
    assert_eq!(reconciler.unread_count(), 1);
    assert_eq!(reconciler.items().len(), 1);
}

#[test]
fn plate_task_completes_only_after_every_artifact_is_confirmed() {
    let transport = RecordingTransport::default();
    let wf = workflow(&transport);

    let mut task = pending_task(2, 5);
    task.status = TaskStatus::InProgress;
    task.task_type = TaskType::PlateMaking;
    task.artifacts = vec![Artifact {
        kind: ArtifactKind::Die,
        name: "carton die 44".into(),
        confirmed: false,
    }];

    let err = wf.complete(&task, CompleteOptions::default()).unwrap_err();
    assert!(matches!(err, WorkflowError::CannotComplete { .. }));
    assert_eq!(transport.request_count(), 0, "blocked before any round-trip");

    task.artifacts[0].confirmed = true;
    transport.push_response(Ok(task_json(2, 6, "completed")));
    let done = wf.complete(&task, CompleteOptions::default()).expect("complete");
    assert_eq!(done.status, TaskStatus::Completed);
}

#[test]
fn split_replaces_one_task_with_children_or_nothing() {
    let transport = RecordingTransport::default();
    let wf = workflow(&transport);
    let task = pending_task(3, 2);

    // Quantities that do not sum to the parent never reach the wire.
    let err = wf
        .split(
            &task,
            vec![SplitChild::with_quantity(300), SplitChild::with_quantity(150)],
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Split(_)));
    assert_eq!(transport.request_count(), 0);

    transport.push_response(Ok(task_json(3, 3, "cancelled")));
    wf.split(
        &task,
        vec![SplitChild::with_quantity(300), SplitChild::with_quantity(200)],
    )
    .expect("valid split");
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn batch_cancel_partial_failure_reports_both_sides() {
    let transport = RecordingTransport::with_responses(vec![
        Ok(task_json(1, 5, "cancelled")),
        Err(TransportError {
            status: 409,
            body: json!({ "detail": "task updated by another operator" }),
        }),
    ]);
    let wf = workflow(&transport);

    let report = wf
        .cancel_batch(
            &[pending_task(1, 4), pending_task(2, 7)],
            "customer withdrew the order",
        )
        .expect("batch runs");
    assert_eq!(report.cancelled.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, TaskId(2));
    assert!(matches!(report.failed[0].1, WorkflowError::Conflict(_)));
}
