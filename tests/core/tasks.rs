#[path = "../common/mod.rs"]
mod common;

use common::{Fixture, T0};
use quorum::core::error::QuorumError;
use quorum::core::records::EventType;
use quorum::core::tasks::{
    self, NewTask, TaskQuery, TaskStatus, UpsertOutcome, emit_accountability_events,
};
use quorum::core::time::from_epoch_secs;
use serde_json::json;

#[test]
fn task_lifecycle_keeps_completed_at_in_step_with_done() {
    let fx = Fixture::new();
    let (id, outcome) = tasks::upsert_task(&fx.store, NewTask::new("Write launch post")).unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);

    let task = tasks::get_task(&fx.store, &id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Open);
    assert_eq!(task.priority, tasks::DEFAULT_PRIORITY);
    assert!(task.completed_at.is_none());

    fx.advance_hours(1);
    let task = tasks::transition(&fx.store, &id, TaskStatus::InProgress).unwrap();
    assert_eq!(task.updated_at, from_epoch_secs(T0 + 3600));
    assert!(task.completed_at.is_none());

    fx.advance_hours(1);
    let task = tasks::transition(&fx.store, &id, TaskStatus::Done).unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(task.completed_at, Some(from_epoch_secs(T0 + 7200)));
}

#[test]
fn illegal_transitions_are_rejected_without_writing() {
    let fx = Fixture::new();
    let (id, _) = tasks::upsert_task(&fx.store, NewTask::new("Audit logs")).unwrap();

    let err = tasks::transition(&fx.store, &id, TaskStatus::Done).unwrap_err();
    assert!(matches!(err, QuorumError::InvalidTransition { .. }));
    assert_eq!(
        tasks::get_task(&fx.store, &id).unwrap().unwrap().status,
        TaskStatus::Open
    );

    tasks::transition(&fx.store, &id, TaskStatus::InProgress).unwrap();
    tasks::transition(&fx.store, &id, TaskStatus::Cancelled).unwrap();
    let err = tasks::transition(&fx.store, &id, TaskStatus::InProgress).unwrap_err();
    assert!(err.is_item_recoverable());

    let err = tasks::transition(&fx.store, "no-such-task", TaskStatus::Done).unwrap_err();
    assert!(matches!(err, QuorumError::NotFound(_)));
}

#[test]
fn same_status_transition_is_a_noop() {
    let fx = Fixture::new();
    let (id, _) = tasks::upsert_task(&fx.store, NewTask::new("Noop")).unwrap();
    fx.advance_hours(5);
    let task = tasks::transition(&fx.store, &id, TaskStatus::Open).unwrap();
    assert_eq!(task.updated_at, from_epoch_secs(T0));
}

#[test]
fn blocked_tasks_can_resume() {
    let fx = Fixture::new();
    let (id, _) = tasks::upsert_task(&fx.store, NewTask::new("Migrate DB")).unwrap();
    for next in [TaskStatus::InProgress, TaskStatus::Blocked, TaskStatus::InProgress, TaskStatus::Done] {
        tasks::transition(&fx.store, &id, next).unwrap();
    }
}

#[test]
fn upsert_refreshes_open_task_with_same_title() {
    let fx = Fixture::new();
    let (id, _) = tasks::upsert_task(
        &fx.store,
        NewTask::new("Renew TLS cert")
            .owner(Some("sam".into()))
            .metadata(json!({ "source": "executor" })),
    )
    .unwrap();

    fx.advance_hours(2);
    let (again, outcome) = tasks::upsert_task(
        &fx.store,
        NewTask::new("Renew TLS cert")
            .description("expires friday")
            .priority(1)
            .metadata(json!({ "source_event_id": "ev1" })),
    )
    .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);
    assert_eq!(again, id);

    let task = tasks::get_task(&fx.store, &id).unwrap().unwrap();
    assert_eq!(task.description, "expires friday");
    assert_eq!(task.priority, 1);
    assert_eq!(task.owner.as_deref(), Some("sam"));
    assert_eq!(task.metadata["source"], "executor");
    assert_eq!(task.metadata["source_event_id"], "ev1");
    assert_eq!(task.updated_at, from_epoch_secs(T0 + 7200));

    // Surrounding whitespace is trimmed; anything else must match exactly.
    let (padded, outcome) =
        tasks::upsert_task(&fx.store, NewTask::new("  Renew TLS cert ")).unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);
    assert_eq!(padded, id);

    let (_, outcome) = tasks::upsert_task(&fx.store, NewTask::new("renew tls cert")).unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);
    let (_, outcome) = tasks::upsert_task(&fx.store, NewTask::new("Renew TLS cert.")).unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);
}

#[test]
fn upsert_ignores_terminal_tasks_and_blank_titles() {
    let fx = Fixture::new();
    let (id, _) = tasks::upsert_task(&fx.store, NewTask::new("Ship v1")).unwrap();
    tasks::transition(&fx.store, &id, TaskStatus::InProgress).unwrap();
    tasks::transition(&fx.store, &id, TaskStatus::Done).unwrap();

    let (fresh, outcome) = tasks::upsert_task(&fx.store, NewTask::new("Ship v1")).unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);
    assert_ne!(fresh, id);

    let err = tasks::upsert_task(&fx.store, NewTask::new("   ")).unwrap_err();
    assert!(matches!(err, QuorumError::Validation(_)));
}

#[test]
fn query_orders_by_priority_then_age() {
    let fx = Fixture::new();
    tasks::upsert_task(&fx.store, NewTask::new("low").priority(5)).unwrap();
    fx.advance_hours(1);
    tasks::upsert_task(&fx.store, NewTask::new("urgent").priority(1)).unwrap();
    fx.advance_hours(1);
    tasks::upsert_task(&fx.store, NewTask::new("urgent too").priority(1)).unwrap();

    let titles: Vec<String> = tasks::query_tasks(&fx.store, &TaskQuery::non_terminal(10))
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, vec!["urgent", "urgent too", "low"]);

    let hot = tasks::query_tasks(
        &fx.store,
        &TaskQuery {
            max_priority: Some(2),
            ..TaskQuery::default()
        },
    )
    .unwrap();
    assert_eq!(hot.len(), 2);
}

#[test]
fn overdue_and_stale_are_derived_from_the_clock() {
    let fx = Fixture::new();
    let due = from_epoch_secs(T0 + 86_400);
    let (overdue_id, _) =
        tasks::upsert_task(&fx.store, NewTask::new("Pay invoice").due_at(Some(due))).unwrap();
    let (done_id, _) =
        tasks::upsert_task(&fx.store, NewTask::new("Closed").due_at(Some(due))).unwrap();
    tasks::transition(&fx.store, &done_id, TaskStatus::InProgress).unwrap();
    tasks::transition(&fx.store, &done_id, TaskStatus::Done).unwrap();

    assert!(tasks::overdue_tasks(&fx.store).unwrap().is_empty());
    assert!(tasks::stale_tasks(&fx.store, 7).unwrap().is_empty());

    fx.advance_days(3);
    let overdue = tasks::overdue_tasks(&fx.store).unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, overdue_id);
    // Reading twice changes nothing.
    assert_eq!(tasks::overdue_tasks(&fx.store).unwrap(), overdue);

    fx.advance_days(5);
    let stale = tasks::stale_tasks(&fx.store, 7).unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, overdue_id);
}

#[test]
fn huge_stale_threshold_matches_nothing() {
    let fx = Fixture::new();
    tasks::upsert_task(&fx.store, NewTask::new("Old chore")).unwrap();
    fx.advance_days(30);
    assert!(tasks::stale_tasks(&fx.store, 200_000_000).unwrap().is_empty());
    assert!(tasks::stale_tasks(&fx.store, u32::MAX).unwrap().is_empty());
    assert_eq!(tasks::stale_tasks(&fx.store, 7).unwrap().len(), 1);
}

#[test]
fn accountability_events_reference_their_tasks() {
    let fx = Fixture::new();
    let (id, _) = tasks::upsert_task(
        &fx.store,
        NewTask::new("File taxes")
            .owner(Some("kai".into()))
            .due_at(Some(from_epoch_secs(T0))),
    )
    .unwrap();
    fx.advance_days(8);

    let report = emit_accountability_events(&fx.store, "executor", 7).unwrap();
    assert_eq!(report.overdue, 1);
    assert_eq!(report.stale, 1);
    assert_eq!(report.emitted(), 2);

    let events = fx.events_by("executor", EventType::Accountability);
    assert_eq!(events.len(), 2);
    for ev in &events {
        assert_eq!(ev.ref_ids, vec![id.clone()]);
        assert_eq!(ev.metadata["task_id"], id.as_str());
    }
    let overdue = events
        .iter()
        .find(|e| e.title == "Overdue: File taxes")
        .unwrap();
    assert_eq!(
        overdue.description,
        "Task 'File taxes' was due 2026-01-15 (8 day(s) ago) and is still in 'open' status. Owner: kai."
    );
    assert!(events.iter().any(|e| e.title == "Stale: File taxes"));

    // Every run nags again.
    let again = emit_accountability_events(&fx.store, "executor", 7).unwrap();
    assert_eq!(again.emitted(), 2);
}

#[test]
fn status_parsing_is_lenient_about_separators() {
    assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
    assert_eq!("in progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
    assert!("finished".parse::<TaskStatus>().is_err());
}
