#[path = "../common/mod.rs"]
mod common;

use common::{Fixture, T0, payload};
use quorum::agents::Executor;
use quorum::core::oracle::ScriptedOracle;
use quorum::core::records::EventType;
use quorum::core::tasks::{self, NewTask, TaskQuery, TaskStatus};
use quorum::core::time::from_epoch_secs;

#[test]
fn plan_creates_updates_and_notes() {
    let fx = Fixture::new();
    let (existing, _) = tasks::upsert_task(&fx.store, NewTask::new("Draft pricing page")).unwrap();
    fx.turn("c1", "We need to ship the beta by the 20th. Sam is starting the pricing page.");

    let plan = format!(
        r#"{{
  "new_tasks": [
    {{"title": "Ship beta", "priority": "1", "due_at": "2026-01-20", "owner": "sam", "confidence": 0.9}},
    {{"title": "Maybe rename product", "confidence": 0.1}},
    "garbage"
  ],
  "updated_tasks": [
    {{"task_id": "{existing}", "status": "in_progress"}},
    {{"task_id": "missing-task", "status": "done"}}
  ],
  "accountability_events": [
    {{"title": "Check pricing owner", "description": "Sam took it verbally"}}
  ]
}}"#
    );
    let oracle = ScriptedOracle::with_responses([plan]);
    let summary = fx.run(&Executor::default(), &oracle).unwrap();

    assert_eq!(
        summary.message,
        "Created 1 tasks, updated 1, logged 1 accountability events."
    );
    assert_eq!(summary.stored, 3);
    assert_eq!(summary.failed, 2);

    let open = tasks::query_tasks(&fx.store, &TaskQuery::non_terminal(10)).unwrap();
    let beta = open.iter().find(|t| t.title == "Ship beta").unwrap();
    assert_eq!(beta.priority, 1);
    assert_eq!(beta.owner.as_deref(), Some("sam"));
    assert_eq!(beta.due_at, Some(from_epoch_secs(T0 + 4 * 86_400 + 43_200)));
    assert!(open.iter().all(|t| t.title != "Maybe rename product"));

    let pricing = tasks::get_task(&fx.store, &existing).unwrap().unwrap();
    assert_eq!(pricing.status, TaskStatus::InProgress);

    let notices = fx.events_by("executor", EventType::Accountability);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].metadata["kind"], "oracle");

    let sent = payload(&oracle, 0);
    assert_eq!(sent["recent_turns"].as_array().unwrap().len(), 1);
    assert_eq!(sent["open_tasks"][0]["title"], "Draft pricing page");
}

#[test]
fn rediscovered_task_counts_as_update() {
    let fx = Fixture::new();
    tasks::upsert_task(&fx.store, NewTask::new("Ship beta")).unwrap();
    fx.turn("c1", "beta still on track");

    let oracle =
        ScriptedOracle::with_responses([r#"{"new_tasks": [{"title": "Ship beta", "priority": 2}]}"#]);
    let summary = fx.run(&Executor::default(), &oracle).unwrap();
    assert_eq!(summary.message, "Created 0 tasks, updated 1, logged 0 accountability events.");
    assert_eq!(
        tasks::query_tasks(&fx.store, &TaskQuery::non_terminal(10))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn quiet_store_only_runs_rule_based_checks() {
    let fx = Fixture::new();
    tasks::upsert_task(
        &fx.store,
        NewTask::new("Renew domain").due_at(Some(from_epoch_secs(T0 + 3600))),
    )
    .unwrap();
    fx.advance_days(2);

    let oracle = ScriptedOracle::new();
    let summary = fx.run(&Executor::default(), &oracle).unwrap();
    assert_eq!(oracle.call_count(), 0);
    assert_eq!(
        summary.message,
        "Created 0 tasks, updated 0, logged 1 accountability events."
    );
    let events = fx.events_by("executor", EventType::Accountability);
    assert_eq!(events[0].title, "Overdue: Renew domain");
}

#[test]
fn unparseable_plan_changes_nothing() {
    let fx = Fixture::new();
    fx.turn("c1", "some chatter");
    let oracle = ScriptedOracle::with_responses(["Sure! Here are your tasks: none."]);
    let summary = fx.run(&Executor::default(), &oracle).unwrap();
    assert_eq!(summary.stored, 0);
    assert_eq!(summary.failed, 0);
    assert!(
        tasks::query_tasks(&fx.store, &TaskQuery::default())
            .unwrap()
            .is_empty()
    );
}

#[test]
fn unbounded_lookback_reaches_every_turn() {
    let fx = Fixture::new();
    fx.turn("c1", "ancient history");
    fx.advance_days(400);
    let oracle = ScriptedOracle::with_responses(["{}"]);
    let executor = Executor {
        lookback_hours: u32::MAX,
    };
    let summary = fx.run(&executor, &oracle).unwrap();
    assert_eq!(summary.stored, 0);
    assert_eq!(payload(&oracle, 0)["recent_turns"].as_array().unwrap().len(), 1);
}
