#[path = "../common/mod.rs"]
mod common;

use common::{Fixture, payload};
use quorum::agents::DevilsAdvocate;
use quorum::core::config::Severity;
use quorum::core::oracle::ScriptedOracle;
use quorum::core::records::{self, EventType, NewEvent};
use quorum::core::tasks::{self, NewTask};

fn decision(fx: &Fixture, title: &str) -> String {
    records::insert_event(
        &fx.store,
        NewEvent::new(EventType::Decision, "human", title).description("we decided"),
    )
    .unwrap()
    .id
}

#[test]
fn critiques_reference_their_targets_and_clear_the_frontier() {
    let fx = Fixture::new();
    let decision_id = decision(&fx, "Move to Postgres");
    let (task_id, _) =
        tasks::upsert_task(&fx.store, NewTask::new("Rewrite auth").priority(1)).unwrap();
    tasks::upsert_task(&fx.store, NewTask::new("Tidy README").priority(4)).unwrap();

    let oracle = ScriptedOracle::with_responses([r#"[
        {"target": "Move to Postgres", "assumption": "load will grow",
         "risk": "migration downtime", "alternative": "tune sqlite", "severity": "high"},
        {"target": "Rewrite auth", "risk": "scope", "severity": "whatever"}
    ]"#]);
    let summary = fx.run(&DevilsAdvocate::default(), &oracle).unwrap();
    assert_eq!(
        summary.message,
        "Reviewed 1 decisions + 1 tasks, wrote 2 critiques."
    );

    let sent = payload(&oracle, 0);
    assert_eq!(sent["decisions_and_plans"][0]["id"], decision_id.as_str());
    let hot = sent["high_priority_tasks"].as_array().unwrap();
    assert_eq!(hot.len(), 1);
    assert_eq!(hot[0]["title"], "Rewrite auth");

    let critiques = fx.events_by("devils_advocate", EventType::Critique);
    let on_decision = critiques
        .iter()
        .find(|c| c.title == "Critique: Move to Postgres")
        .unwrap();
    assert_eq!(on_decision.ref_ids, vec![decision_id]);
    assert_eq!(on_decision.metadata["severity"], "high");
    assert!(on_decision.description.starts_with("Assumption: load will grow"));
    let on_task = critiques
        .iter()
        .find(|c| c.title == "Critique: Rewrite auth")
        .unwrap();
    assert_eq!(on_task.ref_ids, vec![task_id]);
    assert_eq!(on_task.metadata["severity"], "medium");

    let again = ScriptedOracle::new();
    let summary = fx.run(&DevilsAdvocate::default(), &again).unwrap();
    assert_eq!(summary.message, "Nothing to critique.");
    assert_eq!(again.call_count(), 0);
}

#[test]
fn severity_floor_filters_critiques() {
    let mut fx = Fixture::new();
    fx.settings.gates.devils_advocate_min_severity = Severity::High;
    decision(&fx, "Hire contractor");

    let oracle = ScriptedOracle::with_responses([r#"[
        {"target": "Hire contractor", "risk": "cost", "severity": "low"},
        {"target": "Hire contractor", "risk": "ip ownership", "severity": "critical"}
    ]"#]);
    let summary = fx.run(&DevilsAdvocate::default(), &oracle).unwrap();
    assert_eq!(summary.stored, 1);
    let critiques = fx.events_by("devils_advocate", EventType::Critique);
    assert_eq!(critiques[0].metadata["severity"], "critical");
}

#[test]
fn uncritiqued_decisions_stay_on_the_frontier() {
    let fx = Fixture::new();
    decision(&fx, "Adopt monorepo");

    let oracle = ScriptedOracle::with_responses(["[]"]);
    fx.run(&DevilsAdvocate::default(), &oracle).unwrap();

    let retry = ScriptedOracle::new();
    let summary = fx.run(&DevilsAdvocate::default(), &retry).unwrap();
    assert_eq!(retry.call_count(), 1);
    assert_eq!(summary.scanned, 1);
}

#[test]
fn decisions_outside_the_window_are_ignored() {
    let fx = Fixture::new();
    decision(&fx, "Old call");
    fx.advance_hours(49);
    let oracle = ScriptedOracle::new();
    let summary = fx.run(&DevilsAdvocate::default(), &oracle).unwrap();
    assert_eq!(summary.message, "Nothing to critique.");
}
