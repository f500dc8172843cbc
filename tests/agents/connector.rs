#[path = "../common/mod.rs"]
mod common;

use common::{Fixture, payload};
use quorum::agents::Connector;
use quorum::core::error::QuorumError;
use quorum::core::oracle::ScriptedOracle;
use quorum::core::records::{self, DocumentQuery, EventType, NewDocument};

fn seed_memory(fx: &Fixture) -> String {
    records::insert_document(
        &fx.store,
        NewDocument::new(
            "note",
            "human",
            "Billing queue migration",
            "billing queue migration checklist",
        ),
    )
    .unwrap()
    .id
}

#[test]
fn connects_turn_to_memory_and_leaves_frontier() {
    let fx = Fixture::new();
    let doc_id = seed_memory(&fx);
    fx.advance_hours(1);
    let turn_id = fx.turn("c1", "the billing queue migration slipped again");

    let oracle = ScriptedOracle::with_responses([format!(
        r#"```json
[
  {{"title": "Migration slip echoes checklist", "description": "same blocker", "confidence": 0.8, "related_ids": ["{doc_id}"]}},
  {{"title": "Weak hunch", "description": "maybe", "confidence": 0.2, "related_ids": []}}
]
```"#
    )]);

    let summary = fx.run(&Connector::default(), &oracle).unwrap();
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.stored, 1);
    assert_eq!(summary.message, "Processed 1 turns, created 1 connections.");

    let sent = payload(&oracle, 0);
    assert_eq!(sent["turn"]["id"], turn_id.as_str());
    assert_eq!(sent["candidates"][0]["ref_id"], doc_id.as_str());

    let events = fx.events_by("connector", EventType::Connection);
    assert_eq!(events.len(), 1);
    let ev = &events[0];
    assert_eq!(ev.title, "Migration slip echoes checklist");
    assert_eq!(ev.ref_ids, vec![turn_id.clone(), doc_id.clone()]);
    assert_eq!(ev.metadata["source"], "connector");
    assert_eq!(
        ev.metadata["considered_agents"],
        serde_json::json!(["strategist", "executor"])
    );

    let rollups = records::query_documents(
        &fx.store,
        &DocumentQuery {
            doc_type: Some("summary".into()),
            ..DocumentQuery::default()
        },
    )
    .unwrap();
    assert_eq!(rollups.len(), 1);
    assert!(rollups[0].tags.contains("auto-summary"));

    // Second pass: the turn is off the frontier, so nothing is sent.
    let again = ScriptedOracle::new();
    let summary = fx.run(&Connector::default(), &again).unwrap();
    assert_eq!(summary.message, "No unprocessed turns.");
    assert_eq!(again.call_count(), 0);
}

#[test]
fn findings_below_threshold_store_nothing() {
    let fx = Fixture::new();
    seed_memory(&fx);
    fx.turn("c1", "billing queue migration status");

    let oracle = ScriptedOracle::with_responses([
        r#"[{"title": "meh", "confidence": 0.49}, {"title": "no confidence at all"}]"#,
    ]);
    let summary = fx.run(&Connector::default(), &oracle).unwrap();
    assert_eq!(summary.stored, 0);
    assert!(fx.events_by("connector", EventType::Connection).is_empty());
    assert!(
        records::query_documents(&fx.store, &DocumentQuery::default())
            .unwrap()
            .iter()
            .all(|d| d.doc_type != "summary")
    );
}

#[test]
fn turns_without_recall_hits_skip_the_oracle() {
    let fx = Fixture::new();
    fx.turn("c1", "completely unrelated zebra chatter");
    let oracle = ScriptedOracle::new();
    let summary = fx.run(&Connector::default(), &oracle).unwrap();
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.stored, 0);
    assert_eq!(oracle.call_count(), 0);
}

#[test]
fn timeout_reads_as_empty_reply_and_keeps_turn_on_frontier() {
    let fx = Fixture::new();
    seed_memory(&fx);
    fx.turn("c1", "billing queue migration again");

    let oracle = ScriptedOracle::new();
    oracle.push_timeout();
    let summary = fx.run(&Connector::default(), &oracle).unwrap();
    assert_eq!(summary.stored, 0);

    let retry = ScriptedOracle::new();
    let summary = fx.run(&Connector::default(), &retry).unwrap();
    assert_eq!(summary.scanned, 1);
    assert_eq!(retry.call_count(), 1);
}

#[test]
fn unavailable_oracle_aborts_the_run() {
    let fx = Fixture::new();
    seed_memory(&fx);
    fx.turn("c1", "billing queue migration again");

    let oracle = ScriptedOracle::new();
    oracle.push_unavailable();
    let err = fx.run(&Connector::default(), &oracle).unwrap_err();
    assert!(matches!(err, QuorumError::OracleUnavailable(_)));
    assert!(fx.events_by("connector", EventType::Connection).is_empty());
}

#[test]
fn flagged_events_reach_the_payload() {
    let fx = Fixture::new();
    seed_memory(&fx);
    records::insert_event(
        &fx.store,
        records::NewEvent::new(EventType::Insight, "strategist", "Look at billing")
            .metadata(serde_json::json!({ "considered_agents": ["connector"] })),
    )
    .unwrap();
    fx.turn("c1", "billing queue migration plan");

    let oracle = ScriptedOracle::with_responses(["[]"]);
    fx.run(&Connector::default(), &oracle).unwrap();
    let sent = payload(&oracle, 0);
    assert_eq!(sent["flagged_for_you"][0]["title"], "Look at billing");
    assert_eq!(sent["other_agent_findings"][0]["agent"], "strategist");
}
