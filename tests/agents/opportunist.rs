#[path = "../common/mod.rs"]
mod common;

use common::{Fixture, payload};
use quorum::agents::Opportunist;
use quorum::core::error::QuorumError;
use quorum::core::oracle::ScriptedOracle;
use quorum::core::records::{self, EventType, NewDocument, NewEvent};
use quorum::core::tasks::{self, NewTask, TaskQuery};

#[test]
fn empty_store_has_nothing_to_scan() {
    let fx = Fixture::new();
    let oracle = ScriptedOracle::new();
    let summary = fx.run(&Opportunist::default(), &oracle).unwrap();
    assert_eq!(summary.message, "Nothing to scan.");
    assert_eq!(oracle.call_count(), 0);
}

#[test]
fn opportunities_become_events_and_actionable_ones_become_tasks() {
    let fx = Fixture::new();
    records::insert_document(
        &fx.store,
        NewDocument::new("note", "human", "Invoice script", "we wrote a csv invoice exporter"),
    )
    .unwrap();
    records::insert_event(
        &fx.store,
        NewEvent::new(EventType::Connection, "connector", "Exporter matches finance ask"),
    )
    .unwrap();
    fx.turn("c1", "finance wants monthly csv invoices");

    let oracle = ScriptedOracle::with_responses([r#"[
        {"title": "Reuse invoice exporter", "description": "finance ask is already solved",
         "effort": "low", "impact": "high", "time_sensitive": true,
         "suggested_action": "Hand exporter to finance", "confidence": 0.9},
        {"title": "Blog about it", "description": "nice story", "impact": "low"},
        {"title": "Long shot", "description": "unlikely", "confidence": 0.3,
         "suggested_action": "Rewrite billing"}
    ]"#]);
    let summary = fx.run(&Opportunist::default(), &oracle).unwrap();
    assert_eq!(
        summary.message,
        "Found 3 opportunities, created 2 events and 1 tasks."
    );
    assert_eq!(summary.stored, 3);

    let sent = payload(&oracle, 0);
    assert_eq!(sent["connector_insights"][0]["title"], "Exporter matches finance ask");
    assert_eq!(sent["documents"][0]["title"], "Invoice script");

    let events = fx.events_by("opportunist", EventType::Opportunity);
    assert_eq!(events.len(), 2);
    let reuse = events
        .iter()
        .find(|e| e.title == "Reuse invoice exporter")
        .unwrap();
    assert_eq!(reuse.metadata["impact"], "high");
    assert_eq!(reuse.metadata["time_sensitive"], true);

    let open = tasks::query_tasks(&fx.store, &TaskQuery::non_terminal(10)).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].title, "Hand exporter to finance");
    assert_eq!(open[0].priority, 2);
    assert_eq!(open[0].metadata["source_event_id"], reuse.id.as_str());
    assert_eq!(open[0].metadata["source"], "opportunist");
}

#[test]
fn existing_task_is_refreshed_not_counted() {
    let fx = Fixture::new();
    tasks::upsert_task(&fx.store, NewTask::new("Hand exporter to finance")).unwrap();

    let oracle = ScriptedOracle::with_responses([r#"[
        {"title": "Reuse invoice exporter", "impact": "medium",
         "suggested_action": "Hand exporter to finance"}
    ]"#]);
    let summary = fx.run(&Opportunist::default(), &oracle).unwrap();
    assert_eq!(
        summary.message,
        "Found 1 opportunities, created 1 events and 0 tasks."
    );
    assert_eq!(
        tasks::query_tasks(&fx.store, &TaskQuery::non_terminal(10))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn fenced_empty_list_finds_nothing() {
    let fx = Fixture::new();
    fx.turn("c1", "quiet day");
    let oracle = ScriptedOracle::with_responses(["```json\n[]\n```"]);
    let summary = fx.run(&Opportunist::default(), &oracle).unwrap();
    assert_eq!(
        summary.message,
        "Found 0 opportunities, created 0 events and 0 tasks."
    );
    assert!(fx.events_by("opportunist", EventType::Opportunity).is_empty());
    assert!(
        tasks::query_tasks(&fx.store, &TaskQuery::default())
            .unwrap()
            .is_empty()
    );
}

#[test]
fn shared_suggested_action_yields_one_task() {
    let fx = Fixture::new();
    fx.turn("c1", "cert expires soon, also the staging cert");
    let oracle = ScriptedOracle::with_responses([r#"[
        {"title": "Prod cert", "impact": "high", "suggested_action": "Renew SSL cert"},
        {"title": "Staging cert", "impact": "low", "suggested_action": "Renew SSL cert"}
    ]"#]);
    let summary = fx.run(&Opportunist::default(), &oracle).unwrap();
    assert_eq!(
        summary.message,
        "Found 2 opportunities, created 2 events and 1 tasks."
    );

    let open = tasks::query_tasks(&fx.store, &TaskQuery::non_terminal(10)).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].title, "Renew SSL cert");
    // The later finding refreshed the task.
    assert_eq!(open[0].priority, 4);
}

#[test]
fn store_failure_while_persisting_aborts_the_run() {
    let fx = Fixture::new();
    fx.turn("c1", "cert expires soon");
    let conn = rusqlite::Connection::open(fx.store.db_path()).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER refuse_tasks BEFORE INSERT ON tasks
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
    )
    .unwrap();
    drop(conn);

    let oracle = ScriptedOracle::with_responses([r#"[
        {"title": "Prod cert", "impact": "high", "suggested_action": "Renew SSL cert"}
    ]"#]);
    let err = fx.run(&Opportunist::default(), &oracle).unwrap_err();
    assert!(matches!(err, QuorumError::Sqlite(_)), "{err}");
    assert!(!err.is_item_recoverable());
}
