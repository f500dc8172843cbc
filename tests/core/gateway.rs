#[path = "../common/mod.rs"]
mod common;

use common::Fixture;
use quorum::core::gateway::{self, Finding, FindingBrief};
use quorum::core::records::{self, EventType, NewDocument, NewEvent};
use serde_json::json;

fn emit(fx: &Fixture, actor: &str, event_type: EventType, title: &str) -> String {
    records::insert_event(&fx.store, NewEvent::new(event_type, actor, title))
        .unwrap()
        .id
}

#[test]
fn recent_events_respects_actors_and_window() {
    let fx = Fixture::new();
    emit(&fx, "connector", EventType::Connection, "old");
    fx.advance_hours(3);
    let fresh = emit(&fx, "connector", EventType::Connection, "fresh");
    emit(&fx, "opportunist", EventType::Opportunity, "other actor");

    let events = gateway::recent_events(&fx.store, &["connector"], 2, 10).unwrap();
    let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![fresh.as_str()]);

    assert!(gateway::recent_events(&fx.store, &[], 24, 10).unwrap().is_empty());
}

#[test]
fn flagged_for_excludes_own_events_and_unflagged_ones() {
    let fx = Fixture::new();
    let for_executor = records::insert_event(
        &fx.store,
        NewEvent::new(EventType::Connection, "connector", "for executor")
            .metadata(json!({ "considered_agents": ["executor", "strategist"] })),
    )
    .unwrap();
    records::insert_event(
        &fx.store,
        NewEvent::new(EventType::Connection, "connector", "not flagged")
            .metadata(json!({ "considered_agents": ["strategist"] })),
    )
    .unwrap();
    records::insert_event(
        &fx.store,
        NewEvent::new(EventType::Accountability, "executor", "self flagged")
            .metadata(json!({ "considered_agents": ["executor"] })),
    )
    .unwrap();
    records::insert_event(
        &fx.store,
        NewEvent::new(EventType::Insight, "strategist", "no metadata"),
    )
    .unwrap();

    let flagged = gateway::flagged_for(&fx.store, "executor", 24).unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].id, for_executor.id);

    fx.advance_hours(25);
    assert!(gateway::flagged_for(&fx.store, "executor", 24).unwrap().is_empty());
}

#[test]
fn recent_findings_merges_newest_first_and_caps() {
    let fx = Fixture::new();
    emit(&fx, "strategist", EventType::Insight, "first");
    fx.advance_hours(1);
    records::insert_document(
        &fx.store,
        NewDocument::new("reflection", "strategist", "second", "body"),
    )
    .unwrap();
    fx.advance_hours(1);
    emit(&fx, "strategist", EventType::Insight, "third");

    let findings = gateway::recent_findings(&fx.store, &["strategist"], 24, 2).unwrap();
    let titles: Vec<&str> = findings.iter().map(Finding::title).collect();
    assert_eq!(titles, vec!["third", "second"]);
    assert!(matches!(findings[1], Finding::Document(_)));
    assert_eq!(findings[0].author(), "strategist");
}

#[test]
fn brief_truncates_description() {
    let fx = Fixture::new();
    let event = records::insert_event(
        &fx.store,
        NewEvent::new(EventType::Connection, "connector", "long").description("x".repeat(900)),
    )
    .unwrap();
    let brief = FindingBrief::from_event(&event, 500);
    assert_eq!(brief.agent, "connector");
    assert_eq!(brief.event_type, "connection");
    assert_eq!(brief.description.chars().count(), 500);
    assert_eq!(brief.created_at, "2026-01-15T12:00:00Z");
}
