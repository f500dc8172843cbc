#[path = "../common/mod.rs"]
mod common;

use common::{Fixture, payload};
use quorum::agents::Strategist;
use quorum::core::config::ReflectionType;
use quorum::core::oracle::ScriptedOracle;
use quorum::core::records::{self, DocumentQuery, EventType};
use quorum::core::tasks::{self, NewTask};

#[test]
fn nothing_to_reflect_on() {
    let fx = Fixture::new();
    let oracle = ScriptedOracle::new();
    let summary = fx.run(&Strategist::default(), &oracle).unwrap();
    assert_eq!(summary.message, "Nothing to reflect on.");
    assert_eq!(oracle.call_count(), 0);
}

#[test]
fn weekly_reflection_is_stored_and_announced() {
    let fx = Fixture::new();
    fx.turn("c1", "we keep context switching");
    fx.turn("c2", "launch prep");
    tasks::upsert_task(&fx.store, NewTask::new("Launch checklist")).unwrap();

    let oracle = ScriptedOracle::with_responses([r#"{
        "title": "Week 3: Too many threads",
        "observations": [
            {"theme": "Fragmentation", "detail": "two conversations, one goal", "evidence": "c1, c2", "confidence": 0.8},
            {"theme": "Guess", "detail": "weak signal", "confidence": 0.2}
        ],
        "blocked_items": [{"title": "Launch checklist", "hypothesis": "no owner"}],
        "suggested_focus": ["Pick one launch owner", 42, ""]
    }"#]);
    let summary = fx
        .run(&Strategist::new(ReflectionType::Weekly), &oracle)
        .unwrap();
    assert_eq!(
        summary.message,
        "Created weekly reflection with 1 observations, 1 blocked items, 1 focus areas."
    );
    assert_eq!(summary.stored, 1);

    let sent = payload(&oracle, 0);
    assert_eq!(sent["reflection_type"], "weekly");
    assert_eq!(sent["period_hours"], 168);
    assert_eq!(sent["conversations"].as_array().unwrap().len(), 2);
    assert_eq!(sent["tasks"][0]["title"], "Launch checklist");

    let docs = records::query_documents(
        &fx.store,
        &DocumentQuery {
            doc_type: Some("reflection".into()),
            ..DocumentQuery::default()
        },
    )
    .unwrap();
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.title, "Week 3: Too many threads");
    assert_eq!(doc.source, "strategist");
    for tag in ["weekly", "reflection", "strategist"] {
        assert!(doc.tags.contains(tag), "{tag}");
    }
    assert!(doc.content.contains("**Fragmentation**: two conversations, one goal"));
    assert!(!doc.content.contains("weak signal"));
    assert!(doc.content.contains("- **Launch checklist**: no owner"));
    assert!(doc.content.contains("- Pick one launch owner"));

    let insights = fx.events_by("strategist", EventType::Insight);
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].metadata["document_id"], doc.id.as_str());
    assert_eq!(insights[0].metadata["reflection_type"], "weekly");
}

#[test]
fn unparseable_reply_writes_nothing() {
    let fx = Fixture::new();
    fx.turn("c1", "hello");
    let oracle = ScriptedOracle::with_responses(["I could not decide."]);
    let summary = fx.run(&Strategist::default(), &oracle).unwrap();
    assert_eq!(summary.message, "LLM returned no parseable reflection.");
    assert!(fx.events_by("strategist", EventType::Insight).is_empty());
}

#[test]
fn untitled_reflection_gets_default_title() {
    let fx = Fixture::new();
    fx.turn("c1", "hello");
    let oracle = ScriptedOracle::with_responses([r#"{"suggested_focus": ["Rest"]}"#]);
    fx.run(&Strategist::default(), &oracle).unwrap();
    let insights = fx.events_by("strategist", EventType::Insight);
    assert_eq!(insights[0].title, "Daily Reflection");
}
