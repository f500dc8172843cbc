//! Cross-agent context: what other agents found recently, and what they
//! flagged for a particular agent.
//!
//! Flagging is a convention on event metadata, not a queue. An event whose
//! `metadata.considered_agents` array names an agent is "for" that agent
//! for as long as it stays inside the caller's window.

use crate::core::error::QuorumError;
use crate::core::records::{self, Document, DocumentQuery, Event, EventQuery};
use crate::core::store::Store;
use crate::core::time::{rfc3339, window_start};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata key listing the agents an event is addressed to.
pub const FLAG_KEY: &str = "considered_agents";

/// Events whose `actor` is one of `agents`, newest first.
pub fn recent_events(
    store: &Store,
    agents: &[&str],
    window_hours: u32,
    limit: usize,
) -> Result<Vec<Event>, QuorumError> {
    if agents.is_empty() {
        return Ok(Vec::new());
    }
    records::query_events(
        store,
        &EventQuery {
            since: Some(window_start(store.now(), window_hours)),
            actors: agents.iter().map(|a| a.to_string()).collect(),
            limit,
            ..EventQuery::default()
        },
    )
}

/// Documents whose `source` is one of `sources`, newest first.
pub fn recent_documents(
    store: &Store,
    sources: &[&str],
    window_hours: u32,
    limit: usize,
) -> Result<Vec<Document>, QuorumError> {
    if sources.is_empty() {
        return Ok(Vec::new());
    }
    records::query_documents(
        store,
        &DocumentQuery {
            since: Some(window_start(store.now(), window_hours)),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            limit,
            ..DocumentQuery::default()
        },
    )
}

/// A finding from another agent: either an event it emitted or a document
/// it wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    Event(Event),
    Document(Document),
}

impl Finding {
    pub fn id(&self) -> &str {
        match self {
            Finding::Event(e) => &e.id,
            Finding::Document(d) => &d.id,
        }
    }

    pub fn author(&self) -> &str {
        match self {
            Finding::Event(e) => &e.actor,
            Finding::Document(d) => &d.source,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Finding::Event(e) => &e.title,
            Finding::Document(d) => &d.title,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Finding::Event(e) => e.created_at,
            Finding::Document(d) => d.created_at,
        }
    }
}

/// Events and documents authored by `agents` inside the window, merged
/// most-recent-first and capped at `limit` overall.
pub fn recent_findings(
    store: &Store,
    agents: &[&str],
    window_hours: u32,
    limit: usize,
) -> Result<Vec<Finding>, QuorumError> {
    let mut merged: Vec<Finding> = recent_events(store, agents, window_hours, limit)?
        .into_iter()
        .map(Finding::Event)
        .chain(
            recent_documents(store, agents, window_hours, limit)?
                .into_iter()
                .map(Finding::Document),
        )
        .collect();
    merged.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(a.id()))
    });
    if limit > 0 {
        merged.truncate(limit);
    }
    Ok(merged)
}

/// Events from other agents that name `agent` in their flag list.
pub fn flagged_for(
    store: &Store,
    agent: &str,
    window_hours: u32,
) -> Result<Vec<Event>, QuorumError> {
    records::query_events(
        store,
        &EventQuery {
            since: Some(window_start(store.now(), window_hours)),
            addressed_to: Some(agent.to_string()),
            ..EventQuery::default()
        },
    )
}

/// Compact view of another agent's event as it is handed to the oracle.
#[derive(Debug, Clone, Serialize)]
pub struct FindingBrief {
    pub agent: String,
    pub event_type: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
}

impl FindingBrief {
    pub fn from_event(e: &Event, max_chars: usize) -> Self {
        Self {
            agent: e.actor.clone(),
            event_type: e.event_type.to_string(),
            title: e.title.clone(),
            description: crate::agents::runner::truncate_chars(&e.description, max_chars),
            created_at: rfc3339(&e.created_at),
        }
    }
}
