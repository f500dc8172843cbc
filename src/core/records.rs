//! Turns, events and documents: the append-only side of the record store.
//!
//! Turns arrive through ingestion, events and documents are written by the
//! agents. None of them is ever updated after insertion.

use crate::core::error::QuorumError;
use crate::core::frontier::{self, SeenBy};
use crate::core::store::Store;
use crate::core::time::{self, from_epoch_secs, to_epoch_secs};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub type Metadata = Map<String, JsonValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Connection,
    Critique,
    Accountability,
    Opportunity,
    Insight,
    /// Recorded by people or ingestion; critiqued by the devil's advocate.
    Decision,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::Connection,
        EventType::Critique,
        EventType::Accountability,
        EventType::Opportunity,
        EventType::Insight,
        EventType::Decision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Connection => "connection",
            EventType::Critique => "critique",
            EventType::Accountability => "accountability",
            EventType::Opportunity => "opportunity",
            EventType::Insight => "insight",
            EventType::Decision => "decision",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = QuorumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| QuorumError::Validation(format!("unknown event type '{}'", s)))
    }
}

impl ToSql for EventType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EventType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub event_type: EventType,
    pub actor: String,
    pub title: String,
    pub description: String,
    pub metadata: Metadata,
    pub ref_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub doc_type: String,
    pub source: String,
    pub title: String,
    pub content: String,
    pub tags: BTreeSet<String>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub actor: String,
    pub title: String,
    pub description: String,
    pub metadata: Metadata,
    pub ref_ids: Vec<String>,
}

impl NewEvent {
    pub fn new(event_type: EventType, actor: &str, title: impl Into<String>) -> Self {
        Self {
            event_type,
            actor: actor.to_string(),
            title: title.into(),
            description: String::new(),
            metadata: Metadata::new(),
            ref_ids: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn metadata(mut self, metadata: JsonValue) -> Self {
        if let JsonValue::Object(map) = metadata {
            self.metadata = map;
        }
        self
    }

    pub fn ref_ids(mut self, ref_ids: Vec<String>) -> Self {
        self.ref_ids = ref_ids;
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub doc_type: String,
    pub source: String,
    pub title: String,
    pub content: String,
    pub tags: BTreeSet<String>,
    pub metadata: Metadata,
}

impl NewDocument {
    pub fn new(doc_type: &str, source: &str, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.to_string(),
            source: source.to_string(),
            title: title.into(),
            content: content.into(),
            tags: BTreeSet::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn metadata(mut self, metadata: JsonValue) -> Self {
        if let JsonValue::Object(map) = metadata {
            self.metadata = map;
        }
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TurnQuery {
    pub since: Option<DateTime<Utc>>,
    pub conversation_id: Option<String>,
    pub unseen_by: Option<SeenBy>,
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub since: Option<DateTime<Utc>>,
    pub actors: Vec<String>,
    pub event_types: Vec<EventType>,
    pub unseen_by: Option<SeenBy>,
    /// Only events from other actors whose `metadata.considered_agents`
    /// names this agent.
    pub addressed_to: Option<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    pub since: Option<DateTime<Utc>>,
    pub sources: Vec<String>,
    pub doc_type: Option<String>,
    pub limit: usize,
}

/// Per-conversation rollup of turns inside a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDigest {
    pub conversation_id: String,
    pub turn_count: i64,
    pub first_turn_at: DateTime<Utc>,
    pub last_turn_at: DateTime<Utc>,
}

pub(crate) fn json_map(raw: &str) -> Metadata {
    serde_json::from_str(raw).unwrap_or_default()
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn effective_limit(limit: usize) -> i64 {
    if limit == 0 { -1 } else { limit as i64 }
}

fn turn_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationTurn> {
    Ok(ConversationTurn {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        created_at: from_epoch_secs(row.get(4)?),
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let metadata: String = row.get(5)?;
    let ref_ids: String = row.get(6)?;
    Ok(Event {
        id: row.get(0)?,
        event_type: row.get(1)?,
        actor: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        metadata: json_map(&metadata),
        ref_ids: serde_json::from_str(&ref_ids).unwrap_or_default(),
        created_at: from_epoch_secs(row.get(7)?),
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let tags: String = row.get(5)?;
    let metadata: String = row.get(6)?;
    Ok(Document {
        id: row.get(0)?,
        doc_type: row.get(1)?,
        source: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        metadata: json_map(&metadata),
        created_at: from_epoch_secs(row.get(7)?),
    })
}

pub fn insert_turn(
    store: &Store,
    conversation_id: &str,
    role: &str,
    content: &str,
) -> Result<ConversationTurn, QuorumError> {
    let turn = ConversationTurn {
        id: time::new_id(),
        conversation_id: conversation_id.to_string(),
        role: role.to_string(),
        content: content.to_string(),
        created_at: store.now(),
    };
    store.broker().with_conn("ingest", "turns.insert", |conn| {
        conn.execute(
            "INSERT INTO conversation_turns(id, conversation_id, role, content, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![
                turn.id,
                turn.conversation_id,
                turn.role,
                turn.content,
                to_epoch_secs(&turn.created_at)
            ],
        )?;
        Ok(())
    })?;
    Ok(turn)
}

pub fn insert_event(store: &Store, ev: NewEvent) -> Result<Event, QuorumError> {
    let event = Event {
        id: time::new_id(),
        event_type: ev.event_type,
        actor: ev.actor,
        title: ev.title,
        description: ev.description,
        metadata: ev.metadata,
        ref_ids: ev.ref_ids,
        created_at: store.now(),
    };
    let metadata = serde_json::to_string(&event.metadata)?;
    let ref_ids = serde_json::to_string(&event.ref_ids)?;
    store.broker().with_conn(&event.actor, "events.insert", |conn| {
        conn.execute(
            "INSERT INTO events(id, event_type, actor, title, description, metadata, ref_ids, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.id,
                event.event_type,
                event.actor,
                event.title,
                event.description,
                metadata,
                ref_ids,
                to_epoch_secs(&event.created_at)
            ],
        )?;
        Ok(())
    })?;
    Ok(event)
}

pub fn insert_document(store: &Store, doc: NewDocument) -> Result<Document, QuorumError> {
    let document = Document {
        id: time::new_id(),
        doc_type: doc.doc_type,
        source: doc.source,
        title: doc.title,
        content: doc.content,
        tags: doc.tags,
        metadata: doc.metadata,
        created_at: store.now(),
    };
    let tags = serde_json::to_string(&document.tags)?;
    let metadata = serde_json::to_string(&document.metadata)?;
    store
        .broker()
        .with_conn(&document.source, "documents.insert", |conn| {
            conn.execute(
                "INSERT INTO documents(id, doc_type, source, title, content, tags, metadata, created_at)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    document.id,
                    document.doc_type,
                    document.source,
                    document.title,
                    document.content,
                    tags,
                    metadata,
                    to_epoch_secs(&document.created_at)
                ],
            )?;
            Ok(())
        })?;
    Ok(document)
}

/// Turns newest first, optionally restricted to a window, a conversation,
/// or the frontier of an `(actor, event_type)` pair.
pub fn query_turns(store: &Store, q: &TurnQuery) -> Result<Vec<ConversationTurn>, QuorumError> {
    let mut query =
        "SELECT id, conversation_id, role, content, created_at FROM conversation_turns WHERE 1=1"
            .to_string();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(since) = q.since {
        query.push_str(" AND created_at >= ?");
        args.push(Box::new(to_epoch_secs(&since)));
    }
    if let Some(c) = &q.conversation_id {
        query.push_str(" AND conversation_id = ?");
        args.push(Box::new(c.clone()));
    }
    if let Some(seen_by) = &q.unseen_by {
        frontier::push_anti_join(&mut query, &mut args, "id", seen_by);
    }
    query.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
    args.push(Box::new(effective_limit(q.limit)));

    store.broker().with_conn("quorum", "turns.query", |conn| {
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            turn_from_row,
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

pub fn query_events(store: &Store, q: &EventQuery) -> Result<Vec<Event>, QuorumError> {
    let mut query = "SELECT id, event_type, actor, title, description, metadata, ref_ids, created_at FROM events WHERE 1=1".to_string();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(since) = q.since {
        query.push_str(" AND created_at >= ?");
        args.push(Box::new(to_epoch_secs(&since)));
    }
    if !q.actors.is_empty() {
        query.push_str(&format!(" AND actor IN ({})", placeholders(q.actors.len())));
        for a in &q.actors {
            args.push(Box::new(a.clone()));
        }
    }
    if !q.event_types.is_empty() {
        query.push_str(&format!(
            " AND event_type IN ({})",
            placeholders(q.event_types.len())
        ));
        for t in &q.event_types {
            args.push(Box::new(*t));
        }
    }
    if let Some(seen_by) = &q.unseen_by {
        frontier::push_anti_join(&mut query, &mut args, "id", seen_by);
    }
    if let Some(agent) = &q.addressed_to {
        query.push_str(
            " AND actor != ? AND EXISTS (SELECT 1 FROM json_each(events.metadata, '$.considered_agents') j WHERE j.value = ?)",
        );
        args.push(Box::new(agent.clone()));
        args.push(Box::new(agent.clone()));
    }
    query.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
    args.push(Box::new(effective_limit(q.limit)));

    store.broker().with_conn("quorum", "events.query", |conn| {
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            event_from_row,
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

pub fn query_documents(store: &Store, q: &DocumentQuery) -> Result<Vec<Document>, QuorumError> {
    let mut query = "SELECT id, doc_type, source, title, content, tags, metadata, created_at FROM documents WHERE 1=1".to_string();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(since) = q.since {
        query.push_str(" AND created_at >= ?");
        args.push(Box::new(to_epoch_secs(&since)));
    }
    if !q.sources.is_empty() {
        query.push_str(&format!(" AND source IN ({})", placeholders(q.sources.len())));
        for s in &q.sources {
            args.push(Box::new(s.clone()));
        }
    }
    if let Some(t) = &q.doc_type {
        query.push_str(" AND doc_type = ?");
        args.push(Box::new(t.clone()));
    }
    query.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
    args.push(Box::new(effective_limit(q.limit)));

    store.broker().with_conn("quorum", "documents.query", |conn| {
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            document_from_row,
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

pub fn conversation_digests(
    store: &Store,
    since: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<ConversationDigest>, QuorumError> {
    store.broker().with_conn("quorum", "turns.digest", |conn| {
        let mut stmt = conn.prepare(
            "SELECT conversation_id, COUNT(*), MIN(created_at), MAX(created_at)
             FROM conversation_turns
             WHERE created_at >= ?1
             GROUP BY conversation_id
             ORDER BY MAX(created_at) DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![to_epoch_secs(&since), effective_limit(limit)], |row| {
            Ok(ConversationDigest {
                conversation_id: row.get(0)?,
                turn_count: row.get(1)?,
                first_turn_at: from_epoch_secs(row.get(2)?),
                last_turn_at: from_epoch_secs(row.get(3)?),
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}
