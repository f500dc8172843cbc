//! Strategist: periodic reflection over a daily or weekly window.
//!
//! The reflection is rendered to markdown and stored as a `reflection`
//! document, then announced with one `insight` event that points at it.
//! That document doubles as the run's rollup.

use crate::agents::runner::{
    Agent, AgentContext, AgentRole, RunSummary, isolate, passes_confidence, truncate_chars,
};
use crate::core::config::ReflectionType;
use crate::core::error::QuorumError;
use crate::core::interpret;
use crate::core::records::{self, DocumentQuery, EventQuery, NewDocument, NewEvent};
use crate::core::tasks::{self, TaskQuery, TaskStatus};
use crate::core::time::{rfc3339, window_start};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeSet;
use tracing::{info, warn};

const DOCUMENT_LIMIT: usize = 100;
const DOCUMENT_PREVIEW_CHARS: usize = 500;
const EVENT_LIMIT: usize = 200;
const TASK_LIMIT: usize = 200;
const CONVERSATION_LIMIT: usize = 50;
const INSIGHT_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy)]
pub struct Strategist {
    pub reflection_type: ReflectionType,
    /// Overrides the window implied by `reflection_type`.
    pub lookback_hours: Option<u32>,
}

impl Strategist {
    pub fn new(reflection_type: ReflectionType) -> Self {
        Self {
            reflection_type,
            lookback_hours: None,
        }
    }

    pub fn window_hours(&self) -> u32 {
        self.lookback_hours
            .unwrap_or_else(|| self.reflection_type.window_hours())
    }
}

impl Default for Strategist {
    fn default() -> Self {
        Self::new(ReflectionType::Daily)
    }
}

#[derive(Serialize)]
struct DocumentBrief {
    id: String,
    doc_type: String,
    source: String,
    title: String,
    content_preview: String,
    tags: BTreeSet<String>,
    created_at: String,
}

#[derive(Serialize)]
struct EventBrief {
    id: String,
    event_type: String,
    actor: String,
    title: String,
    description: String,
    created_at: String,
}

#[derive(Serialize)]
struct TaskBrief {
    id: String,
    title: String,
    status: TaskStatus,
    priority: i64,
    owner: Option<String>,
    due_at: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Serialize)]
struct ConversationBrief {
    conversation_id: String,
    turn_count: i64,
    first_turn_at: String,
    last_turn_at: String,
}

#[derive(Serialize)]
struct Payload {
    reflection_type: ReflectionType,
    period_hours: u32,
    documents: Vec<DocumentBrief>,
    events: Vec<EventBrief>,
    tasks: Vec<TaskBrief>,
    conversations: Vec<ConversationBrief>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Reflection {
    title: Option<String>,
    observations: Vec<JsonValue>,
    blocked_items: Vec<JsonValue>,
    suggested_focus: Vec<JsonValue>,
}

impl Reflection {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.observations.is_empty()
            && self.blocked_items.is_empty()
            && self.suggested_focus.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Observation {
    theme: Option<String>,
    detail: String,
    evidence: Option<String>,
    confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BlockedItem {
    title: Option<String>,
    hypothesis: String,
}

fn decode_items<T: serde::de::DeserializeOwned>(items: Vec<JsonValue>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Renders the reflection document body.
fn render(
    title: &str,
    observations: &[Observation],
    blocked: &[BlockedItem],
    focus: &[String],
) -> String {
    let mut lines = vec![format!("# {title}\n")];
    if !observations.is_empty() {
        lines.push("## Observations\n".to_string());
        for obs in observations {
            lines.push(format!(
                "**{}**: {}",
                obs.theme.as_deref().unwrap_or("Observation"),
                obs.detail
            ));
            if let Some(evidence) = obs.evidence.as_deref().filter(|e| !e.is_empty()) {
                lines.push(format!("  Evidence: {evidence}"));
            }
            lines.push(String::new());
        }
    }
    if !blocked.is_empty() {
        lines.push("## Blocked Items\n".to_string());
        for b in blocked {
            lines.push(format!(
                "- **{}**: {}",
                b.title.as_deref().unwrap_or("Unknown"),
                b.hypothesis
            ));
        }
        lines.push(String::new());
    }
    if !focus.is_empty() {
        lines.push("## Suggested Focus\n".to_string());
        for f in focus {
            lines.push(format!("- {f}"));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

impl Agent for Strategist {
    fn role(&self) -> AgentRole {
        AgentRole::Strategist
    }

    fn run(&self, ctx: &AgentContext<'_>) -> Result<RunSummary, QuorumError> {
        let role = self.role();
        let store = ctx.store;
        let hours = self.window_hours();
        let since = window_start(store.now(), hours);

        let documents = records::query_documents(
            store,
            &DocumentQuery {
                since: Some(since),
                limit: DOCUMENT_LIMIT,
                ..DocumentQuery::default()
            },
        )?;
        let events = records::query_events(
            store,
            &EventQuery {
                since: Some(since),
                limit: EVENT_LIMIT,
                ..EventQuery::default()
            },
        )?;
        let snapshot = tasks::query_tasks(store, &TaskQuery::non_terminal(TASK_LIMIT))?;
        let conversations = records::conversation_digests(store, since, CONVERSATION_LIMIT)?;

        let scanned = documents.len() + events.len() + snapshot.len() + conversations.len();
        if scanned == 0 {
            info!(role = role.as_str(), "nothing to reflect on");
            return Ok(RunSummary::new(role, "Nothing to reflect on."));
        }

        let payload = Payload {
            reflection_type: self.reflection_type,
            period_hours: hours,
            documents: documents
                .iter()
                .map(|d| DocumentBrief {
                    id: d.id.clone(),
                    doc_type: d.doc_type.clone(),
                    source: d.source.clone(),
                    title: d.title.clone(),
                    content_preview: truncate_chars(&d.content, DOCUMENT_PREVIEW_CHARS),
                    tags: d.tags.clone(),
                    created_at: rfc3339(&d.created_at),
                })
                .collect(),
            events: events
                .iter()
                .map(|e| EventBrief {
                    id: e.id.clone(),
                    event_type: e.event_type.to_string(),
                    actor: e.actor.clone(),
                    title: e.title.clone(),
                    description: truncate_chars(&e.description, DOCUMENT_PREVIEW_CHARS),
                    created_at: rfc3339(&e.created_at),
                })
                .collect(),
            tasks: snapshot
                .iter()
                .map(|t| TaskBrief {
                    id: t.id.clone(),
                    title: t.title.clone(),
                    status: t.status,
                    priority: t.priority,
                    owner: t.owner.clone(),
                    due_at: t.due_at.as_ref().map(rfc3339),
                    created_at: rfc3339(&t.created_at),
                    updated_at: rfc3339(&t.updated_at),
                })
                .collect(),
            conversations: conversations
                .iter()
                .map(|c| ConversationBrief {
                    conversation_id: c.conversation_id.clone(),
                    turn_count: c.turn_count,
                    first_turn_at: rfc3339(&c.first_turn_at),
                    last_turn_at: rfc3339(&c.last_turn_at),
                })
                .collect(),
        };
        let raw = ctx.consult(role, &payload)?;
        let reflection: Reflection = interpret::decode_object(role.as_str(), &raw);

        let mut summary = RunSummary::new(role, "");
        summary.scanned = scanned;
        if reflection.is_empty() {
            summary.message = "LLM returned no parseable reflection.".to_string();
            return Ok(summary);
        }

        let kind = self.reflection_type;
        let title = reflection
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("{} Reflection", capitalize(kind.as_str())));
        let threshold = ctx.settings.gates.strategist_min_confidence;
        let observations: Vec<Observation> = decode_items::<Observation>(reflection.observations)
            .into_iter()
            .filter(|o| passes_confidence(o.confidence, threshold, 1.0))
            .collect();
        let blocked: Vec<BlockedItem> = decode_items(reflection.blocked_items);
        let focus: Vec<String> = reflection
            .suggested_focus
            .into_iter()
            .filter_map(|v| match v {
                JsonValue::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect();
        let content = render(&title, &observations, &blocked, &focus);

        let document = NewDocument::new("reflection", role.as_str(), title.clone(), content.clone())
            .tags([kind.as_str(), "reflection", "strategist"])
            .metadata(json!({
                "reflection_type": kind,
                "period_hours": hours,
                "observation_count": observations.len(),
                "blocked_count": blocked.len(),
            }));
        let Some(document) = isolate(
            role,
            &title,
            records::insert_document(store, document),
            &mut summary.failed,
        )?
        else {
            warn!(role = role.as_str(), "reflection document not stored; skipping insight");
            summary.message = format!("Failed to store {kind} reflection.");
            return Ok(summary);
        };

        let insight = NewEvent::new(role.event_type(), role.as_str(), title.clone())
            .description(truncate_chars(&content, INSIGHT_DESCRIPTION_CHARS))
            .metadata(json!({ "document_id": document.id, "reflection_type": kind }));
        if isolate(role, &title, records::insert_event(store, insight), &mut summary.failed)?.is_some() {
            summary.stored += 1;
        }

        summary.message = format!(
            "Created {kind} reflection with {} observations, {} blocked items, {} focus areas.",
            observations.len(),
            blocked.len(),
            focus.len()
        );
        Ok(summary)
    }
}
