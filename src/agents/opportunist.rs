//! Opportunist: scans recent memory for quick wins and reusable work.
//!
//! Every accepted opportunity becomes an event. One that names a concrete
//! action also upserts a task pointing back at that event.

use crate::agents::runner::{
    Agent, AgentContext, AgentRole, RunSummary, isolate, passes_confidence, truncate_chars,
    write_rollup,
};
use crate::core::error::QuorumError;
use crate::core::gateway::{self, FindingBrief};
use crate::core::interpret;
use crate::core::records::{
    self, Document, DocumentQuery, EventQuery, Metadata, NewEvent, TurnQuery,
};
use crate::core::tasks::{self, NewTask, TaskQuery, TaskStatus, UpsertOutcome};
use crate::core::time::{rfc3339, window_start};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::info;

pub const DEFAULT_LOOKBACK_HOURS: u32 = 48;
const DOCUMENT_LIMIT: usize = 100;
const DOCUMENT_PREVIEW_CHARS: usize = 800;
const EVENT_LIMIT: usize = 100;
const TASK_LIMIT: usize = 100;
const TURN_LIMIT: usize = 80;
const TURN_PREVIEW_CHARS: usize = 500;
const PEER_EVENT_LIMIT: usize = 10;
const REFLECTION_LIMIT: usize = 5;
const FINDING_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct Opportunist {
    pub lookback_hours: u32,
}

impl Default for Opportunist {
    fn default() -> Self {
        Self {
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
        }
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
    metadata: Metadata,
    created_at: String,
}

impl DocumentBrief {
    fn new(d: &Document, preview_chars: usize) -> Self {
        Self {
            id: d.id.clone(),
            doc_type: d.doc_type.clone(),
            source: d.source.clone(),
            title: d.title.clone(),
            content_preview: truncate_chars(&d.content, preview_chars),
            tags: d.tags.clone(),
            metadata: d.metadata.clone(),
            created_at: rfc3339(&d.created_at),
        }
    }
}

#[derive(Serialize)]
struct EventBrief {
    id: String,
    event_type: String,
    actor: String,
    title: String,
    description: String,
    metadata: Metadata,
    created_at: String,
}

#[derive(Serialize)]
struct TaskBrief {
    id: String,
    title: String,
    description: String,
    status: TaskStatus,
    priority: i64,
    owner: Option<String>,
    due_at: Option<String>,
    created_at: String,
}

#[derive(Serialize)]
struct TurnBrief {
    id: String,
    role: String,
    content_preview: String,
    created_at: String,
}

#[derive(Serialize)]
struct Payload {
    documents: Vec<DocumentBrief>,
    events: Vec<EventBrief>,
    tasks: Vec<TaskBrief>,
    conversation_context: Vec<TurnBrief>,
    connector_insights: Vec<FindingBrief>,
    executor_activity: Vec<FindingBrief>,
    strategist_reflections: Vec<DocumentBrief>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Opportunity {
    title: Option<String>,
    description: String,
    effort: Option<String>,
    impact: Option<String>,
    time_sensitive: bool,
    suggested_action: Option<String>,
    confidence: Option<f64>,
}

/// Task priority for an opportunity's impact level.
pub fn impact_priority(impact: &str) -> i64 {
    match impact.trim().to_ascii_lowercase().as_str() {
        "high" => 2,
        "low" => 4,
        _ => tasks::DEFAULT_PRIORITY,
    }
}

impl Agent for Opportunist {
    fn role(&self) -> AgentRole {
        AgentRole::Opportunist
    }

    fn run(&self, ctx: &AgentContext<'_>) -> Result<RunSummary, QuorumError> {
        let role = self.role();
        let store = ctx.store;
        let hours = self.lookback_hours;
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
        let open_tasks = tasks::query_tasks(store, &TaskQuery::non_terminal(TASK_LIMIT))?;
        let turns = records::query_turns(
            store,
            &TurnQuery {
                since: Some(since),
                limit: TURN_LIMIT,
                ..TurnQuery::default()
            },
        )?;

        let scanned = documents.len() + events.len() + open_tasks.len() + turns.len();
        if scanned == 0 {
            info!(role = role.as_str(), "nothing to scan");
            return Ok(RunSummary::new(role, "Nothing to scan."));
        }

        let connector = gateway::recent_events(store, &["connector"], hours, PEER_EVENT_LIMIT)?;
        let executor = gateway::recent_events(store, &["executor"], hours, PEER_EVENT_LIMIT)?;
        let reflections = gateway::recent_documents(store, &["strategist"], hours, REFLECTION_LIMIT)?;
        info!(
            role = role.as_str(),
            connector = connector.len(),
            executor = executor.len(),
            reflections = reflections.len(),
            "loaded cross-agent context"
        );

        let payload = Payload {
            documents: documents
                .iter()
                .map(|d| DocumentBrief::new(d, DOCUMENT_PREVIEW_CHARS))
                .collect(),
            events: events
                .iter()
                .map(|e| EventBrief {
                    id: e.id.clone(),
                    event_type: e.event_type.to_string(),
                    actor: e.actor.clone(),
                    title: e.title.clone(),
                    description: truncate_chars(&e.description, FINDING_PREVIEW_CHARS),
                    metadata: e.metadata.clone(),
                    created_at: rfc3339(&e.created_at),
                })
                .collect(),
            tasks: open_tasks
                .iter()
                .map(|t| TaskBrief {
                    id: t.id.clone(),
                    title: t.title.clone(),
                    description: truncate_chars(&t.description, FINDING_PREVIEW_CHARS),
                    status: t.status,
                    priority: t.priority,
                    owner: t.owner.clone(),
                    due_at: t.due_at.as_ref().map(rfc3339),
                    created_at: rfc3339(&t.created_at),
                })
                .collect(),
            conversation_context: turns
                .iter()
                .map(|t| TurnBrief {
                    id: t.id.clone(),
                    role: t.role.clone(),
                    content_preview: truncate_chars(&t.content, TURN_PREVIEW_CHARS),
                    created_at: rfc3339(&t.created_at),
                })
                .collect(),
            connector_insights: connector
                .iter()
                .map(|e| FindingBrief::from_event(e, FINDING_PREVIEW_CHARS))
                .collect(),
            executor_activity: executor
                .iter()
                .map(|e| FindingBrief::from_event(e, FINDING_PREVIEW_CHARS))
                .collect(),
            strategist_reflections: reflections
                .iter()
                .map(|d| DocumentBrief::new(d, FINDING_PREVIEW_CHARS))
                .collect(),
        };
        let raw = ctx.consult(role, &payload)?;
        let opportunities = interpret::decode_list::<Opportunity>(role.as_str(), &raw);

        let threshold = ctx.settings.gates.opportunist_min_confidence;
        let mut summary = RunSummary::new(role, "");
        summary.scanned = scanned;
        let found = opportunities.len();
        let mut events_created = 0;
        let mut tasks_created = 0;
        let mut lines = Vec::new();

        for opp in opportunities {
            if !passes_confidence(opp.confidence, threshold, 1.0) {
                continue;
            }
            let title = opp
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled opportunity".to_string());
            let effort = opp.effort.unwrap_or_else(|| "unknown".to_string());
            let impact = opp.impact.unwrap_or_else(|| "medium".to_string());
            let event = NewEvent::new(role.event_type(), role.as_str(), title.clone())
                .description(opp.description.clone())
                .metadata(json!({
                    "effort": effort,
                    "impact": impact,
                    "time_sensitive": opp.time_sensitive,
                    "confidence": opp.confidence,
                }));
            let Some(event) =
                isolate(role, &title, records::insert_event(store, event), &mut summary.failed)?
            else {
                continue;
            };
            events_created += 1;
            lines.push(format!("[{impact} impact / {effort} effort] {title}"));

            let Some(action) = opp.suggested_action.filter(|a| !a.trim().is_empty()) else {
                continue;
            };
            let task = NewTask::new(action.trim())
                .description(format!(
                    "Opportunity: {title}\n{}\nEstimated effort: {effort}",
                    opp.description
                ))
                .priority(impact_priority(&impact))
                .metadata(json!({ "source_event_id": event.id, "source": role.as_str() }));
            if let Some((_, UpsertOutcome::Created)) =
                isolate(role, &action, tasks::upsert_task(store, task), &mut summary.failed)?
            {
                tasks_created += 1;
            }
        }

        summary.stored = events_created + tasks_created;
        if events_created > 0 {
            let headline = format!(
                "found {found} opportunities, created {events_created} events and {tasks_created} tasks."
            );
            write_rollup(
                store,
                role,
                &headline,
                &lines,
                json!({ "opportunity_count": events_created, "task_count": tasks_created }),
            )?;
        }

        summary.message = format!(
            "Found {found} opportunities, created {events_created} events and {tasks_created} tasks."
        );
        Ok(summary)
    }
}
