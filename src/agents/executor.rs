//! Executor: turns recent activity into owned tasks and nags about the ones
//! that slip.
//!
//! Phase one is rule-based and never touches the oracle: one accountability
//! event per overdue task and per stale task. Phase two asks the oracle for
//! new tasks, status updates and extra notices, and only runs when there was
//! recent activity to read.

use crate::agents::runner::{
    Agent, AgentContext, AgentRole, RunSummary, isolate, passes_confidence, truncate_chars,
    write_rollup,
};
use crate::core::error::QuorumError;
use crate::core::gateway::{self, FindingBrief};
use crate::core::interpret;
use crate::core::records::{self, Event, EventQuery, NewEvent, TurnQuery};
use crate::core::tasks::{self, NewTask, Task, TaskQuery, TaskStatus, UpsertOutcome};
use crate::core::time::{parse_due, rfc3339, window_start};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::{info, warn};

pub const DEFAULT_LOOKBACK_HOURS: u32 = 24;
const TURN_LIMIT: usize = 200;
const EVENT_LIMIT: usize = 200;
const OPEN_TASK_LIMIT: usize = 500;
/// Items of each kind handed to the oracle.
const PAYLOAD_ITEMS: usize = 50;
const CONTENT_PREVIEW_CHARS: usize = 1000;
const FINDING_PREVIEW_CHARS: usize = 500;
const CONNECTOR_WINDOW_HOURS: u32 = 24;
const CONNECTOR_LIMIT: usize = 15;
const OPPORTUNIST_WINDOW_HOURS: u32 = 24;
const OPPORTUNIST_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct Executor {
    pub lookback_hours: u32,
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
        }
    }
}

#[derive(Serialize)]
struct TurnBrief {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
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

impl From<&Event> for EventBrief {
    fn from(e: &Event) -> Self {
        Self {
            id: e.id.clone(),
            event_type: e.event_type.to_string(),
            actor: e.actor.clone(),
            title: e.title.clone(),
            description: truncate_chars(&e.description, FINDING_PREVIEW_CHARS),
            created_at: rfc3339(&e.created_at),
        }
    }
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
    updated_at: String,
}

impl From<&Task> for TaskBrief {
    fn from(t: &Task) -> Self {
        Self {
            id: t.id.clone(),
            title: t.title.clone(),
            description: truncate_chars(&t.description, FINDING_PREVIEW_CHARS),
            status: t.status,
            priority: t.priority,
            owner: t.owner.clone(),
            due_at: t.due_at.as_ref().map(rfc3339),
            updated_at: rfc3339(&t.updated_at),
        }
    }
}

#[derive(Serialize)]
struct Payload {
    recent_turns: Vec<TurnBrief>,
    recent_events: Vec<EventBrief>,
    open_tasks: Vec<TaskBrief>,
    connector_insights: Vec<FindingBrief>,
    opportunist_findings: Vec<FindingBrief>,
}

/// Items are kept as raw JSON so one malformed entry does not sink the rest.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Plan {
    new_tasks: Vec<JsonValue>,
    updated_tasks: Vec<JsonValue>,
    accountability_events: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct ProposedTask {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    priority: Option<JsonValue>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    due_at: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusUpdate {
    task_id: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Notice {
    title: Option<String>,
    description: String,
}

/// Accepts `2` or `"2"`; anything else falls back to the default priority.
fn priority_of(raw: Option<&JsonValue>) -> i64 {
    match raw {
        Some(JsonValue::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(tasks::DEFAULT_PRIORITY),
        Some(JsonValue::String(s)) => s.trim().parse().unwrap_or(tasks::DEFAULT_PRIORITY),
        _ => tasks::DEFAULT_PRIORITY,
    }
}

fn parse_item<T: serde::de::DeserializeOwned>(
    role: AgentRole,
    kind: &str,
    raw: JsonValue,
    failed: &mut usize,
) -> Option<T> {
    match serde_json::from_value(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(role = role.as_str(), kind, error = %e, "skipping malformed oracle item");
            *failed += 1;
            None
        }
    }
}

impl Agent for Executor {
    fn role(&self) -> AgentRole {
        AgentRole::Executor
    }

    fn run(&self, ctx: &AgentContext<'_>) -> Result<RunSummary, QuorumError> {
        let role = self.role();
        let store = ctx.store;
        let since = window_start(store.now(), self.lookback_hours);

        let turns = records::query_turns(
            store,
            &TurnQuery {
                since: Some(since),
                limit: TURN_LIMIT,
                ..TurnQuery::default()
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
        let open_tasks = tasks::query_tasks(store, &TaskQuery::non_terminal(OPEN_TASK_LIMIT))?;

        let connector_insights =
            gateway::recent_events(store, &["connector"], CONNECTOR_WINDOW_HOURS, CONNECTOR_LIMIT)?;
        let opportunist_findings = gateway::recent_events(
            store,
            &["opportunist"],
            OPPORTUNIST_WINDOW_HOURS,
            OPPORTUNIST_LIMIT,
        )?;
        info!(
            role = role.as_str(),
            connector_insights = connector_insights.len(),
            opportunist_findings = opportunist_findings.len(),
            "loaded cross-agent context"
        );

        let mut summary = RunSummary::new(role, "");
        summary.scanned = turns.len() + events.len();
        let mut lines = Vec::new();

        // Phase one: rule-based accountability.
        let report = tasks::emit_accountability_events(
            store,
            role.as_str(),
            ctx.settings.tasks.stale_after_days,
        )?;
        let mut notices = report.emitted();
        summary.failed += report.failed;
        if notices > 0 {
            lines.push(format!(
                "{} overdue and {} stale task notices",
                report.overdue, report.stale
            ));
        }

        // Phase two: oracle-derived tasks, updates and notices.
        let mut created = 0;
        let mut updated = 0;
        if !turns.is_empty() || !events.is_empty() {
            let payload = Payload {
                recent_turns: turns
                    .iter()
                    .take(PAYLOAD_ITEMS)
                    .map(|t| TurnBrief {
                        id: t.id.clone(),
                        conversation_id: t.conversation_id.clone(),
                        role: t.role.clone(),
                        content: truncate_chars(&t.content, CONTENT_PREVIEW_CHARS),
                        created_at: rfc3339(&t.created_at),
                    })
                    .collect(),
                recent_events: events.iter().take(PAYLOAD_ITEMS).map(EventBrief::from).collect(),
                open_tasks: open_tasks.iter().take(PAYLOAD_ITEMS).map(TaskBrief::from).collect(),
                connector_insights: connector_insights
                    .iter()
                    .take(PAYLOAD_ITEMS)
                    .map(|e| FindingBrief::from_event(e, FINDING_PREVIEW_CHARS))
                    .collect(),
                opportunist_findings: opportunist_findings
                    .iter()
                    .take(PAYLOAD_ITEMS)
                    .map(|e| FindingBrief::from_event(e, FINDING_PREVIEW_CHARS))
                    .collect(),
            };
            let raw = ctx.consult(role, &payload)?;
            let plan: Plan = interpret::decode_object(role.as_str(), &raw);
            let threshold = ctx.settings.gates.executor_min_confidence;

            for item in plan.new_tasks {
                let Some(t) = parse_item::<ProposedTask>(role, "new_task", item, &mut summary.failed)
                else {
                    continue;
                };
                if !passes_confidence(t.confidence, threshold, 1.0) {
                    continue;
                }
                let title = t.title.trim().to_string();
                let new_task = NewTask::new(title.clone())
                    .description(t.description)
                    .priority(priority_of(t.priority.as_ref()))
                    .owner(t.owner)
                    .due_at(t.due_at.as_deref().and_then(parse_due))
                    .metadata(json!({ "source": role.as_str() }));
                match isolate(role, &title, tasks::upsert_task(store, new_task), &mut summary.failed)? {
                    Some((_, UpsertOutcome::Created)) => {
                        created += 1;
                        lines.push(format!("New task: {title}"));
                    }
                    Some((_, UpsertOutcome::Updated)) => {
                        updated += 1;
                        lines.push(format!("Refreshed task: {title}"));
                    }
                    None => {}
                }
            }

            for item in plan.updated_tasks {
                let Some(u) = parse_item::<StatusUpdate>(role, "updated_task", item, &mut summary.failed)
                else {
                    continue;
                };
                let (Some(task_id), Some(status)) = (u.task_id, u.status) else {
                    continue;
                };
                let result = status
                    .parse::<TaskStatus>()
                    .and_then(|next| tasks::transition(store, &task_id, next));
                if let Some(task) = isolate(role, &task_id, result, &mut summary.failed)? {
                    updated += 1;
                    lines.push(format!("Task '{}' -> {}", task.title, task.status));
                }
            }

            for item in plan.accountability_events {
                let Some(n) = parse_item::<Notice>(role, "accountability_event", item, &mut summary.failed)
                else {
                    continue;
                };
                let title = n
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| "Accountability notice".to_string());
                let event = NewEvent::new(role.event_type(), role.as_str(), title.clone())
                    .description(n.description)
                    .metadata(json!({ "kind": "oracle" }));
                if isolate(role, &title, records::insert_event(store, event), &mut summary.failed)?
                    .is_some()
                {
                    notices += 1;
                    lines.push(title);
                }
            }
        }

        summary.stored = created + updated + notices;
        if summary.stored > 0 {
            let headline = format!(
                "created {created} tasks, updated {updated}, logged {notices} accountability events."
            );
            write_rollup(
                store,
                role,
                &headline,
                &lines,
                json!({ "created": created, "updated": updated, "accountability": notices }),
            )?;
        }

        summary.message = format!(
            "Created {created} tasks, updated {updated}, logged {notices} accountability events."
        );
        Ok(summary)
    }
}
