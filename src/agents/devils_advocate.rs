//! Devil's advocate: critiques recent decisions, insights, opportunities and
//! high-priority tasks before they harden.

use crate::agents::runner::{
    Agent, AgentContext, AgentRole, RunSummary, isolate, truncate_chars, write_rollup,
};
use crate::core::config::Severity;
use crate::core::error::QuorumError;
use crate::core::frontier::{self, SeenBy, SeenSet};
use crate::core::interpret;
use crate::core::records::{self, Event, EventQuery, EventType, NewEvent};
use crate::core::tasks::{self, Task, TaskQuery};
use crate::core::time::{rfc3339, window_start};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

pub const DEFAULT_LOOKBACK_HOURS: u32 = 48;
const DECISION_LIMIT: usize = 50;
const TASK_LIMIT: usize = 20;
/// Tasks at or above this urgency are treated as de facto decisions.
const CRITIQUE_MAX_PRIORITY: i64 = 2;
const DECISION_PREVIEW_CHARS: usize = 2000;
const TASK_PREVIEW_CHARS: usize = 1000;
const CRITIQUED_TYPES: [EventType; 3] =
    [EventType::Decision, EventType::Insight, EventType::Opportunity];

#[derive(Debug, Clone, Copy)]
pub struct DevilsAdvocate {
    pub lookback_hours: u32,
}

impl Default for DevilsAdvocate {
    fn default() -> Self {
        Self {
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
        }
    }
}

#[derive(Serialize)]
struct DecisionBrief {
    id: String,
    event_type: String,
    title: String,
    description: String,
    actor: String,
    created_at: String,
}

#[derive(Serialize)]
struct TaskBrief {
    id: String,
    title: String,
    description: String,
    priority: i64,
    owner: Option<String>,
}

#[derive(Serialize)]
struct Payload {
    decisions_and_plans: Vec<DecisionBrief>,
    high_priority_tasks: Vec<TaskBrief>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Critique {
    target: Option<String>,
    assumption: Option<String>,
    risk: Option<String>,
    alternative: Option<String>,
    severity: Option<String>,
}

impl Critique {
    fn description(&self) -> String {
        [
            ("Assumption", &self.assumption),
            ("Risk", &self.risk),
            ("Alternative", &self.alternative),
        ]
        .into_iter()
        .filter_map(|(label, v)| {
            v.as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| format!("{label}: {s}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// Ids of every candidate whose title or id equals `target` exactly.
fn resolve_target(target: &str, decisions: &[Event], tasks: &[Task]) -> Vec<String> {
    decisions
        .iter()
        .filter(|d| d.title == target || d.id == target)
        .map(|d| d.id.clone())
        .chain(
            tasks
                .iter()
                .filter(|t| t.title == target || t.id == target)
                .map(|t| t.id.clone()),
        )
        .collect()
}

impl Agent for DevilsAdvocate {
    fn role(&self) -> AgentRole {
        AgentRole::DevilsAdvocate
    }

    fn run(&self, ctx: &AgentContext<'_>) -> Result<RunSummary, QuorumError> {
        let role = self.role();
        let store = ctx.store;
        let since = window_start(store.now(), self.lookback_hours);
        let seen_by = SeenBy::new(role.as_str(), role.event_type());

        let decisions = records::query_events(
            store,
            &EventQuery {
                since: Some(since),
                event_types: CRITIQUED_TYPES.to_vec(),
                unseen_by: Some(seen_by.clone()),
                limit: DECISION_LIMIT,
                ..EventQuery::default()
            },
        )?;
        let recent_tasks = tasks::query_tasks(
            store,
            &TaskQuery {
                max_priority: Some(CRITIQUE_MAX_PRIORITY),
                created_since: Some(since),
                limit: TASK_LIMIT,
                ..TaskQuery::default()
            },
        )?;
        let seen = SeenSet::load(store, &seen_by)?;
        let hot_tasks = frontier::unseen(&seen, &seen_by, recent_tasks)?;

        if decisions.is_empty() && hot_tasks.is_empty() {
            info!(role = role.as_str(), "nothing to critique");
            return Ok(RunSummary::new(role, "Nothing to critique."));
        }

        let payload = Payload {
            decisions_and_plans: decisions
                .iter()
                .map(|d| DecisionBrief {
                    id: d.id.clone(),
                    event_type: d.event_type.to_string(),
                    title: d.title.clone(),
                    description: truncate_chars(&d.description, DECISION_PREVIEW_CHARS),
                    actor: d.actor.clone(),
                    created_at: rfc3339(&d.created_at),
                })
                .collect(),
            high_priority_tasks: hot_tasks
                .iter()
                .map(|t| TaskBrief {
                    id: t.id.clone(),
                    title: t.title.clone(),
                    description: truncate_chars(&t.description, TASK_PREVIEW_CHARS),
                    priority: t.priority,
                    owner: t.owner.clone(),
                })
                .collect(),
        };
        let raw = ctx.consult(role, &payload)?;

        let min_severity = ctx.settings.gates.devils_advocate_min_severity;
        let mut summary = RunSummary::new(role, "");
        summary.scanned = decisions.len() + hot_tasks.len();
        let mut titles = Vec::new();

        for critique in interpret::decode_list::<Critique>(role.as_str(), &raw) {
            let severity = critique
                .severity
                .as_deref()
                .map(Severity::parse_lenient)
                .unwrap_or(Severity::Medium);
            if severity < min_severity {
                continue;
            }
            let target = critique
                .target
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string());
            let title = format!("Critique: {target}");
            let event = NewEvent::new(role.event_type(), role.as_str(), title.clone())
                .description(critique.description())
                .metadata(json!({ "severity": severity, "target": target }))
                .ref_ids(resolve_target(&target, &decisions, &hot_tasks));
            if isolate(role, &title, records::insert_event(store, event), &mut summary.failed)?
                .is_some()
            {
                summary.stored += 1;
                titles.push(format!("[{severity}] {title}"));
            }
        }

        if !titles.is_empty() {
            let headline = format!(
                "reviewed {} decisions + {} tasks, wrote {} critiques.",
                decisions.len(),
                hot_tasks.len(),
                summary.stored
            );
            write_rollup(
                store,
                role,
                &headline,
                &titles,
                json!({ "critique_count": summary.stored }),
            )?;
        }

        summary.message = format!(
            "Reviewed {} decisions + {} tasks, wrote {} critiques.",
            decisions.len(),
            hot_tasks.len(),
            summary.stored
        );
        Ok(summary)
    }
}
