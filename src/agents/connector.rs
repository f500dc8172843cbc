//! Connector: links new conversation turns to what memory already holds.
//!
//! Works the turn frontier newest first. Each turn with strong enough recall
//! hits gets its own oracle call; every accepted connection references the
//! turn first, which takes the turn off the frontier.

use crate::agents::runner::{
    Agent, AgentContext, AgentRole, RunSummary, isolate, passes_confidence, truncate_chars,
    write_rollup,
};
use crate::core::error::QuorumError;
use crate::core::frontier::SeenBy;
use crate::core::gateway::{self, FLAG_KEY, FindingBrief};
use crate::core::interpret;
use crate::core::recall::{self, RecallHit, RefType};
use crate::core::records::{self, ConversationTurn, NewEvent, TurnQuery};
use crate::core::time::{rfc3339, window_start};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

pub const BATCH_SIZE: usize = 50;
pub const MIN_RECALL_SCORE: f64 = 0.35;
const RECALL_LIMIT: usize = 15;
const CANDIDATE_PREVIEW_CHARS: usize = 1000;
const FINDING_PREVIEW_CHARS: usize = 500;
const CONTEXT_AGENTS: [&str; 4] = ["executor", "strategist", "devils_advocate", "opportunist"];
const CONTEXT_WINDOW_HOURS: u32 = 1;
const CONTEXT_LIMIT: usize = 15;
const FLAGGED_WINDOW_HOURS: u32 = 24;
const DEFAULT_CONSIDERED: [&str; 2] = ["strategist", "executor"];

#[derive(Debug, Default, Clone, Copy)]
pub struct Connector {
    /// Only consider turns newer than this many hours. The frontier alone
    /// decides otherwise.
    pub since_hours: Option<u32>,
}

#[derive(Serialize)]
struct TurnBrief<'a> {
    id: &'a str,
    role: &'a str,
    content: &'a str,
    created_at: String,
}

#[derive(Serialize)]
struct CandidateBrief {
    ref_type: RefType,
    ref_id: String,
    score: f64,
    title: String,
    content: String,
}

impl From<&RecallHit> for CandidateBrief {
    fn from(hit: &RecallHit) -> Self {
        Self {
            ref_type: hit.ref_type,
            ref_id: hit.ref_id.clone(),
            score: (hit.score * 10_000.0).round() / 10_000.0,
            title: hit.title.clone(),
            content: truncate_chars(&hit.content, CANDIDATE_PREVIEW_CHARS),
        }
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    turn: TurnBrief<'a>,
    candidates: Vec<CandidateBrief>,
    other_agent_findings: &'a [FindingBrief],
    flagged_for_you: &'a [FindingBrief],
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Connection {
    title: Option<String>,
    description: String,
    confidence: Option<f64>,
    related_ids: Vec<String>,
    considered_agents: Option<Vec<String>>,
}

fn relevant_hits(turn: &ConversationTurn, hits: Vec<RecallHit>) -> Vec<RecallHit> {
    hits.into_iter()
        .filter(|h| h.score >= MIN_RECALL_SCORE && h.ref_id != turn.id)
        .collect()
}

impl Agent for Connector {
    fn role(&self) -> AgentRole {
        AgentRole::Connector
    }

    fn run(&self, ctx: &AgentContext<'_>) -> Result<RunSummary, QuorumError> {
        let role = self.role();
        let store = ctx.store;
        let turns = records::query_turns(
            store,
            &TurnQuery {
                since: self.since_hours.map(|h| window_start(store.now(), h)),
                unseen_by: Some(SeenBy::new(role.as_str(), role.event_type())),
                limit: BATCH_SIZE,
                ..TurnQuery::default()
            },
        )?;
        if turns.is_empty() {
            info!(role = role.as_str(), "no unprocessed turns");
            return Ok(RunSummary::new(role, "No unprocessed turns."));
        }

        let others: Vec<FindingBrief> =
            gateway::recent_events(store, &CONTEXT_AGENTS, CONTEXT_WINDOW_HOURS, CONTEXT_LIMIT)?
                .iter()
                .map(|e| FindingBrief::from_event(e, FINDING_PREVIEW_CHARS))
                .collect();
        let flagged: Vec<FindingBrief> =
            gateway::flagged_for(store, role.as_str(), FLAGGED_WINDOW_HOURS)?
                .iter()
                .map(|e| FindingBrief::from_event(e, FINDING_PREVIEW_CHARS))
                .collect();
        if !others.is_empty() || !flagged.is_empty() {
            info!(
                role = role.as_str(),
                other_findings = others.len(),
                flagged = flagged.len(),
                "loaded cross-agent context"
            );
        }

        let threshold = ctx.settings.gates.connector_min_confidence;
        let mut summary = RunSummary::new(role, "");
        summary.scanned = turns.len();
        let mut titles = Vec::new();

        for turn in &turns {
            let Some(hits) = isolate(
                role,
                &turn.id,
                recall::search(store, &turn.content, RECALL_LIMIT),
                &mut summary.failed,
            )?
            else {
                continue;
            };
            let hits = relevant_hits(turn, hits);
            if hits.is_empty() {
                debug!(turn_id = %turn.id, "no recall candidates above threshold");
                continue;
            }

            let payload = Payload {
                turn: TurnBrief {
                    id: &turn.id,
                    role: &turn.role,
                    content: &turn.content,
                    created_at: rfc3339(&turn.created_at),
                },
                candidates: hits.iter().map(CandidateBrief::from).collect(),
                other_agent_findings: &others,
                flagged_for_you: &flagged,
            };
            let raw = ctx.consult(role, &payload)?;

            for conn in interpret::decode_list::<Connection>(role.as_str(), &raw) {
                if !passes_confidence(conn.confidence, threshold, 0.0) {
                    continue;
                }
                let title = conn
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| "Untitled connection".to_string());
                let mut ref_ids = vec![turn.id.clone()];
                for id in conn.related_ids {
                    if !ref_ids.contains(&id) {
                        ref_ids.push(id);
                    }
                }
                let considered = conn.considered_agents.unwrap_or_else(|| {
                    DEFAULT_CONSIDERED.iter().map(|a| a.to_string()).collect()
                });
                let event = NewEvent::new(role.event_type(), role.as_str(), title.clone())
                    .description(conn.description)
                    .metadata(json!({
                        "confidence": conn.confidence,
                        "source": role.as_str(),
                        FLAG_KEY: considered,
                    }))
                    .ref_ids(ref_ids);
                if isolate(role, &title, records::insert_event(store, event), &mut summary.failed)?
                    .is_some()
                {
                    summary.stored += 1;
                    titles.push(title);
                }
            }
        }

        if !titles.is_empty() {
            let headline = format!(
                "processed {} turns, found {} connections.",
                summary.scanned, summary.stored
            );
            write_rollup(
                store,
                role,
                &headline,
                &titles,
                json!({ "connection_count": summary.stored }),
            )?;
        }

        summary.message = format!(
            "Processed {} turns, created {} connections.",
            summary.scanned, summary.stored
        );
        Ok(summary)
    }
}
