//! The shape every agent run shares: select, consult, persist.
//!
//! Runners are stateless between invocations. Everything a run needs to
//! know about previous runs comes from the store, through the frontier or
//! the context gateway.

use crate::core::config::Settings;
use crate::core::error::QuorumError;
use crate::core::oracle::Oracle;
use crate::core::prompts;
use crate::core::records::{self, Document, EventType, NewDocument};
use crate::core::store::Store;
use crate::core::time::command_envelope;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Connector,
    Executor,
    DevilsAdvocate,
    Opportunist,
    Strategist,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Connector,
        AgentRole::Executor,
        AgentRole::DevilsAdvocate,
        AgentRole::Opportunist,
        AgentRole::Strategist,
    ];

    /// Actor name written on events and source name on documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Connector => "connector",
            AgentRole::Executor => "executor",
            AgentRole::DevilsAdvocate => "devils_advocate",
            AgentRole::Opportunist => "opportunist",
            AgentRole::Strategist => "strategist",
        }
    }

    /// The event type this role emits its findings as.
    pub fn event_type(&self) -> EventType {
        match self {
            AgentRole::Connector => EventType::Connection,
            AgentRole::Executor => EventType::Accountability,
            AgentRole::DevilsAdvocate => EventType::Critique,
            AgentRole::Opportunist => EventType::Opportunity,
            AgentRole::Strategist => EventType::Insight,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentRole::Connector => "Connector",
            AgentRole::Executor => "Executor",
            AgentRole::DevilsAdvocate => "Devil's Advocate",
            AgentRole::Opportunist => "Opportunist",
            AgentRole::Strategist => "Strategist",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = QuorumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        AgentRole::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| QuorumError::Validation(format!("unknown agent '{}'", s)))
    }
}

/// Everything a run borrows from its caller.
pub struct AgentContext<'a> {
    pub store: &'a Store,
    pub oracle: &'a dyn Oracle,
    pub settings: &'a Settings,
}

impl<'a> AgentContext<'a> {
    pub fn new(store: &'a Store, oracle: &'a dyn Oracle, settings: &'a Settings) -> Self {
        Self {
            store,
            oracle,
            settings,
        }
    }

    /// Serializes `payload`, sends it with the role's system prompt, and
    /// returns the raw reply. A timeout reads as an empty reply; an
    /// unreachable oracle aborts the run.
    pub fn consult<P: Serialize>(&self, role: AgentRole, payload: &P) -> Result<String, QuorumError> {
        let system = prompts::system_prompt(self.store, role.as_str())?;
        let body = serde_json::to_string(payload)?;
        let started = Instant::now();
        match self.oracle.complete(&system, &body) {
            Ok(text) => {
                info!(
                    role = role.as_str(),
                    oracle = self.oracle.name(),
                    payload_chars = body.len(),
                    reply_chars = text.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "oracle consulted"
                );
                Ok(text)
            }
            Err(QuorumError::OracleTimeout(msg)) => {
                warn!(role = role.as_str(), %msg, "oracle timed out; treating as empty reply");
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// The count-based outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub role: AgentRole,
    /// Candidate items examined.
    pub scanned: usize,
    /// Findings persisted (events, plus tasks where the role creates them).
    pub stored: usize,
    /// Per-item failures that were logged and skipped.
    pub failed: usize,
    pub message: String,
}

impl RunSummary {
    pub fn new(role: AgentRole, message: impl Into<String>) -> Self {
        Self {
            role,
            scanned: 0,
            stored: 0,
            failed: 0,
            message: message.into(),
        }
    }

    pub fn envelope(&self) -> JsonValue {
        command_envelope(
            self.role.as_str(),
            "ok",
            serde_json::json!({
                "summary": self.message,
                "scanned": self.scanned,
                "stored": self.stored,
                "failed": self.failed,
            }),
        )
    }
}

/// One analytical role.
pub trait Agent {
    fn role(&self) -> AgentRole;

    fn run(&self, ctx: &AgentContext<'_>) -> Result<RunSummary, QuorumError>;
}

/// Runs `agent` once and logs its summary.
pub fn execute(agent: &dyn Agent, ctx: &AgentContext<'_>) -> Result<RunSummary, QuorumError> {
    let role = agent.role();
    let started = Instant::now();
    info!(role = role.as_str(), "run started");
    let summary = agent.run(ctx)?;
    info!(
        role = role.as_str(),
        scanned = summary.scanned,
        stored = summary.stored,
        failed = summary.failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "{}",
        summary.message
    );
    Ok(summary)
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// A finding passes when its confidence reaches `threshold`. Findings that
/// carry no confidence count as `absent`.
pub fn passes_confidence(confidence: Option<f64>, threshold: f64, absent: f64) -> bool {
    let c = confidence.unwrap_or(absent);
    c.is_finite() && c >= threshold
}

/// Logs and counts a failure scoped to one item so the rest of the batch
/// continues. Store and I/O failures are returned and abort the run.
pub fn isolate<T>(
    role: AgentRole,
    item: &str,
    result: Result<T, QuorumError>,
    failed: &mut usize,
) -> Result<Option<T>, QuorumError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_item_recoverable() => {
            warn!(role = role.as_str(), item, error = %e, "item failed; continuing");
            *failed += 1;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Writes the run's rollup document. Called only when the run stored at
/// least one finding.
pub fn write_rollup(
    store: &Store,
    role: AgentRole,
    headline: &str,
    findings: &[String],
    metadata: JsonValue,
) -> Result<Document, QuorumError> {
    let mut content = format!(
        "{} auto-summary: {}\n\nFindings:\n",
        role.display_name(),
        headline
    );
    for f in findings {
        content.push_str("- ");
        content.push_str(f);
        content.push('\n');
    }
    let title = format!(
        "{} Run Summary ({})",
        role.display_name(),
        store.now().format("%Y-%m-%d %H:%M")
    );
    let mut meta = metadata;
    if let Some(obj) = meta.as_object_mut() {
        obj.insert("source".into(), JsonValue::from(role.as_str()));
    }
    records::insert_document(
        store,
        NewDocument::new("summary", role.as_str(), title, content)
            .tags([role.as_str(), "auto-summary"])
            .metadata(meta),
    )
}
