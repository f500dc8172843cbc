//! Task lifecycle: upsert with title de-duplication, guarded status
//! transitions, and derived accountability (overdue / stale).
//!
//! Overdue and stale are never stored. They are recomputed from `due_at`,
//! `updated_at` and the store clock on every call.

use crate::core::error::QuorumError;
use crate::core::records::{self, EventType, Metadata, NewEvent, json_map};
use crate::core::store::Store;
use crate::core::time::{self, from_epoch_secs, to_epoch_secs};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

pub const DEFAULT_PRIORITY: i64 = 3;
pub const DEFAULT_STALE_DAYS: u32 = 7;
const ACCOUNTABILITY_SCAN_LIMIT: usize = 100;

const TASK_COLUMNS: &str = "id, title, description, status, priority, owner, due_at, created_at, updated_at, completed_at, metadata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Blocked,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Open,
        TaskStatus::InProgress,
        TaskStatus::Blocked,
        TaskStatus::Done,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }

    /// `open -> in_progress -> {done | blocked | cancelled}`, `blocked -> in_progress`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Open, InProgress)
                | (InProgress, Done)
                | (InProgress, Blocked)
                | (InProgress, Cancelled)
                | (Blocked, InProgress)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = QuorumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        TaskStatus::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| QuorumError::Validation(format!("unknown task status '{}'", s)))
    }
}

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: i64,
    pub owner: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: i64,
    pub owner: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub metadata: Metadata,
    /// Initial status when the task is created; ignored on re-discovery.
    pub status: TaskStatus,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            priority: DEFAULT_PRIORITY,
            owner: None,
            due_at: None,
            metadata: Metadata::new(),
            status: TaskStatus::Open,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn owner(mut self, owner: Option<String>) -> Self {
        self.owner = owner.filter(|o| !o.trim().is_empty());
        self
    }

    pub fn due_at(mut self, due_at: Option<DateTime<Utc>>) -> Self {
        self.due_at = due_at;
        self
    }

    pub fn metadata(mut self, metadata: JsonValue) -> Self {
        if let JsonValue::Object(map) = metadata {
            self.metadata = map;
        }
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    /// Empty means any status.
    pub statuses: Vec<TaskStatus>,
    pub max_priority: Option<i64>,
    pub created_since: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl TaskQuery {
    /// Every task that has not reached `done` or `cancelled`.
    pub fn non_terminal(limit: usize) -> Self {
        Self {
            statuses: TaskStatus::ALL
                .into_iter()
                .filter(|s| !s.is_terminal())
                .collect(),
            limit,
            ..Self::default()
        }
    }
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let due_at: Option<i64> = row.get(6)?;
    let completed_at: Option<i64> = row.get(9)?;
    let metadata: String = row.get(10)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        owner: row.get(5)?,
        due_at: due_at.map(from_epoch_secs),
        created_at: from_epoch_secs(row.get(7)?),
        updated_at: from_epoch_secs(row.get(8)?),
        completed_at: completed_at.map(from_epoch_secs),
        metadata: json_map(&metadata),
    })
}

fn non_terminal_clause() -> &'static str {
    "status NOT IN ('done', 'cancelled')"
}

fn fetch_task(conn: &Connection, id: &str) -> Result<Option<Task>, QuorumError> {
    let task = conn
        .query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
            params![id],
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

fn find_open_by_title(conn: &Connection, title: &str) -> Result<Option<Task>, QuorumError> {
    let task = conn
        .query_row(
            &format!(
                "SELECT {} FROM tasks WHERE title = ?1 AND {} ORDER BY created_at ASC, id ASC LIMIT 1",
                TASK_COLUMNS,
                non_terminal_clause()
            ),
            params![title],
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

/// Creates a task, or refreshes the oldest non-terminal task carrying the
/// same title. Titles are trimmed, then matched byte-for-byte; casing and
/// punctuation variants create separate tasks.
pub fn upsert_task(store: &Store, task: NewTask) -> Result<(String, UpsertOutcome), QuorumError> {
    let title = task.title.trim().to_string();
    if title.is_empty() {
        return Err(QuorumError::Validation("task title must not be empty".into()));
    }
    let now = to_epoch_secs(&store.now());

    store.broker().with_tx("quorum", "tasks.upsert", |conn| {
        if let Some(existing) = find_open_by_title(conn, &title)? {
            let mut metadata = existing.metadata.clone();
            for (k, v) in &task.metadata {
                metadata.insert(k.clone(), v.clone());
            }
            conn.execute(
                "UPDATE tasks SET description = ?1, priority = ?2,
                    owner = COALESCE(?3, owner), due_at = COALESCE(?4, due_at),
                    metadata = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    task.description,
                    task.priority,
                    task.owner,
                    task.due_at.as_ref().map(to_epoch_secs),
                    serde_json::to_string(&metadata)?,
                    now,
                    existing.id
                ],
            )?;
            return Ok((existing.id, UpsertOutcome::Updated));
        }

        let id = time::new_id();
        let completed_at = (task.status == TaskStatus::Done).then_some(now);
        conn.execute(
            "INSERT INTO tasks(id, title, description, status, priority, owner, due_at, created_at, updated_at, completed_at, metadata)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id,
                title,
                task.description,
                task.status,
                task.priority,
                task.owner,
                task.due_at.as_ref().map(to_epoch_secs),
                now,
                now,
                completed_at,
                serde_json::to_string(&task.metadata)?
            ],
        )?;
        Ok((id, UpsertOutcome::Created))
    })
}

/// Moves a task along the state machine. Unknown ids and illegal edges are
/// reported as recoverable errors; nothing is written in either case.
/// A transition to the current status is a no-op.
pub fn transition(store: &Store, id: &str, next: TaskStatus) -> Result<Task, QuorumError> {
    let now = to_epoch_secs(&store.now());
    store.broker().with_tx("quorum", "tasks.transition", |conn| {
        let current = fetch_task(conn, id)?
            .ok_or_else(|| QuorumError::NotFound(format!("task '{}'", id)))?;
        if current.status == next {
            return Ok(current);
        }
        if !current.status.can_transition_to(next) {
            return Err(QuorumError::InvalidTransition {
                id: id.to_string(),
                from: current.status.to_string(),
                to: next.to_string(),
            });
        }
        conn.execute(
            "UPDATE tasks SET status = ?1, updated_at = ?2,
                completed_at = CASE WHEN ?1 = 'done' THEN ?2 ELSE completed_at END
             WHERE id = ?3",
            params![next, now, id],
        )?;
        fetch_task(conn, id)?.ok_or_else(|| QuorumError::NotFound(format!("task '{}'", id)))
    })
}

pub fn get_task(store: &Store, id: &str) -> Result<Option<Task>, QuorumError> {
    store
        .broker()
        .with_conn("quorum", "tasks.get", |conn| fetch_task(conn, id))
}

/// Tasks ordered by priority (most urgent first), then age.
pub fn query_tasks(store: &Store, q: &TaskQuery) -> Result<Vec<Task>, QuorumError> {
    let mut query = format!("SELECT {} FROM tasks WHERE 1=1", TASK_COLUMNS);
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if !q.statuses.is_empty() {
        query.push_str(&format!(
            " AND status IN ({})",
            vec!["?"; q.statuses.len()].join(", ")
        ));
        for s in &q.statuses {
            args.push(Box::new(*s));
        }
    }
    if let Some(p) = q.max_priority {
        query.push_str(" AND priority <= ?");
        args.push(Box::new(p));
    }
    if let Some(since) = q.created_since {
        query.push_str(" AND created_at >= ?");
        args.push(Box::new(to_epoch_secs(&since)));
    }
    query.push_str(" ORDER BY priority ASC, created_at ASC, id ASC LIMIT ?");
    args.push(Box::new(if q.limit == 0 { -1 } else { q.limit as i64 }));

    store.broker().with_conn("quorum", "tasks.query", |conn| {
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            task_from_row,
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// Non-terminal tasks whose `due_at` lies before the store clock, earliest first.
pub fn overdue_tasks(store: &Store) -> Result<Vec<Task>, QuorumError> {
    let now = to_epoch_secs(&store.now());
    store.broker().with_conn("quorum", "tasks.overdue", |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks
             WHERE {} AND due_at IS NOT NULL AND due_at < ?1
             ORDER BY due_at ASC, id ASC LIMIT ?2",
            TASK_COLUMNS,
            non_terminal_clause()
        ))?;
        let rows = stmt.query_map(
            params![now, ACCOUNTABILITY_SCAN_LIMIT as i64],
            task_from_row,
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// Non-terminal tasks not updated within `threshold_days`, least recent first.
pub fn stale_tasks(store: &Store, threshold_days: u32) -> Result<Vec<Task>, QuorumError> {
    let cutoff = to_epoch_secs(&time::days_before(store.now(), threshold_days));
    store.broker().with_conn("quorum", "tasks.stale", |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks
             WHERE {} AND updated_at < ?1
             ORDER BY updated_at ASC, id ASC LIMIT ?2",
            TASK_COLUMNS,
            non_terminal_clause()
        ))?;
        let rows = stmt.query_map(
            params![cutoff, ACCOUNTABILITY_SCAN_LIMIT as i64],
            task_from_row,
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountabilityReport {
    pub overdue: usize,
    pub stale: usize,
    pub failed: usize,
}

impl AccountabilityReport {
    pub fn emitted(&self) -> usize {
        self.overdue + self.stale
    }
}

fn owner_label(task: &Task) -> &str {
    task.owner.as_deref().unwrap_or("unassigned")
}

/// Appends one accountability event per overdue task and per stale task.
/// Prior notices for the same task are not consulted; every run nags again.
pub fn emit_accountability_events(
    store: &Store,
    actor: &str,
    stale_after_days: u32,
) -> Result<AccountabilityReport, QuorumError> {
    let now = store.now();
    let mut report = AccountabilityReport::default();

    for task in overdue_tasks(store)? {
        let Some(due) = task.due_at else { continue };
        let days_overdue = (now - due).num_days();
        let ev = NewEvent::new(
            EventType::Accountability,
            actor,
            format!("Overdue: {}", task.title),
        )
        .description(format!(
            "Task '{}' was due {} ({} day(s) ago) and is still in '{}' status. Owner: {}.",
            task.title,
            due.format("%Y-%m-%d"),
            days_overdue,
            task.status,
            owner_label(&task)
        ))
        .metadata(serde_json::json!({ "kind": "overdue", "task_id": task.id }))
        .ref_ids(vec![task.id.clone()]);
        match records::insert_event(store, ev) {
            Ok(_) => report.overdue += 1,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "failed to record overdue notice");
                report.failed += 1;
            }
        }
    }

    for task in stale_tasks(store, stale_after_days)? {
        let days_stale = (now - task.updated_at).num_days();
        let ev = NewEvent::new(
            EventType::Accountability,
            actor,
            format!("Stale: {}", task.title),
        )
        .description(format!(
            "Task '{}' has not been updated in {} days. Status: '{}'. Owner: {}. Is this still relevant? If so, what's blocking it?",
            task.title,
            days_stale,
            task.status,
            owner_label(&task)
        ))
        .metadata(serde_json::json!({ "kind": "stale", "task_id": task.id }))
        .ref_ids(vec![task.id.clone()]);
        match records::insert_event(store, ev) {
            Ok(_) => report.stale += 1,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "failed to record stale notice");
                report.failed += 1;
            }
        }
    }

    if report.emitted() > 0 {
        info!(
            overdue = report.overdue,
            stale = report.stale,
            "accountability notices recorded"
        );
    }
    Ok(report)
}
