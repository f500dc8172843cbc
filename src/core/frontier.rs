//! Frontier tracking: which records an agent has not yet acted upon.
//!
//! There is no cursor table. A record is "seen" by `(actor, event_type)` iff
//! its id appears in the `ref_ids` of some event with that actor and type.
//! The frontier is recomputed from the events table on every call, so a run
//! that dies mid-persist simply leaves its unreferenced inputs on the
//! frontier for the next run.
//!
//! Two concurrent runs of one agent can compute the same frontier before
//! either writes; both then emit findings for the same input. That race is
//! accepted; there is no lease.

use crate::core::error::QuorumError;
use crate::core::records::{ConversationTurn, Document, Event, EventType};
use crate::core::store::Store;
use rusqlite::params;
use rusqlite::types::ToSql;
use rustc_hash::FxHashSet;

/// The `(actor, event_type)` pair a frontier is computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenBy {
    pub actor: String,
    pub event_type: EventType,
}

impl SeenBy {
    pub fn new(actor: &str, event_type: EventType) -> Self {
        Self {
            actor: actor.to_string(),
            event_type,
        }
    }
}

/// Anything with a store id that can sit on a frontier.
pub trait Identified {
    fn record_id(&self) -> &str;
}

impl Identified for ConversationTurn {
    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Identified for Event {
    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Identified for Document {
    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Identified for crate::core::tasks::Task {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// Membership test behind the frontier. Any index works as long as it
/// answers from the events' `ref_ids`.
pub trait SeenIndex {
    fn has_been_seen(&self, entity_id: &str, by: &SeenBy) -> Result<bool, QuorumError>;
}

/// Answers each lookup with an indexed query against the events table.
pub struct StoreSeenIndex<'a> {
    store: &'a Store,
}

impl<'a> StoreSeenIndex<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

impl SeenIndex for StoreSeenIndex<'_> {
    fn has_been_seen(&self, entity_id: &str, by: &SeenBy) -> Result<bool, QuorumError> {
        self.store.broker().with_conn(&by.actor, "frontier.seen", |conn| {
            let hit: i64 = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM events e, json_each(e.ref_ids) j
                    WHERE e.actor = ?1 AND e.event_type = ?2 AND j.value = ?3
                )",
                params![by.actor, by.event_type, entity_id],
                |row| row.get(0),
            )?;
            Ok(hit != 0)
        })
    }
}

/// Snapshot of every id referenced by one `(actor, event_type)`, loaded
/// with a single scan. Good for filtering large candidate batches.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    by: Option<SeenBy>,
    ids: FxHashSet<String>,
}

impl SeenSet {
    pub fn load(store: &Store, by: &SeenBy) -> Result<Self, QuorumError> {
        let ids = store.broker().with_conn(&by.actor, "frontier.load", |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT j.value FROM events e, json_each(e.ref_ids) j
                 WHERE e.actor = ?1 AND e.event_type = ?2",
            )?;
            let rows = stmt.query_map(params![by.actor, by.event_type], |row| {
                row.get::<_, String>(0)
            })?;
            let mut ids = FxHashSet::default();
            for r in rows {
                ids.insert(r?);
            }
            Ok(ids)
        })?;
        Ok(Self {
            by: Some(by.clone()),
            ids,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl SeenIndex for SeenSet {
    fn has_been_seen(&self, entity_id: &str, by: &SeenBy) -> Result<bool, QuorumError> {
        match &self.by {
            Some(loaded) if loaded == by => Ok(self.ids.contains(entity_id)),
            _ => Err(QuorumError::Validation(format!(
                "seen set was not loaded for {}/{}",
                by.actor, by.event_type
            ))),
        }
    }
}

/// The subset of `candidates` not yet referenced by `by`, in input order.
pub fn unseen<T, I>(index: &I, by: &SeenBy, candidates: Vec<T>) -> Result<Vec<T>, QuorumError>
where
    T: Identified,
    I: SeenIndex + ?Sized,
{
    let mut out = Vec::with_capacity(candidates.len());
    for c in candidates {
        if !index.has_been_seen(c.record_id(), by)? {
            out.push(c);
        }
    }
    Ok(out)
}

/// Appends the frontier condition for `id_column` to a query under
/// construction, so `LIMIT` applies after filtering.
pub(crate) fn push_anti_join(
    query: &mut String,
    args: &mut Vec<Box<dyn ToSql>>,
    id_column: &str,
    by: &SeenBy,
) {
    query.push_str(&format!(
        " AND {} NOT IN (SELECT j.value FROM events e, json_each(e.ref_ids) j WHERE e.actor = ? AND e.event_type = ?)",
        id_column
    ));
    args.push(Box::new(by.actor.clone()));
    args.push(Box::new(by.event_type));
}
