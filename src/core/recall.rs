//! Lexical recall over stored memory.
//!
//! Scores recent documents, events and turns against a query with a
//! term-frequency cosine. Cheap, deterministic and good enough to surface
//! candidates for the connector; the oracle does the real judging.

use crate::core::error::QuorumError;
use crate::core::records::{self, DocumentQuery, EventQuery, TurnQuery};
use crate::core::store::Store;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::LazyLock;

pub const MAX_QUERY_CHARS: usize = 2000;
/// Most recent records of each kind considered per search.
const SCAN_LIMIT: usize = 1000;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "i",
    "if", "in", "into", "is", "it", "its", "me", "my", "no", "not", "of", "on", "or", "our", "so",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "to", "too", "us",
    "was", "we", "were", "what", "when", "which", "who", "will", "with", "you", "your",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    Document,
    Event,
    Turn,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecallHit {
    pub ref_type: RefType,
    pub ref_id: String,
    pub score: f64,
    pub title: String,
    pub content: String,
}

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+").expect("static regex"));

pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| t.len() > 1 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

type TermVector = FxHashMap<String, f64>;

fn term_vector(text: &str) -> TermVector {
    let mut tf = TermVector::default();
    for t in tokenize(text) {
        *tf.entry(t).or_insert(0.0) += 1.0;
    }
    tf
}

fn norm(v: &TermVector) -> f64 {
    v.values().map(|x| x * x).sum::<f64>().sqrt()
}

fn cosine(q: &TermVector, q_norm: f64, d: &TermVector) -> f64 {
    let d_norm = norm(d);
    if q_norm == 0.0 || d_norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = q
        .iter()
        .filter_map(|(t, w)| d.get(t).map(|dw| w * dw))
        .sum();
    dot / (q_norm * d_norm)
}

/// Cosine similarity of two texts in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let va = term_vector(a);
    cosine(&va, norm(&va), &term_vector(b))
}

/// Up to `limit` stored records most similar to `text`, best first.
/// Records with zero overlap are never returned.
pub fn search(store: &Store, text: &str, limit: usize) -> Result<Vec<RecallHit>, QuorumError> {
    let query: String = text.chars().take(MAX_QUERY_CHARS).collect();
    let q = term_vector(&query);
    let q_norm = norm(&q);
    if q_norm == 0.0 {
        return Ok(Vec::new());
    }

    let mut hits = Vec::new();
    let mut consider = |ref_type: RefType, id: &str, title: &str, body: &str| {
        let score = cosine(&q, q_norm, &term_vector(&format!("{title}\n{body}")));
        if score > 0.0 {
            hits.push(RecallHit {
                ref_type,
                ref_id: id.to_string(),
                score,
                title: title.to_string(),
                content: body.to_string(),
            });
        }
    };

    for d in records::query_documents(store, &DocumentQuery { limit: SCAN_LIMIT, ..DocumentQuery::default() })? {
        consider(RefType::Document, &d.id, &d.title, &d.content);
    }
    for e in records::query_events(store, &EventQuery { limit: SCAN_LIMIT, ..EventQuery::default() })? {
        consider(RefType::Event, &e.id, &e.title, &e.description);
    }
    for t in records::query_turns(store, &TurnQuery { limit: SCAN_LIMIT, ..TurnQuery::default() })? {
        consider(RefType::Turn, &t.id, "", &t.content);
    }

    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.ref_id.cmp(&b.ref_id))
    });
    hits.truncate(limit);
    Ok(hits)
}
