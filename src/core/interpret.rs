//! Oracle response interpretation.
//!
//! Two stages, each usable on its own: [`strip_fences`] normalizes the raw
//! text, then [`decode_list`] / [`decode_object`] turn it into typed values.
//! Neither stage ever fails: anything unusable becomes the caller's empty
//! default plus a warning.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::warn;

const FENCE: &str = "```";
const PREVIEW_CHARS: usize = 200;

/// Removes surrounding whitespace and one layer of markdown code fence.
///
/// An opening fence drops its whole first line (language tag included). A
/// lone fence with no newline drops just the three backticks. A trailing
/// fence is removed independently, so truncated blocks still normalize.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if text.starts_with(FENCE) {
        text = match text.find('\n') {
            Some(nl) => &text[nl + 1..],
            None => &text[FENCE.len()..],
        };
    }
    if let Some(stripped) = text.strip_suffix(FENCE) {
        text = stripped;
    }
    text.trim()
}

fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}

fn decode_value(role: &str, raw: &str) -> Option<JsonValue> {
    match serde_json::from_str::<JsonValue>(strip_fences(raw)) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(role, error = %e, preview = %preview(raw), "failed to parse oracle response");
            None
        }
    }
}

/// Decodes a top-level JSON array. Elements that do not fit `T` are skipped
/// individually; a non-array or unparseable response yields an empty list.
pub fn decode_list<T: DeserializeOwned>(role: &str, raw: &str) -> Vec<T> {
    let items = match decode_value(role, raw) {
        Some(JsonValue::Array(items)) => items,
        Some(other) => {
            warn!(role, found = json_kind(&other), "expected a JSON array from oracle");
            return Vec::new();
        }
        None => return Vec::new(),
    };

    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if decoded.len() < total {
        warn!(
            role,
            skipped = total - decoded.len(),
            "dropped malformed items from oracle response"
        );
    }
    decoded
}

/// Decodes a top-level JSON object into `T`, or `T::default()` if the
/// response is unparseable, not an object, or does not fit `T`.
pub fn decode_object<T: DeserializeOwned + Default>(role: &str, raw: &str) -> T {
    match decode_value(role, raw) {
        Some(v @ JsonValue::Object(_)) => match serde_json::from_value(v) {
            Ok(t) => t,
            Err(e) => {
                warn!(role, error = %e, "oracle object did not match expected shape");
                T::default()
            }
        },
        Some(other) => {
            warn!(role, found = json_kind(&other), "expected a JSON object from oracle");
            T::default()
        }
        None => T::default(),
    }
}

fn json_kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
