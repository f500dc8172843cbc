//! System prompts for the agent roles.
//!
//! Defaults are baked into the binary from `prompts/`. A store may override
//! any of them with `<store>/prompts/<role>.txt`.

use crate::core::error::QuorumError;
use crate::core::schemas::PROMPTS_DIR_NAME;
use crate::core::store::Store;
use rust_embed::RustEmbed;
use std::fs;

#[derive(RustEmbed)]
#[folder = "prompts/"]
struct DefaultPrompts;

fn file_name(role: &str) -> String {
    format!("{role}.txt")
}

pub fn embedded(role: &str) -> Option<String> {
    DefaultPrompts::get(&file_name(role))
        .map(|f| String::from_utf8_lossy(&f.data).into_owned())
}

pub fn list_embedded() -> Vec<String> {
    let mut names: Vec<String> = DefaultPrompts::iter()
        .filter_map(|p| p.strip_suffix(".txt").map(str::to_string))
        .collect();
    names.sort();
    names
}

/// The system prompt for `role`: the store override if present, else the
/// embedded default. An unknown role with no override is an error.
pub fn system_prompt(store: &Store, role: &str) -> Result<String, QuorumError> {
    let override_path = store.root.join(PROMPTS_DIR_NAME).join(file_name(role));
    if override_path.is_file() {
        return Ok(fs::read_to_string(&override_path)?);
    }
    embedded(role).ok_or_else(|| QuorumError::NotFound(format!("system prompt for '{role}'")))
}
