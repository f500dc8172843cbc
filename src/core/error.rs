use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuorumError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },
    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),
    #[error("Oracle timed out: {0}")]
    OracleTimeout(String),
}

impl QuorumError {
    /// Failures scoped to a single item of a batch. Runners log and count
    /// these instead of aborting the pass.
    pub fn is_item_recoverable(&self) -> bool {
        matches!(
            self,
            QuorumError::NotFound(_)
                | QuorumError::InvalidTransition { .. }
                | QuorumError::Validation(_)
        )
    }
}
