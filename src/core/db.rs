use crate::core::error::QuorumError;
use crate::core::schemas;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, QuorumError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

pub fn store_db_path(root: &Path) -> PathBuf {
    root.join(schemas::STORE_DB_NAME)
}

/// Creates or upgrades the four entity tables. Idempotent.
pub fn ensure_schema(conn: &Connection) -> Result<(), QuorumError> {
    conn.execute(schemas::STORE_DB_SCHEMA_META, [])?;

    let current: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    let current_version: u32 = current
        .as_deref()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);

    if current_version >= schemas::STORE_SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute(schemas::STORE_DB_SCHEMA_TURNS, [])?;
    conn.execute(schemas::STORE_DB_SCHEMA_INDEX_TURNS_CREATED, [])?;
    conn.execute(schemas::STORE_DB_SCHEMA_EVENTS, [])?;
    conn.execute(schemas::STORE_DB_SCHEMA_INDEX_EVENTS_ACTOR_TYPE, [])?;
    conn.execute(schemas::STORE_DB_SCHEMA_INDEX_EVENTS_CREATED, [])?;
    conn.execute(schemas::STORE_DB_SCHEMA_TASKS, [])?;
    conn.execute(schemas::STORE_DB_SCHEMA_INDEX_TASKS_STATUS, [])?;
    conn.execute(schemas::STORE_DB_SCHEMA_DOCUMENTS, [])?;
    conn.execute(schemas::STORE_DB_SCHEMA_INDEX_DOCUMENTS_CREATED, [])?;

    if current_version < 2 {
        // Version 2 indexed the lookups used for task dedup, digests and source filters.
        conn.execute(schemas::STORE_DB_SCHEMA_INDEX_TASKS_TITLE, [])?;
        conn.execute(schemas::STORE_DB_SCHEMA_INDEX_TURNS_CONVERSATION, [])?;
        conn.execute(schemas::STORE_DB_SCHEMA_INDEX_DOCUMENTS_SOURCE, [])?;
    }

    conn.execute(
        "INSERT INTO meta(key, value) VALUES('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [schemas::STORE_SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}
