//! Schema definitions for the shared record store.
//!
//! One SQLite database holds the four entity tables. Timestamps are unix
//! seconds; `metadata`, `ref_ids` and `tags` are JSON text.

pub const STORE_DB_NAME: &str = "quorum.db";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const PROMPTS_DIR_NAME: &str = "prompts";

pub const STORE_SCHEMA_VERSION: u32 = 2;

pub const STORE_DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const STORE_DB_SCHEMA_TURNS: &str = "
    CREATE TABLE IF NOT EXISTS conversation_turns (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
";
pub const STORE_DB_SCHEMA_INDEX_TURNS_CREATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_turns_created ON conversation_turns(created_at)";
pub const STORE_DB_SCHEMA_INDEX_TURNS_CONVERSATION: &str =
    "CREATE INDEX IF NOT EXISTS idx_turns_conversation ON conversation_turns(conversation_id)";

pub const STORE_DB_SCHEMA_EVENTS: &str = "
    CREATE TABLE IF NOT EXISTS events (
        id TEXT PRIMARY KEY,
        event_type TEXT NOT NULL,
        actor TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        metadata TEXT NOT NULL DEFAULT '{}', -- JSON object
        ref_ids TEXT NOT NULL DEFAULT '[]', -- JSON array, ordered
        created_at INTEGER NOT NULL
    )
";
pub const STORE_DB_SCHEMA_INDEX_EVENTS_ACTOR_TYPE: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_actor_type ON events(actor, event_type)";
pub const STORE_DB_SCHEMA_INDEX_EVENTS_CREATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at)";

pub const STORE_DB_SCHEMA_TASKS: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL,
        priority INTEGER NOT NULL,
        owner TEXT,
        due_at INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        completed_at INTEGER,
        metadata TEXT NOT NULL DEFAULT '{}',
        CHECK ((status = 'done') = (completed_at IS NOT NULL))
    )
";
pub const STORE_DB_SCHEMA_INDEX_TASKS_STATUS: &str =
    "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)";
pub const STORE_DB_SCHEMA_INDEX_TASKS_TITLE: &str =
    "CREATE INDEX IF NOT EXISTS idx_tasks_title ON tasks(title)";

pub const STORE_DB_SCHEMA_DOCUMENTS: &str = "
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        doc_type TEXT NOT NULL,
        source TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '[]', -- JSON array, set semantics
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at INTEGER NOT NULL
    )
";
pub const STORE_DB_SCHEMA_INDEX_DOCUMENTS_CREATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_documents_created ON documents(created_at)";
pub const STORE_DB_SCHEMA_INDEX_DOCUMENTS_SOURCE: &str =
    "CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source)";
