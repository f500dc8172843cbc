use crate::core::db;
use crate::core::error::QuorumError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::debug;

/// The DB Broker is the single path to the record store.
///
/// Within one process it serializes access; across processes the store is the
/// only shared resource and SQLite's own locking applies. No lock is held
/// between calls, so nothing is held while a runner waits on the oracle.
pub struct DbBroker {
    db_path: PathBuf,
}

impl DbBroker {
    pub fn new(db_path: &Path) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Execute a closure with a serialized connection to the store.
    pub fn with_conn<F, R>(&self, actor: &str, op_name: &str, f: F) -> Result<R, QuorumError>
    where
        F: FnOnce(&Connection) -> Result<R, QuorumError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let started = Instant::now();
        let conn = db::db_connect(&self.db_path.to_string_lossy())?;
        let result = f(&conn);

        debug!(
            actor,
            op = op_name,
            status = if result.is_ok() { "success" } else { "error" },
            elapsed_ms = started.elapsed().as_millis() as u64,
            "store op"
        );
        result
    }

    /// Like [`with_conn`](Self::with_conn) but wraps the closure in a transaction.
    pub fn with_tx<F, R>(&self, actor: &str, op_name: &str, f: F) -> Result<R, QuorumError>
    where
        F: FnOnce(&Connection) -> Result<R, QuorumError>,
    {
        self.with_conn(actor, op_name, |conn| {
            let tx = conn.unchecked_transaction()?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
    }
}
