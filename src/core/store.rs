//! Store handle for the shared record store.
//!
//! A `Store` is the root directory holding the SQLite database, the optional
//! settings file and prompt overrides. Every runner opens its own handle; the
//! database is the only state shared between concurrently running agents.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::QuorumError;
use crate::core::time::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct Store {
    /// Absolute path to the store root directory
    pub root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("root", &self.root).finish()
    }
}

impl Store {
    /// Opens (creating if needed) the store at `root` on the system clock.
    pub fn open(root: &Path) -> Result<Self, QuorumError> {
        Self::open_with_clock(root, Arc::new(SystemClock))
    }

    pub fn open_with_clock(root: &Path, clock: Arc<dyn Clock>) -> Result<Self, QuorumError> {
        fs::create_dir_all(root)?;
        let store = Self {
            root: root.to_path_buf(),
            clock,
        };
        store
            .broker()
            .with_conn("quorum", "store.init", db::ensure_schema)?;
        Ok(store)
    }

    pub fn db_path(&self) -> PathBuf {
        db::store_db_path(&self.root)
    }

    pub fn broker(&self) -> DbBroker {
        DbBroker::new(&self.db_path())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
