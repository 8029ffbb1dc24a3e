//! Location and namespace of the queue the CLI operates on.

use crate::kv::SqliteKv;
use crate::queue::PersistentQueue;
use eyre::{Context, Result};
use std::path::PathBuf;

/// Default namespace inside the store.
pub const DEFAULT_NAMESPACE: &str = "queue";

/// Store file name within the data directory.
const DB_FILE: &str = "queue.db";

/// Configuration for opening a queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// SQLite file backing the key-value store
    pub db_path: PathBuf,

    /// Namespace holding this queue's keys
    pub namespace: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            db_path: data_dir().join(DB_FILE),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl QueueConfig {
    /// Create config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store file.
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Set the namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Open the store file and load the queue from it.
    pub fn open_queue(&self) -> Result<PersistentQueue<SqliteKv>> {
        let store = SqliteKv::open(&self.db_path)
            .with_context(|| format!("Failed to open store at {}", self.db_path.display()))?;
        PersistentQueue::open(store, self.namespace.clone()).context("Failed to load queue")
    }
}

/// Per-user data directory for nvqueue files.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nvqueue")
}
