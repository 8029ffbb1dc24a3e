//! Durable key-value store backed by a single SQLite file.
//!
//! Every opened namespace is a SQLite transaction. `close()` commits it; a handle
//! dropped without closing rolls back, so a rewrite cut short leaves the previous
//! contents in place.

use super::{KvError, KvHandle, KvStore, validate_namespace};
use eyre::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::fs;
use std::path::{Path, PathBuf};

/// SQLite-backed namespaced store.
pub struct SqliteKv {
    path: PathBuf,
    db: Connection,
}

impl SqliteKv {
    /// Open or create the store file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create store directory")?;
        }

        let db = Connection::open(path).context("Failed to open SQLite database")?;
        let store = Self {
            path: path.to_path_buf(),
            db,
        };
        store.init_schema()?;

        log::debug!("Opened kv store at {}", path.display());
        Ok(store)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                r#"
                PRAGMA synchronous = FULL;

                CREATE TABLE IF NOT EXISTS kv (
                    namespace TEXT NOT NULL,
                    key TEXT NOT NULL,
                    value BLOB NOT NULL,
                    PRIMARY KEY (namespace, key)
                );
            "#,
            )
            .context("Failed to initialize schema")?;

        Ok(())
    }
}

impl KvStore for SqliteKv {
    type Handle<'a> = SqliteHandle<'a>;

    fn open(&mut self, namespace: &str, read_only: bool) -> Result<Self::Handle<'_>> {
        validate_namespace(namespace).map_err(|e| eyre::eyre!(e))?;

        let tx = self
            .db
            .transaction()
            .with_context(|| format!("Failed to open namespace '{}'", namespace))?;

        Ok(SqliteHandle {
            namespace: namespace.to_string(),
            tx,
            read_only,
        })
    }
}

/// Open namespace of a `SqliteKv`.
pub struct SqliteHandle<'a> {
    namespace: String,
    tx: Transaction<'a>,
    read_only: bool,
}

impl SqliteHandle<'_> {
    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(eyre::eyre!(KvError::ReadOnly(self.namespace.clone())));
        }
        Ok(())
    }

    fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let value = self
            .tx
            .query_row(
                "SELECT value FROM kv WHERE namespace = ? AND key = ?",
                params![self.namespace, key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read key '{}'", key))?;

        Ok(value)
    }

    fn put_value(&mut self, key: &str, value: Value) -> Result<()> {
        self.check_writable()?;
        self.tx
            .execute(
                "INSERT OR REPLACE INTO kv (namespace, key, value) VALUES (?, ?, ?)",
                params![self.namespace, key, value],
            )
            .with_context(|| format!("Failed to write key '{}'", key))?;

        Ok(())
    }
}

impl KvHandle for SqliteHandle<'_> {
    fn get_u32(&self, key: &str, default: u32) -> Result<u32> {
        match self.get_value(key)? {
            Some(Value::Integer(v)) => Ok(u32::try_from(v).unwrap_or(default)),
            _ => Ok(default),
        }
    }

    fn put_u32(&mut self, key: &str, value: u32) -> Result<()> {
        self.put_value(key, Value::Integer(i64::from(value)))
    }

    fn get_string(&self, key: &str, default: &str) -> Result<String> {
        match self.get_value(key)? {
            Some(Value::Text(s)) => Ok(s),
            _ => Ok(default.to_string()),
        }
    }

    fn put_string(&mut self, key: &str, value: &str) -> Result<()> {
        self.put_value(key, Value::Text(value.to_string()))
    }

    fn clear(&mut self) -> Result<()> {
        self.check_writable()?;
        self.tx
            .execute("DELETE FROM kv WHERE namespace = ?", params![self.namespace])
            .context("Failed to clear namespace")?;

        Ok(())
    }

    fn close(self) -> Result<()> {
        let Self { namespace, tx, .. } = self;
        tx.commit()
            .with_context(|| format!("Failed to commit namespace '{}'", namespace))
    }
}
