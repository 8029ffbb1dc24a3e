//! Shared test infrastructure for nvqueue integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use nvqueue::{KvHandle, KvStore, MemoryKv, PersistentQueue, QueueItem, SqliteKv};
use std::path::PathBuf;
use tempfile::TempDir;

/// Namespace used by every test queue.
pub const NS: &str = "testq";

/// Test environment backed by a SQLite file in a temp dir.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub queue: PersistentQueue<SqliteKv>,
}

impl TestEnv {
    /// Create a new test environment with an empty queue.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = SqliteKv::open(&temp_dir.path().join("queue.db")).expect("Failed to open store");
        let queue = PersistentQueue::open(store, NS).expect("Failed to load queue");
        Self { temp_dir, queue }
    }

    pub fn db_path(&self) -> PathBuf {
        self.temp_dir.path().join("queue.db")
    }

    /// Add an item with a fixed timestamp.
    pub fn add(&mut self, uid: &str, number: i32) -> QueueItem {
        self.queue
            .add(uid, "2024-01-01T00:00:00", number)
            .expect("Failed to add item")
    }

    /// Reserve an item by UID.
    pub fn reserve(&mut self, uid: &str) {
        self.queue.reserve_uid(uid).expect("Failed to reserve item");
    }

    /// Open a second queue over the same file, as after a restart.
    pub fn reopen(&self) -> PersistentQueue<SqliteKv> {
        let store = SqliteKv::open(&self.db_path()).expect("Failed to reopen store");
        PersistentQueue::open(store, NS).expect("Failed to reload queue")
    }

    /// UIDs in queue order.
    pub fn uids(&self) -> Vec<String> {
        uids_of(&self.queue)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// UIDs of any queue in order.
pub fn uids_of<K: KvStore>(queue: &PersistentQueue<K>) -> Vec<String> {
    queue.items().iter().map(|i| i.uid.clone()).collect()
}

/// A memory store with raw slots written directly, bypassing the queue.
pub fn memory_store_with(count: u32, slots: &[(&str, &str)]) -> MemoryKv {
    let mut kv = MemoryKv::new();
    let mut handle = kv.open(NS, false).expect("Failed to open namespace");
    handle.put_u32("count", count).expect("Failed to write count");
    for (key, value) in slots {
        handle.put_string(key, value).expect("Failed to write slot");
    }
    handle.close().expect("Failed to close namespace");
    kv
}
