//! nvqueue: a small persistent work queue mirrored to namespaced key-value storage.
//!
//! Items are identified by UID, kept in insertion order, and can be reserved so that
//! `peek` skips them without removing them. Every mutation rewrites the whole queue
//! into the backing store, so the queue survives power loss between calls.
//!
//! # Example
//!
//! ```no_run
//! use nvqueue::{PersistentQueue, SqliteKv};
//! use std::path::Path;
//!
//! let store = SqliteKv::open(Path::new("queue.db")).unwrap();
//! let mut queue = PersistentQueue::open(store, "queue").unwrap();
//!
//! queue.add("u1", "2024-01-01T00:00:00", 5).unwrap();
//! queue.add_if_new("u2", "2024-01-01T00:00:01", 7).unwrap();
//!
//! // Claim u1; peek now skips it
//! queue.reserve_uid("u1").unwrap();
//! assert_eq!(queue.peek().unwrap().uid, "u2");
//!
//! // Done with u1
//! queue.remove_by_uid("u1").unwrap();
//! assert!(!queue.exists("u1"));
//! ```

mod id;
mod queue;
mod types;

pub mod batch;
pub mod config;
pub mod kv;

// Re-export public API
pub use batch::{QueueBatch, QueueBatchExt};
pub use config::QueueConfig;
pub use id::{generate_uid, timestamp_now};
pub use kv::{KvError, KvHandle, KvStore, MemoryKv, SqliteKv};
pub use queue::{COUNT_KEY, PersistentQueue, QueueError, item_key};
pub use types::{QueueItem, TIMESTAMP_CAPACITY, UID_CAPACITY, ValidationError};
