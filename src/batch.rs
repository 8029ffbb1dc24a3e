//! Batch operations: several mutations, one storage rewrite.

use crate::kv::KvStore;
use crate::queue::{
    PersistentQueue, contains_uid, first_unreserved, push_item, remove_matching, reserve_first,
};
use crate::types::{QueueItem, UID_CAPACITY, truncate};
use eyre::{Context, Result};

/// In-memory view of a queue while a batch is open.
///
/// Mirrors the queue's mutation API without persisting after each call.
pub struct QueueBatch<'a> {
    items: &'a mut Vec<QueueItem>,
}

impl QueueBatch<'_> {
    /// Append an item. Duplicate UIDs are allowed.
    pub fn add(&mut self, uid: &str, timestamp: &str, number: i32) -> Result<QueueItem> {
        push_item(self.items, uid, timestamp, number)
    }

    /// Append an item unless one with `uid` is already queued.
    pub fn add_if_new(&mut self, uid: &str, timestamp: &str, number: i32) -> Result<bool> {
        if self.exists(truncate(uid, UID_CAPACITY)) {
            return Ok(false);
        }
        self.add(uid, timestamp, number)?;
        Ok(true)
    }

    /// Remove every item with `uid`.
    pub fn remove_by_uid(&mut self, uid: &str) -> usize {
        remove_matching(self.items, uid)
    }

    /// Reserve the first item with `uid`.
    pub fn reserve_uid(&mut self, uid: &str) -> bool {
        reserve_first(self.items.as_mut_slice(), uid)
    }

    pub fn peek(&self) -> Option<QueueItem> {
        first_unreserved(self.items.as_slice()).cloned()
    }

    pub fn exists(&self, uid: &str) -> bool {
        contains_uid(self.items.as_slice(), uid)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Extension trait for batch operations on a queue.
pub trait QueueBatchExt {
    /// Apply `f` in memory and save once if it succeeds.
    ///
    /// On error nothing is written and the queue is left as it was before the batch.
    fn batch<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut QueueBatch<'_>) -> Result<T>;

    /// Add several `(uid, timestamp, number)` entries with `add_if_new` semantics.
    /// Returns how many were added.
    fn batch_add_if_new(&mut self, entries: &[(&str, &str, i32)]) -> Result<usize>;

    /// Remove every item matching any of `uids`. Returns how many were removed.
    fn batch_remove(&mut self, uids: &[&str]) -> Result<usize>;
}

impl<K: KvStore> QueueBatchExt for PersistentQueue<K> {
    fn batch<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut QueueBatch<'_>) -> Result<T>,
    {
        self.apply(|items| {
            let mut batch = QueueBatch { items };
            f(&mut batch)
        })
    }

    fn batch_add_if_new(&mut self, entries: &[(&str, &str, i32)]) -> Result<usize> {
        self.batch(|b| {
            let mut added = 0;
            for (i, (uid, timestamp, number)) in entries.iter().enumerate() {
                if b.add_if_new(uid, timestamp, *number)
                    .with_context(|| format!("Entry {} rejected", i))?
                {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    fn batch_remove(&mut self, uids: &[&str]) -> Result<usize> {
        self.batch(|b| Ok(uids.iter().map(|uid| b.remove_by_uid(uid)).sum::<usize>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvHandle, MemoryKv};
    use crate::queue::COUNT_KEY;

    fn setup_test_queue() -> PersistentQueue<MemoryKv> {
        PersistentQueue::new(MemoryKv::new(), "test")
    }

    fn reload(queue: PersistentQueue<MemoryKv>) -> PersistentQueue<MemoryKv> {
        PersistentQueue::open(queue.into_store(), "test").unwrap()
    }

    #[test]
    fn test_batch_commits_once() {
        let mut queue = setup_test_queue();

        let peeked = queue
            .batch(|b| {
                b.add("a", "t", 1)?;
                b.add("b", "t", 2)?;
                b.add("c", "t", 3)?;
                b.reserve_uid("a");
                b.remove_by_uid("c");
                Ok(b.peek())
            })
            .unwrap();

        assert_eq!(peeked.unwrap().uid, "b");
        assert_eq!(queue.len(), 2);

        let queue = reload(queue);
        let uids: Vec<&str> = queue.items().iter().map(|i| i.uid.as_str()).collect();
        assert_eq!(uids, vec!["a", "b"]);
        assert!(queue.items()[0].reserved);
    }

    #[test]
    fn test_batch_error_rolls_back() {
        let mut queue = setup_test_queue();
        queue.add("keep", "t", 1).unwrap();

        let result = queue.batch(|b| {
            b.remove_by_uid("keep");
            b.add("new", "t", 2)?;
            b.add("bad,uid", "t", 3)?;
            Ok(())
        });

        assert!(result.is_err());
        assert!(queue.exists("keep"));
        assert!(!queue.exists("new"));

        let queue = reload(queue);
        assert_eq!(queue.len(), 1);
        assert!(queue.exists("keep"));
    }

    #[test]
    fn test_batch_add_if_new() {
        let mut queue = setup_test_queue();
        queue.add("a", "t", 1).unwrap();

        let added = queue
            .batch_add_if_new(&[("a", "t", 9), ("b", "t", 2), ("b", "t", 3)])
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.items()[1].number, 2);
    }

    #[test]
    fn test_batch_add_if_new_rejects_whole_batch() {
        let mut queue = setup_test_queue();

        let err = queue
            .batch_add_if_new(&[("a", "t", 1), ("b", "2024,01", 2)])
            .unwrap_err();

        assert!(err.to_string().contains("Entry 1"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_batch_remove() {
        let mut queue = setup_test_queue();
        queue.batch_add_if_new(&[("a", "t", 1), ("b", "t", 2), ("c", "t", 3)]).unwrap();

        let removed = queue.batch_remove(&["a", "c", "missing"]).unwrap();

        assert_eq!(removed, 2);
        let queue = reload(queue);
        assert_eq!(queue.len(), 1);
        assert!(queue.exists("b"));
    }

    #[test]
    fn test_empty_batch_still_saves() {
        let mut queue = setup_test_queue();

        queue.batch(|_| Ok(())).unwrap();

        let mut kv = queue.into_store();
        let handle = kv.open("test", true).unwrap();
        assert_eq!(handle.get_u32(COUNT_KEY, 99).unwrap(), 0);
    }
}
