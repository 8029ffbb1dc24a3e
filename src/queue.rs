//! Persistent queue: an in-memory sequence mirrored to a key-value namespace.

use crate::kv::{KvHandle, KvStore};
use crate::types::{QueueItem, UID_CAPACITY, ValidationError, truncate};
use eyre::{Context, Result};
use std::fmt;

/// Key holding the number of item slots written.
pub const COUNT_KEY: &str = "count";

/// Storage key for the item at `index`.
pub fn item_key(index: usize) -> String {
    format!("item{}", index)
}

/// Errors that can occur during queue operations.
#[derive(Debug)]
pub enum QueueError {
    /// Item fields cannot be stored.
    Validation(ValidationError),
    /// More items than the count key can describe.
    TooManyItems(usize),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Validation(e) => write!(f, "validation error: {}", e),
            QueueError::TooManyItems(n) => write!(f, "too many items to persist: {}", n),
        }
    }
}

impl std::error::Error for QueueError {}

/// Ordered, reservable work queue whose full state is rewritten to storage after
/// every mutation.
pub struct PersistentQueue<K: KvStore> {
    store: K,
    namespace: String,
    items: Vec<QueueItem>,
}

impl<K: KvStore> PersistentQueue<K> {
    /// Create an empty queue. Nothing is read until `load`.
    pub fn new(store: K, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            items: Vec::new(),
        }
    }

    /// Create a queue and hydrate it from storage.
    pub fn open(store: K, namespace: impl Into<String>) -> Result<Self> {
        let mut queue = Self::new(store, namespace);
        queue.load()?;
        Ok(queue)
    }

    /// Replace the in-memory sequence with what storage holds.
    ///
    /// Empty or missing slots below `count` are skipped, so the loaded queue can be
    /// shorter than the stored count.
    pub fn load(&mut self) -> Result<()> {
        let handle = self
            .store
            .open(&self.namespace, true)
            .context("Failed to open queue storage for reading")?;

        let count = handle.get_u32(COUNT_KEY, 0)?;
        let mut items = Vec::new();

        for i in 0..count as usize {
            let key = item_key(i);
            let record = handle.get_string(&key, "")?;
            if record.is_empty() {
                log::debug!("Skipping empty slot {} in namespace {}", key, self.namespace);
                continue;
            }
            if !QueueItem::is_well_formed_record(&record) {
                log::warn!("Malformed record at {}: {:?}", key, record);
            }
            items.push(QueueItem::from_record(&record));
        }

        handle.close()?;

        log::debug!(
            "Loaded {} item(s) from namespace {} (count={})",
            items.len(),
            self.namespace,
            count
        );
        self.items = items;

        Ok(())
    }

    /// Clear the namespace and write the whole sequence back.
    pub fn save(&mut self) -> Result<()> {
        let count = u32::try_from(self.items.len())
            .map_err(|_| eyre::eyre!(QueueError::TooManyItems(self.items.len())))?;

        let mut handle = self
            .store
            .open(&self.namespace, false)
            .context("Failed to open queue storage for writing")?;

        handle.clear()?;
        handle.put_u32(COUNT_KEY, count)?;
        for (i, item) in self.items.iter().enumerate() {
            handle.put_string(&item_key(i), &item.to_record())?;
        }
        handle.close().context("Failed to persist queue")?;

        log::debug!("Saved {} item(s) to namespace {}", count, self.namespace);

        Ok(())
    }

    /// Append an item and persist. Duplicate UIDs are allowed.
    pub fn add(&mut self, uid: &str, timestamp: &str, number: i32) -> Result<QueueItem> {
        self.apply(|items| push_item(items, uid, timestamp, number))
    }

    /// Append an item only if no item with `uid` is queued. Returns whether one was added.
    ///
    /// The check uses the uid as it would be stored, so oversized uids still dedupe.
    pub fn add_if_new(&mut self, uid: &str, timestamp: &str, number: i32) -> Result<bool> {
        if self.exists(truncate(uid, UID_CAPACITY)) {
            return Ok(false);
        }
        self.add(uid, timestamp, number)?;
        Ok(true)
    }

    /// Remove every item with `uid` and persist. Returns how many were removed.
    pub fn remove_by_uid(&mut self, uid: &str) -> Result<usize> {
        self.apply(|items| Ok(remove_matching(items, uid)))
    }

    /// Reserve the first item with `uid` and persist. Returns whether one matched.
    pub fn reserve_uid(&mut self, uid: &str) -> Result<bool> {
        self.apply(|items| Ok(reserve_first(items, uid)))
    }

    /// Copy of the first unreserved item, if any.
    pub fn peek(&self) -> Option<QueueItem> {
        first_unreserved(&self.items).cloned()
    }

    /// Whether any item has `uid`.
    pub fn exists(&self, uid: &str) -> bool {
        contains_uid(&self.items, uid)
    }

    /// Items in queue order.
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    /// Give back the underlying store.
    pub fn into_store(self) -> K {
        self.store
    }

    /// Write the diagnostic dump to stdout.
    pub fn print(&self) {
        print!("{}", self);
    }

    /// Run `f` against the sequence, then save.
    ///
    /// If `f` or the save fails, the sequence is put back the way it was, so memory
    /// never runs ahead of storage.
    pub(crate) fn apply<T>(
        &mut self,
        f: impl FnOnce(&mut Vec<QueueItem>) -> Result<T>,
    ) -> Result<T> {
        let snapshot = self.items.clone();
        let result = f(&mut self.items).and_then(|value| {
            self.save()?;
            Ok(value)
        });
        if result.is_err() {
            self.items = snapshot;
        }
        result
    }
}

impl<K: KvStore> fmt::Display for PersistentQueue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "---- PersistentQueue ----")?;
        for item in &self.items {
            writeln!(
                f,
                "UID: {}, Num: {}, Reserved: {}",
                item.uid,
                item.number,
                if item.reserved { "Yes" } else { "No" }
            )?;
        }
        writeln!(f, "-------------------------")
    }
}

pub(crate) fn push_item(
    items: &mut Vec<QueueItem>,
    uid: &str,
    timestamp: &str,
    number: i32,
) -> Result<QueueItem> {
    let item = QueueItem::new(uid, timestamp, number);
    item.validate()
        .map_err(|e| eyre::eyre!(QueueError::Validation(e)))?;
    items.push(item.clone());
    Ok(item)
}

pub(crate) fn remove_matching(items: &mut Vec<QueueItem>, uid: &str) -> usize {
    let before = items.len();
    items.retain(|item| item.uid != uid);
    before - items.len()
}

pub(crate) fn reserve_first(items: &mut [QueueItem], uid: &str) -> bool {
    match items.iter_mut().find(|item| item.uid == uid) {
        Some(item) => {
            item.reserved = true;
            true
        }
        None => false,
    }
}

pub(crate) fn first_unreserved(items: &[QueueItem]) -> Option<&QueueItem> {
    items.iter().find(|item| !item.reserved)
}

pub(crate) fn contains_uid(items: &[QueueItem], uid: &str) -> bool {
    items.iter().any(|item| item.uid == uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    fn setup_test_queue() -> PersistentQueue<MemoryKv> {
        PersistentQueue::new(MemoryKv::new(), "test")
    }

    fn stored_count(queue: &mut PersistentQueue<MemoryKv>) -> u32 {
        let ns = queue.namespace.clone();
        let handle = queue.store.open(&ns, true).unwrap();
        handle.get_u32(COUNT_KEY, 0).unwrap()
    }

    #[test]
    fn test_item_key() {
        assert_eq!(item_key(0), "item0");
        assert_eq!(item_key(12), "item12");
    }

    #[test]
    fn test_add_persists_immediately() {
        let mut queue = setup_test_queue();

        let item = queue.add("u1", "2024-01-01T00:00:00", 5).unwrap();

        assert_eq!(item.uid, "u1");
        assert!(!item.reserved);
        assert_eq!(queue.len(), 1);
        assert_eq!(stored_count(&mut queue), 1);
    }

    #[test]
    fn test_add_rejects_delimiter() {
        let mut queue = setup_test_queue();

        let err = queue.add("u,1", "ts", 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QueueError>(),
            Some(QueueError::Validation(ValidationError::DelimiterInUid(_)))
        ));
        assert!(queue.is_empty());
        assert_eq!(stored_count(&mut queue), 0);
    }

    #[test]
    fn test_add_allows_duplicates() {
        let mut queue = setup_test_queue();

        queue.add("u1", "t", 1).unwrap();
        queue.add("u1", "t", 2).unwrap();

        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_add_if_new_skips_existing() {
        let mut queue = setup_test_queue();

        assert!(queue.add_if_new("u1", "t", 1).unwrap());
        assert!(!queue.add_if_new("u1", "t", 2).unwrap());

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.items()[0].number, 1);
    }

    #[test]
    fn test_add_if_new_dedupes_oversized_uid() {
        let mut queue = setup_test_queue();
        let long_uid = "x".repeat(25);

        assert!(queue.add_if_new(&long_uid, "t", 1).unwrap());
        assert!(!queue.add_if_new(&long_uid, "t", 2).unwrap());

        assert_eq!(queue.len(), 1);
        // Lookups match the stored, truncated uid exactly
        assert!(queue.exists(&"x".repeat(19)));
        assert!(!queue.exists(&long_uid));
    }

    #[test]
    fn test_remove_by_uid_removes_all_and_keeps_order() {
        let mut queue = setup_test_queue();
        queue.add("a", "t", 1).unwrap();
        queue.add("x", "t", 2).unwrap();
        queue.add("b", "t", 3).unwrap();
        queue.add("x", "t", 4).unwrap();
        queue.add("c", "t", 5).unwrap();

        assert_eq!(queue.remove_by_uid("x").unwrap(), 2);

        let uids: Vec<&str> = queue.items().iter().map(|i| i.uid.as_str()).collect();
        assert_eq!(uids, vec!["a", "b", "c"]);
        assert_eq!(stored_count(&mut queue), 3);
    }

    #[test]
    fn test_remove_missing_still_persists() {
        let mut queue = setup_test_queue();
        queue.add("a", "t", 1).unwrap();

        // Tamper with storage, a no-op remove must rewrite it from memory
        {
            let mut handle = queue.store.open("test", false).unwrap();
            handle.put_u32(COUNT_KEY, 9).unwrap();
        }

        assert_eq!(queue.remove_by_uid("missing").unwrap(), 0);
        assert_eq!(stored_count(&mut queue), 1);
    }

    #[test]
    fn test_reserve_first_match_only() {
        let mut queue = setup_test_queue();
        queue.add("x", "t", 1).unwrap();
        queue.add("y", "t", 2).unwrap();
        queue.add("x", "t", 3).unwrap();

        assert!(queue.reserve_uid("x").unwrap());

        let flags: Vec<bool> = queue.items().iter().map(|i| i.reserved).collect();
        assert_eq!(flags, vec![true, false, false]);
        assert!(!queue.reserve_uid("missing").unwrap());
    }

    #[test]
    fn test_peek_skips_reserved() {
        let mut queue = setup_test_queue();
        queue.add("a", "t", 1).unwrap();
        queue.add("b", "t", 2).unwrap();
        queue.reserve_uid("a").unwrap();

        assert_eq!(queue.peek().unwrap().uid, "b");

        queue.reserve_uid("b").unwrap();
        assert_eq!(queue.peek(), None);
    }

    #[test]
    fn test_peek_returns_copy() {
        let mut queue = setup_test_queue();
        queue.add("a", "t", 1).unwrap();

        let mut peeked = queue.peek().unwrap();
        peeked.number = 99;
        peeked.reserved = true;

        assert_eq!(queue.items()[0].number, 1);
        assert!(!queue.items()[0].reserved);
    }

    #[test]
    fn test_peek_empty() {
        let queue = setup_test_queue();
        assert_eq!(queue.peek(), None);
    }

    #[test]
    fn test_load_replaces_memory() {
        let mut queue = setup_test_queue();
        queue.add("a", "t", 1).unwrap();
        queue.items.push(QueueItem::new("unsaved", "t", 0));

        queue.load().unwrap();

        assert_eq!(queue.len(), 1);
        assert!(!queue.exists("unsaved"));
    }

    #[test]
    fn test_display_dump() {
        let mut queue = setup_test_queue();
        queue.add("a", "t", 1).unwrap();
        queue.add("b", "t", -2).unwrap();
        queue.reserve_uid("b").unwrap();

        let dump = queue.to_string();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(
            lines,
            vec![
                "---- PersistentQueue ----",
                "UID: a, Num: 1, Reserved: No",
                "UID: b, Num: -2, Reserved: Yes",
                "-------------------------",
            ]
        );
    }

    #[test]
    fn test_invalid_namespace_fails_on_access() {
        let mut queue = PersistentQueue::new(MemoryKv::new(), "");
        assert!(queue.load().is_err());
        assert!(queue.add("a", "t", 1).is_err());
        // A failed save leaves memory as it was
        assert!(queue.is_empty());
    }

    #[test]
    fn test_apply_restores_on_error() {
        let mut queue = setup_test_queue();
        queue.add("a", "t", 1).unwrap();

        let result: Result<()> = queue.apply(|items| {
            items.clear();
            eyre::bail!("abort")
        });

        assert!(result.is_err());
        assert!(queue.exists("a"));
    }
}
