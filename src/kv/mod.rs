//! Namespaced key-value storage the queue mirrors itself into.
//!
//! The model follows the flash-backed preference stores found on small devices:
//! a store is opened for one namespace, read-only or read-write, used, and closed
//! again before the caller returns. Values are either unsigned integers or strings.

mod memory;
mod sqlite;

pub use memory::MemoryKv;
pub use sqlite::SqliteKv;

use eyre::Result;

/// Longest namespace name the device store accepts.
pub const MAX_NAMESPACE_LEN: usize = 15;

/// Errors raised by key-value backends.
#[derive(Debug, Clone, PartialEq)]
pub enum KvError {
    /// A write was attempted through a handle opened read-only.
    ReadOnly(String),
    /// Namespace name is empty or too long.
    InvalidNamespace(String),
}

impl std::fmt::Display for KvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KvError::ReadOnly(ns) => write!(f, "namespace '{}' is open read-only", ns),
            KvError::InvalidNamespace(ns) => write!(
                f,
                "invalid namespace '{}': must be 1-{} characters",
                ns, MAX_NAMESPACE_LEN
            ),
        }
    }
}

impl std::error::Error for KvError {}

/// A store that can be opened one namespace at a time.
pub trait KvStore {
    /// Open handle; borrows the store so only one can be live.
    type Handle<'a>: KvHandle
    where
        Self: 'a;

    /// Open `namespace`. A namespace that was never written reads as empty.
    fn open(&mut self, namespace: &str, read_only: bool) -> Result<Self::Handle<'_>>;
}

/// Operations on an open namespace.
///
/// Reads of a missing key, or of a key holding the other value type, return the
/// supplied default.
pub trait KvHandle {
    fn get_u32(&self, key: &str, default: u32) -> Result<u32>;

    fn put_u32(&mut self, key: &str, value: u32) -> Result<()>;

    fn get_string(&self, key: &str, default: &str) -> Result<String>;

    fn put_string(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove every key in the namespace.
    fn clear(&mut self) -> Result<()>;

    /// Finish using the namespace. Writes are durable once this returns.
    fn close(self) -> Result<()>;
}

/// Reject namespace names the device store would not accept.
pub(crate) fn validate_namespace(namespace: &str) -> Result<(), KvError> {
    if namespace.is_empty() || namespace.chars().count() > MAX_NAMESPACE_LEN {
        return Err(KvError::InvalidNamespace(namespace.to_string()));
    }
    Ok(())
}
