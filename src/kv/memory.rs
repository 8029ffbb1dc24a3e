//! Volatile key-value store, used for tests and host-side simulation.

use super::{KvError, KvHandle, KvStore, validate_namespace};
use eyre::Result;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum Value {
    U32(u32),
    Str(String),
}

/// In-memory store keyed by namespace, then key.
#[derive(Debug, Default, Clone)]
pub struct MemoryKv {
    namespaces: HashMap<String, HashMap<String, Value>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored in a namespace.
    pub fn key_count(&self, namespace: &str) -> usize {
        self.namespaces.get(namespace).map_or(0, HashMap::len)
    }
}

impl KvStore for MemoryKv {
    type Handle<'a> = MemoryHandle<'a>;

    fn open(&mut self, namespace: &str, read_only: bool) -> Result<Self::Handle<'_>> {
        validate_namespace(namespace).map_err(|e| eyre::eyre!(e))?;

        Ok(MemoryHandle {
            namespace: namespace.to_string(),
            entries: self.namespaces.entry(namespace.to_string()).or_default(),
            read_only,
        })
    }
}

/// Open namespace of a `MemoryKv`. Writes apply immediately.
pub struct MemoryHandle<'a> {
    namespace: String,
    entries: &'a mut HashMap<String, Value>,
    read_only: bool,
}

impl MemoryHandle<'_> {
    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(eyre::eyre!(KvError::ReadOnly(self.namespace.clone())));
        }
        Ok(())
    }
}

impl KvHandle for MemoryHandle<'_> {
    fn get_u32(&self, key: &str, default: u32) -> Result<u32> {
        match self.entries.get(key) {
            Some(Value::U32(v)) => Ok(*v),
            _ => Ok(default),
        }
    }

    fn put_u32(&mut self, key: &str, value: u32) -> Result<()> {
        self.check_writable()?;
        self.entries.insert(key.to_string(), Value::U32(value));
        Ok(())
    }

    fn get_string(&self, key: &str, default: &str) -> Result<String> {
        match self.entries.get(key) {
            Some(Value::Str(s)) => Ok(s.clone()),
            _ => Ok(default.to_string()),
        }
    }

    fn put_string(&mut self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        self.entries.insert(key.to_string(), Value::Str(value.to_string()));
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.check_writable()?;
        self.entries.clear();
        Ok(())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}
