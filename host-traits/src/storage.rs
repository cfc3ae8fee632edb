//! Key-Value Storage Abstraction
//!
//! Synchronous key-value persistence for small session state. The access
//! credential survives process restarts through this seam; hosts back it with
//! whatever local storage they have (a JSON file on desktop, localStorage on
//! web). The long-lived renewal credential is never stored here — it lives in
//! the runtime's cookie jar, invisible to application code.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;

/// Synchronous key-value store trait
///
/// Operations are synchronous by contract: implementations are expected to be
/// cheap (an in-memory map, a small local file) and are called between
/// suspension points of async flows.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store for tests and hosts without persistence
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}
