use std::collections::HashMap;
use std::sync::Mutex;

/// Error from the underlying key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("Cache: backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, KvError>;

/// Minimal key-value interface the filter cache needs.
///
/// Implementations must be safe to share across worker threads. All
/// callers treat errors as a cache miss — a dead cache degrades the
/// engine to "no recorded current state", it never fails ingestion.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Sets a value with no expiry.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;

    /// Deletes every key matching a glob pattern (e.g.
    /// `current-state:s--0000-0001--*--0003`). Returns the number of keys
    /// removed.
    fn delete_pattern(&self, pattern: &str) -> Result<usize>;
}

/// In-memory [`KeyValueStore`] over a mutex-guarded map. The default for
/// tests and single-process deployments.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !glob_match::glob_match(pattern, key));
        Ok(before - entries.len())
    }
}
