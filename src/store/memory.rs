//! In-process counter store.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CounterStore, StoreError};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Counter store held entirely in process memory.
///
/// Matches the Redis contract closely enough to stand in for it during
/// tests and single-node development: increments create absent keys at 1
/// without arming an expiry, `set_with_expiry` re-arms the deadline on
/// every call, and expired entries vanish lazily on next access.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let mut entries = self.entries.lock();

        if entries.get(key).is_some_and(Entry::is_expired) {
            entries.remove(key);
        }

        match entries.get_mut(key) {
            Some(entry) => {
                let count = entry
                    .value
                    .parse::<i64>()
                    .map_err(|e| {
                        StoreError::Command(format!("counter {key} holds a non-integer: {e}"))
                    })?
                    + 1;
                entry.value = count.to_string();
                Ok(count)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: None,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock();

        if entries.get(key).is_some_and(Entry::is_expired) {
            entries.remove(key);
            return Ok(None);
        }

        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
