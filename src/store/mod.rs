//! Counter storage backends.
//!
//! Window counters and block markers live in an external store shared by
//! every replica of the service; the engine never caches their values
//! across calls. The store is modeled as a small atomic key-value contract
//! so the decision logic stays independent of any concrete client library.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur talking to the counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store connection failed: {0}")]
    Connection(String),
    /// A command was sent but did not complete.
    #[error("store command failed: {0}")]
    Command(String),
}

/// Atomic key-value contract backing window counters and block markers.
///
/// Implementations must provide per-key atomicity for `increment`; the
/// engine issues no multi-key transactions and tolerates interleaving
/// between its calls.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment a counter and return the new value, creating
    /// the key at 1 if absent.
    ///
    /// An existing expiry on the key is left untouched, and creation does
    /// not arm one.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    /// Unconditionally set a value and (re)arm its expiry.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), StoreError>;

    /// Fetch a value. An absent key is `None`, not an error.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
