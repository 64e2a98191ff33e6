//! Redis-backed counter store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use super::{CounterStore, StoreError};

/// Counter store backed by a Redis server.
///
/// Every replica of the service points at the same server, which makes
/// its keyspace the single source of truth for window counters and block
/// markers. The connection manager reconnects on its own; command
/// failures surface as [`StoreError`] and are never retried here.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis and verify the server responds.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        info!(url = %url, "Connecting to Redis counter store");

        let client =
            redis::Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        // SET with EX rejects a zero-second expiry.
        conn.set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del(key)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }
}
