//! Core rate limiting decision engine.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::store::{CounterStore, StoreError};

use super::request::{manual_block_key, RateLimitRequest};
use super::snapshot::{ConfigSnapshot, StoreErrorPolicy};

/// Length of the rolling window a counter accumulates over.
const WINDOW: Duration = Duration::from_secs(60);

/// Denials and failures produced by the decision engine.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// An active block marker exists for the key.
    #[error("key is blocked")]
    KeyBlocked {
        /// Time left until the block expires.
        retry_after: Duration,
    },

    /// This check pushed the window count past the configured maximum.
    #[error("rate limit exceeded")]
    LimitExceeded {
        /// Duration of the block that was just placed.
        retry_after: Duration,
    },

    /// The counter store could not be reached, so no verdict exists.
    #[error("counter store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl RateLimitError {
    /// Time to wait before retrying, when the denial carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::KeyBlocked { retry_after } | Self::LimitExceeded { retry_after } => {
                Some(*retry_after)
            }
            Self::StoreUnavailable(_) => None,
        }
    }

    /// Whether this is a denial verdict rather than an infrastructure failure.
    fn is_denial(&self) -> bool {
        matches!(self, Self::KeyBlocked { .. } | Self::LimitExceeded { .. })
    }
}

/// The rate limiting decision engine.
///
/// Owns the current [`ConfigSnapshot`] and decides admission for
/// classified request keys. All counting state lives in the shared
/// [`CounterStore`], never in process memory, so any number of replicas
/// pointed at the same store reach consistent decisions.
///
/// The snapshot sits behind a reader-writer lock and is replaced
/// wholesale; a check that started before a swap finishes against the
/// snapshot it captured.
pub struct RateLimiter {
    /// The shared counter store.
    store: Arc<dyn CounterStore>,
    /// Current configuration snapshot, swapped on reload.
    config: RwLock<Arc<ConfigSnapshot>>,
}

impl RateLimiter {
    /// Create a new engine over a counter store.
    pub fn new(store: Arc<dyn CounterStore>, config: ConfigSnapshot) -> Self {
        Self {
            store,
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// The snapshot in effect right now.
    pub fn config(&self) -> Arc<ConfigSnapshot> {
        self.config.read().clone()
    }

    /// Atomically replace the configuration snapshot.
    ///
    /// Safe to call concurrently with in-flight checks. Counters and
    /// block markers created under the old configuration are untouched: a
    /// key blocked under a stricter limit stays blocked until its marker
    /// expires on its own.
    pub fn update_config(&self, snapshot: ConfigSnapshot) {
        debug!(
            enabled = snapshot.enabled,
            limits = snapshot.limits.len(),
            "Applying new rate limit configuration"
        );
        *self.config.write() = Arc::new(snapshot);
    }

    /// Check whether a request is admitted, with a typed denial reason.
    ///
    /// Returns `Ok(())` to admit. [`RateLimitError::KeyBlocked`] and
    /// [`RateLimitError::LimitExceeded`] are denials;
    /// [`RateLimitError::StoreUnavailable`] means no verdict could be
    /// reached. The check is a short sequence of independent store calls,
    /// not a transaction: under heavy concurrency on one key the count
    /// may overshoot the maximum by the number of in-flight checks before
    /// the block marker lands.
    pub async fn check(&self, request: &RateLimitRequest) -> Result<(), RateLimitError> {
        let snapshot = self.config();

        if !snapshot.enabled {
            return Ok(());
        }

        // A classification without a configured limit is unlimited.
        let Some(limit) = snapshot.limit_for(request.classification) else {
            return Ok(());
        };

        let window_key = request.window_key();
        let block_key = request.block_key();

        trace!(
            key = %request.key,
            classification = %request.classification,
            "Checking rate limit"
        );

        if let Some(raw) = self.store.get(&block_key).await? {
            let blocked_until = raw.parse::<i64>().unwrap_or(0);
            let now = unix_now();

            if now < blocked_until {
                let retry_after = Duration::from_secs((blocked_until - now) as u64);
                debug!(
                    key = %request.key,
                    classification = %request.classification,
                    remaining_secs = retry_after.as_secs(),
                    "Key is blocked"
                );
                return Err(RateLimitError::KeyBlocked { retry_after });
            }

            // The block has lapsed: clear the marker and the stale window
            // so the key restarts counting from zero.
            self.store.delete(&block_key).await?;
            self.store.delete(&window_key).await?;
        }

        let count = self.store.increment(&window_key).await?;

        // Re-arm the window expiry on every observed request; the
        // increment alone never sets one.
        self.store
            .set_with_expiry(&window_key, &count.to_string(), WINDOW)
            .await?;

        if count > i64::from(limit.max_requests) {
            let block_duration = limit.block_duration();
            let blocked_until = unix_now() + block_duration.as_secs() as i64;

            self.store
                .set_with_expiry(&block_key, &blocked_until.to_string(), block_duration)
                .await?;

            debug!(
                key = %request.key,
                classification = %request.classification,
                count,
                max_requests = limit.max_requests,
                "Rate limit exceeded, key blocked"
            );
            return Err(RateLimitError::LimitExceeded {
                retry_after: block_duration,
            });
        }

        trace!(key = %request.key, count, "Request allowed");
        Ok(())
    }

    /// Check admission and fold denials into a boolean verdict.
    ///
    /// Store failures follow the snapshot's `on_store_error` policy:
    /// `allow` admits the request with a warning, `deny` surfaces the
    /// error so the caller rejects the request.
    pub async fn is_allowed(&self, request: &RateLimitRequest) -> Result<bool, RateLimitError> {
        match self.check(request).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_denial() => Ok(false),
            Err(err) => match self.config().on_store_error {
                StoreErrorPolicy::Allow => {
                    warn!(
                        key = %request.key,
                        error = %err,
                        "Counter store unavailable, admitting request (fail-open policy)"
                    );
                    Ok(true)
                }
                StoreErrorPolicy::Deny => Err(err),
            },
        }
    }

    /// Manually block a key for `duration_mins` minutes.
    ///
    /// The marker lives under its own namespace, independent of any
    /// window counting; no counter is created or cleared.
    pub async fn block_key(&self, key: &str, duration_mins: u64) -> Result<(), RateLimitError> {
        let duration = Duration::from_secs(duration_mins * 60);
        let blocked_until = unix_now() + duration.as_secs() as i64;

        self.store
            .set_with_expiry(&manual_block_key(key), &blocked_until.to_string(), duration)
            .await?;

        debug!(key = %key, duration_mins, "Manually blocked key");
        Ok(())
    }
}

/// Seconds since the unix epoch.
fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
