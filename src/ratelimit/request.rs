//! Request classification and store key derivation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix shared by every key the engine writes to the counter store.
const KEY_PREFIX: &str = "ratelimit";

/// Namespace for manually placed blocks, outside any counted dimension.
const MANUAL_NAMESPACE: &str = "manual";

/// The dimension along which a request is limited.
///
/// Limits are resolved by map lookup against the active snapshot, so the
/// decision engine never branches on individual variants; a new dimension
/// is a new variant here and a new entry in the configuration, nothing
/// more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Limit by client IP address.
    Ip,
    /// Limit by API token.
    Token,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Ip => write!(f, "ip"),
            Classification::Token => write!(f, "token"),
        }
    }
}

/// A classified request key to be checked for admission.
///
/// Counting state is keyed by `(classification, key)`, never by the key
/// alone: the same literal string under two classifications is tracked
/// independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRequest {
    /// Caller-identifying value: an IP literal or a token string.
    ///
    /// Must be non-empty; the transport layer guarantees this before a
    /// request reaches the engine.
    pub key: String,
    /// The dimension this key is limited along.
    pub classification: Classification,
}

impl RateLimitRequest {
    /// Create a new classified request.
    pub fn new(key: impl Into<String>, classification: Classification) -> Self {
        Self {
            key: key.into(),
            classification,
        }
    }

    /// Store key of the rolling window counter for this request.
    pub(crate) fn window_key(&self) -> String {
        format!("{KEY_PREFIX}:{}:{}:window", self.classification, self.key)
    }

    /// Store key of the block marker for this request.
    pub(crate) fn block_key(&self) -> String {
        format!("{KEY_PREFIX}:{}:{}:blocked", self.classification, self.key)
    }
}

/// Store key of a manually placed block marker.
pub(crate) fn manual_block_key(key: &str) -> String {
    format!("{KEY_PREFIX}:{MANUAL_NAMESPACE}:{key}:blocked")
}
