//! Rate limit configuration snapshots.
//!
//! A snapshot is an immutable, fully formed view of the limiting rules.
//! Updates replace the whole value; nothing is patched in place, so a
//! check that captured a snapshot keeps a consistent view to completion.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::request::Classification;

/// The ceiling for one window and the penalty once it is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Maximum requests admitted within one window.
    pub max_requests: u32,
    /// How long a key stays blocked after exceeding the limit, in minutes.
    pub block_duration_mins: u64,
}

impl LimitConfig {
    /// The block penalty as a duration.
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration_mins * 60)
    }
}

/// What to do when the counter store cannot produce a verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreErrorPolicy {
    /// Deny the request (fail closed).
    #[default]
    Deny,
    /// Admit the request (fail open).
    Allow,
}

/// An immutable snapshot of the rate limiting rules.
///
/// A classification absent from `limits` is unlimited, not an error.
/// Replacing the snapshot has no effect on counters or block markers
/// already resident in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Whether limiting is active at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Policy applied when the counter store is unreachable.
    #[serde(default)]
    pub on_store_error: StoreErrorPolicy,

    /// Per-classification limits.
    #[serde(default)]
    pub limits: HashMap<Classification, LimitConfig>,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            on_store_error: StoreErrorPolicy::default(),
            limits: HashMap::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

impl ConfigSnapshot {
    /// Resolve the limit for a classification, if one is configured.
    pub fn limit_for(&self, classification: Classification) -> Option<LimitConfig> {
        self.limits.get(&classification).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_snapshot() {
        let yaml = r#"
enabled: true
on_store_error: deny
limits:
  ip:
    max_requests: 10
    block_duration_mins: 5
  token:
    max_requests: 100
    block_duration_mins: 10
"#;
        let snapshot: ConfigSnapshot = serde_yaml::from_str(yaml).unwrap();

        assert!(snapshot.enabled);
        assert_eq!(snapshot.on_store_error, StoreErrorPolicy::Deny);

        let ip = snapshot.limit_for(Classification::Ip).unwrap();
        assert_eq!(ip.max_requests, 10);
        assert_eq!(ip.block_duration_mins, 5);

        let token = snapshot.limit_for(Classification::Token).unwrap();
        assert_eq!(token.max_requests, 100);
        assert_eq!(token.block_duration_mins, 10);
    }

    #[test]
    fn test_parse_defaults() {
        let snapshot: ConfigSnapshot = serde_yaml::from_str("{}").unwrap();

        assert!(snapshot.enabled);
        assert_eq!(snapshot.on_store_error, StoreErrorPolicy::Deny);
        assert!(snapshot.limits.is_empty());
    }

    #[test]
    fn test_parse_fail_open_policy() {
        let yaml = r#"
on_store_error: allow
"#;
        let snapshot: ConfigSnapshot = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(snapshot.on_store_error, StoreErrorPolicy::Allow);
    }

    #[test]
    fn test_missing_classification_is_unlimited() {
        let yaml = r#"
limits:
  ip:
    max_requests: 10
    block_duration_mins: 5
"#;
        let snapshot: ConfigSnapshot = serde_yaml::from_str(yaml).unwrap();

        assert!(snapshot.limit_for(Classification::Ip).is_some());
        assert!(snapshot.limit_for(Classification::Token).is_none());
    }

    #[test]
    fn test_block_duration_conversion() {
        let limit = LimitConfig {
            max_requests: 5,
            block_duration_mins: 2,
        };

        assert_eq!(limit.block_duration(), Duration::from_secs(120));
    }
}
