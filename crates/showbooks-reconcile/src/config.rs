//! Engine configuration.

use serde::{Deserialize, Serialize};
use showbooks_connector::{BatchPolicy, RetryPolicy};
use std::time::Duration;

/// Tuning knobs for the reconciliation engine, mostly for the external-call
/// layer. All fields have defaults, so a deserialized `{}` is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Records per external bulk call.
    pub batch_size: usize,

    /// Maximum chunk calls in flight at once.
    pub max_in_flight: usize,

    /// Per-attempt timeout for one chunk call, in seconds.
    pub call_timeout_secs: u64,

    /// Retries per chunk on transient errors.
    pub max_retries: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_in_flight: 4,
            call_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl ReconcileConfig {
    /// The batching policy for the external-call layer.
    #[must_use]
    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            batch_size: self.batch_size,
            max_in_flight: self.max_in_flight,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_deserializes_to_defaults() {
        let config: ReconcileConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(config.call_timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn batch_policy_carries_the_knobs() {
        let config = ReconcileConfig {
            batch_size: 50,
            max_in_flight: 2,
            call_timeout_secs: 5,
            max_retries: 1,
        };
        let policy = config.batch_policy();
        assert_eq!(policy.batch_size, 50);
        assert_eq!(policy.max_in_flight, 2);
        assert_eq!(policy.call_timeout, Duration::from_secs(5));
        assert_eq!(policy.retry.max_retries, 1);
    }
}
