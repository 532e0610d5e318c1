//! Retry utilities: backoff builders for collaborator calls.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;
use serde::Deserialize;

/// Configurable exponential backoff bounds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub min_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
    /// Retries after the initial attempt. Zero disables retrying.
    pub max_times: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay_ms: 50,
            max_delay_ms: 2_000,
            max_times: 3,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_times: 0,
            ..Self::default()
        }
    }

    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.min_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_times(self.max_times)
            .with_jitter()
    }
}

/// Standard backoff for work queue sends.
///
/// - Min delay: 50ms
/// - Max delay: 2s
/// - Max attempts: 3
/// - Jitter enabled
pub fn dispatch_backoff() -> ExponentialBuilder {
    RetryPolicy::default().backoff()
}

/// Backoff for planner calls.
///
/// - Min delay: 200ms
/// - Max delay: 10s
/// - Max attempts: 4
/// - Jitter enabled
pub fn planner_backoff() -> ExponentialBuilder {
    RetryPolicy {
        min_delay_ms: 200,
        max_delay_ms: 10_000,
        max_times: 4,
    }
    .backoff()
}
