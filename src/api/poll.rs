//! State polling for eventually-consistent observations.
//!
//! The control plane can report a resource as present for a while after
//! its deletion succeeded. [`StatePoller`] repeatedly invokes a refresh
//! function and only declares success once a target state has been
//! observed a configured number of consecutive times, with a fixed
//! minimum interval between observations.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Pending/target state poller.
///
/// States are plain strings so callers can reuse whatever vocabulary the
/// observed system has - the delete-confirmation poll uses HTTP status
/// codes (`"200"` pending, `"404"` target).
#[derive(Debug, Clone)]
pub struct StatePoller {
    pending: Vec<String>,
    target: Vec<String>,
    min_interval: Duration,
    timeout: Duration,
    continuous_target_occurrence: u32,
}

impl StatePoller {
    pub fn new(
        pending: impl IntoIterator<Item = impl Into<String>>,
        target: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            min_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(45 * 60),
            continuous_target_occurrence: 3,
        }
    }

    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How many consecutive target observations are required before the
    /// poll succeeds. Resets on any pending observation.
    pub fn continuous_target_occurrence(mut self, count: u32) -> Self {
        self.continuous_target_occurrence = count.max(1);
        self
    }

    /// Polls `refresh` until the target state is held for the configured
    /// number of consecutive observations.
    ///
    /// `refresh` returns the current value plus its state label. States
    /// that are neither pending nor target fail immediately; so does the
    /// overall timeout.
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(T, String)>>,
    {
        let started = tokio::time::Instant::now();
        let mut target_streak = 0u32;

        loop {
            let (value, state) = refresh().await?;

            if self.target.iter().any(|t| *t == state) {
                target_streak += 1;
                debug!(
                    state,
                    streak = target_streak,
                    required = self.continuous_target_occurrence,
                    "target state observed"
                );
                if target_streak >= self.continuous_target_occurrence {
                    return Ok(value);
                }
            } else if self.pending.iter().any(|p| *p == state) {
                target_streak = 0;
            } else {
                return Err(Error::Internal(format!(
                    "unexpected state '{state}' while waiting for one of: {}",
                    self.target.join(", ")
                )));
            }

            if started.elapsed() >= self.timeout {
                return Err(Error::Internal(format!(
                    "timed out waiting for state to become one of: {}",
                    self.target.join(", ")
                )));
            }

            tokio::time::sleep(self.min_interval).await;
        }
    }
}
