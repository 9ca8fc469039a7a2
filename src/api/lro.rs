//! Long-running-operation plumbing.
//!
//! Every mutating control-plane call returns a pollable handle rather
//! than a result. The orchestration layer is inherently serial per
//! resource, so the handle is consumed with a synchronous
//! "block-with-timeout until terminal" wait - no bespoke event loop.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::api::ApiResult;
use crate::error::{Error, Result};

/// Terminal and non-terminal states of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// Still running; poll again.
    InProgress,
    /// Reached a successful terminal state.
    Succeeded,
    /// Reached a failed terminal state.
    Failed(String),
    /// Cancelled server-side; terminal.
    Canceled,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::InProgress)
    }
}

/// A pollable handle to an operation in flight on the control plane.
#[async_trait]
pub trait LongRunningOperation: Send + Sync {
    /// Fetches the current status. Transport errors while polling are
    /// surfaced as-is and treated as fatal by the waiter.
    async fn status(&self) -> ApiResult<OperationStatus>;
}

/// An operation that completed synchronously. Transports return this
/// when the control plane answered the mutation inline.
pub struct CompletedOperation;

#[async_trait]
impl LongRunningOperation for CompletedOperation {
    async fn status(&self) -> ApiResult<OperationStatus> {
        Ok(OperationStatus::Succeeded)
    }
}

/// How long to wait, and how often to poll, for a terminal state.
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(45 * 60),
            poll_interval: Duration::from_secs(10),
        }
    }
}

impl WaitOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Blocks until `operation` reaches a terminal state.
///
/// `operation_name` and `resource` only feed error messages and logs.
/// Failure, cancellation, and timeout all surface as errors, which
/// aborts whatever orchestration sequence the caller is in the middle
/// of - no rollback is attempted.
pub async fn wait_for_completion(
    operation: Box<dyn LongRunningOperation>,
    operation_name: &str,
    resource: &str,
    options: WaitOptions,
) -> Result<()> {
    let started = tokio::time::Instant::now();

    loop {
        match operation.status().await? {
            OperationStatus::Succeeded => {
                debug!(operation = operation_name, resource, "operation completed");
                return Ok(());
            }
            OperationStatus::Failed(message) => {
                return Err(Error::operation_failed(operation_name, resource, message));
            }
            OperationStatus::Canceled => {
                return Err(Error::operation_failed(
                    operation_name,
                    resource,
                    "operation was canceled",
                ));
            }
            OperationStatus::InProgress => {}
        }

        if started.elapsed() >= options.timeout {
            return Err(Error::OperationTimeout {
                operation: operation_name.to_string(),
                resource: resource.to_string(),
                timeout_secs: options.timeout.as_secs(),
            });
        }

        tokio::time::sleep(options.poll_interval).await;
    }
}
