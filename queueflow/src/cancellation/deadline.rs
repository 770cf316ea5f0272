//! Execution deadlines.

use super::CancellationToken;
use crate::errors::PipelineTimeoutError;
use std::time::Duration;

/// A timeout budget shared between a timer and the execution it bounds.
///
/// Expiry is one-way; once expired, waiters observe the timeout error.
#[derive(Debug)]
pub(crate) struct Deadline {
    token: CancellationToken,
    error: PipelineTimeoutError,
}

impl Deadline {
    pub(crate) fn new(timeout_ms: u64) -> Self {
        Self {
            token: CancellationToken::new(),
            error: PipelineTimeoutError::new(timeout_ms),
        }
    }

    pub(crate) fn duration(&self) -> Duration {
        self.error.duration()
    }

    /// Marks the deadline as passed and returns its error.
    pub(crate) fn expire(&self) -> PipelineTimeoutError {
        self.token
            .cancel(format!("timeout after {}ms", self.error.timeout_ms()));
        self.error
    }

    /// Returns the timeout error if the deadline has passed.
    pub(crate) fn expired(&self) -> Option<PipelineTimeoutError> {
        self.token.is_cancelled().then_some(self.error)
    }

    /// Completes with the timeout error once the deadline has passed.
    pub(crate) async fn elapsed(&self) -> PipelineTimeoutError {
        self.token.cancelled().await;
        self.error
    }
}
