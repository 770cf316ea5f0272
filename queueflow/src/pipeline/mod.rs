//! Pipeline building and execution.
//!
//! This module provides:
//! - The ordered handler registry
//! - The execution engine with its normal/error state machine
//! - Timeouts raced against the handler chain

mod engine;
mod registry;

pub use registry::HandlerRegistry;

use crate::cancellation::Deadline;
use crate::errors::{HandlerPanic, PipelineError};
use crate::middleware::Handler;
use engine::Execution;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, warn};

/// An ordered chain of handlers run against a shared context.
///
/// ```rust,ignore
/// let mut pipeline = Pipeline::new();
/// pipeline.push(Handler::from_fn(|ctx, next| async move {
///     next.proceed();
///     Ok(())
/// }));
/// pipeline.execute(ctx, Some(5_000)).await?;
/// ```
pub struct Pipeline<C> {
    registry: HandlerRegistry<C>,
}

impl<C> Pipeline<C>
where
    C: Send + Sync + 'static,
{
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
        }
    }

    /// Creates a pipeline from initial handlers.
    pub fn with_handlers(handlers: impl IntoIterator<Item = Handler<C>>) -> Self {
        Self {
            registry: handlers.into_iter().collect(),
        }
    }

    /// Appends handlers, preserving order.
    pub fn register(&mut self, handlers: impl IntoIterator<Item = Handler<C>>) {
        self.registry.register(handlers);
    }

    /// Appends one handler.
    pub fn push(&mut self, handler: Handler<C>) {
        self.registry.push(handler);
    }

    /// Appends one handler, builder style.
    #[must_use]
    pub fn with(mut self, handler: Handler<C>) -> Self {
        self.registry.push(handler);
        self
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry<C> {
        &self.registry
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns true if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Runs the chain once against `ctx`.
    ///
    /// With a timeout the chain is driven on a spawned task and raced
    /// against a timer. When the timer wins, the handler in flight is left to
    /// finish on its own, no further handler starts, and the call fails with
    /// [`PipelineError::Timeout`].
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidTimeout`] if `timeout_ms` is `Some(0)`; no
    ///   handler runs.
    /// - [`PipelineError::Timeout`] if the budget elapses first.
    /// - [`PipelineError::Handler`] with the unrecovered handler error.
    /// - [`PipelineError::Halted`] if a handler dropped its continuation.
    /// - [`PipelineError::Aborted`] if the runtime cancelled the timed task.
    pub async fn execute(
        &self,
        ctx: impl Into<Arc<C>>,
        timeout_ms: Option<u64>,
    ) -> Result<(), PipelineError> {
        let Some(timeout_ms) = validate_timeout(timeout_ms)? else {
            return Execution::new(&self.registry, ctx.into(), None).run().await;
        };

        let deadline = Arc::new(Deadline::new(timeout_ms));
        let execution =
            Execution::new(&self.registry, ctx.into(), Some(Arc::clone(&deadline)));
        let mut task = tokio::spawn(execution.run());
        match tokio::time::timeout(deadline.duration(), &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(join_failure(join_err)),
            Err(_elapsed) => {
                let err = deadline.expire();
                warn!(timeout_ms, "Pipeline execution timed out");
                Err(err.into())
            }
        }
    }
}

/// Maps a failed join of the execution task.
fn join_failure(join_err: JoinError) -> PipelineError {
    if join_err.is_panic() {
        let panic = HandlerPanic::from_payload(join_err.into_panic().as_ref());
        warn!(error = %panic, "Pipeline task panicked");
        return PipelineError::Handler(Box::new(panic));
    }
    warn!(error = %join_err, "Pipeline task was cancelled");
    PipelineError::Aborted {
        reason: join_err.to_string(),
    }
}

/// Rejects a zero timeout.
fn validate_timeout(timeout_ms: Option<u64>) -> Result<Option<u64>, PipelineError> {
    match timeout_ms {
        Some(0) => {
            debug!("Rejecting zero pipeline timeout");
            Err(PipelineError::InvalidTimeout { timeout_ms: 0 })
        }
        other => Ok(other),
    }
}

impl<C> Default for Pipeline<C>
where
    C: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for Pipeline<C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<C> std::fmt::Debug for Pipeline<C>
where
    C: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("handlers", &self.registry)
            .finish()
    }
}

impl<C> FromIterator<Handler<C>> for Pipeline<C>
where
    C: Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = Handler<C>>>(iter: I) -> Self {
        Self::with_handlers(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallLog, RecordingHandler};

    #[test]
    fn test_validate_timeout() {
        assert!(matches!(validate_timeout(None), Ok(None)));
        assert!(matches!(validate_timeout(Some(1)), Ok(Some(1))));
        assert!(matches!(
            validate_timeout(Some(0)),
            Err(PipelineError::InvalidTimeout { timeout_ms: 0 })
        ));
    }

    #[test]
    fn test_builder_methods() {
        let log = CallLog::new();
        let mut pipeline = Pipeline::<()>::new().with(RecordingHandler::handler("a", &log));
        pipeline.push(RecordingHandler::handler("b", &log));
        pipeline.register([RecordingHandler::handler("c", &log)]);

        assert_eq!(pipeline.len(), 3);
        assert!(!pipeline.is_empty());
        assert!(Pipeline::<()>::default().is_empty());
    }

    #[tokio::test]
    async fn test_join_failure_keeps_panic_message() {
        let join_err = tokio::spawn(async { panic!("engine blew up") })
            .await
            .expect_err("task panicked");

        let err = join_failure(join_err);
        let panic = err.downcast_ref::<HandlerPanic>().expect("panic error");
        assert_eq!(panic.message, "engine blew up");
    }

    #[tokio::test]
    async fn test_join_failure_reports_cancelled_task_as_aborted() {
        let task = tokio::spawn(std::future::pending::<()>());
        task.abort();
        let join_err = task.await.expect_err("task was aborted");

        let err = join_failure(join_err);
        assert!(
            matches!(err, PipelineError::Aborted { ref reason } if reason.contains("cancelled"))
        );
        assert!(err.handler_error().is_none());
    }
}
