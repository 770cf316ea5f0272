//! The `when` composer.

use super::Predicate;
use crate::errors::HandlerResult;
use crate::middleware::{Handler, Middleware, Next};
use crate::pipeline::Pipeline;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, trace};

/// Runs `handlers` as a nested pipeline when `predicate` accepts the context.
///
/// The returned handler is an ordinary normal-path handler. A failure of the
/// nested pipeline is raised as this handler's own error, so it enters the
/// outer pipeline's error handlers at this point of the chain. A nested
/// handler error is raised unchanged.
pub fn when<C, P>(predicate: P, handlers: impl IntoIterator<Item = Handler<C>>) -> Handler<C>
where
    C: Send + Sync + 'static,
    P: Predicate<C> + 'static,
{
    Handler::normal(When::new(predicate, handlers))
}

/// A predicate-gated sub-pipeline.
pub struct When<C> {
    name: String,
    predicate: Arc<dyn Predicate<C>>,
    handlers: Vec<Handler<C>>,
}

impl<C> When<C>
where
    C: Send + Sync + 'static,
{
    /// Creates a new sub-pipeline handler.
    pub fn new<P>(predicate: P, handlers: impl IntoIterator<Item = Handler<C>>) -> Self
    where
        P: Predicate<C> + 'static,
    {
        Self {
            name: "when".to_string(),
            predicate: Arc::new(predicate),
            handlers: handlers.into_iter().collect(),
        }
    }

    /// Sets the name used in logs.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the number of nested handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if there are no nested handlers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl<C> Middleware<C> for When<C>
where
    C: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: Arc<C>, next: Next) -> HandlerResult {
        if self.predicate.matches(&ctx) {
            trace!(name = %self.name, handlers = self.handlers.len(), "Running sub-pipeline");
            let nested = Pipeline::with_handlers(self.handlers.iter().cloned());
            if let Err(err) = nested.execute(Arc::clone(&ctx), None).await {
                debug!(name = %self.name, error = %err, "Sub-pipeline failed");
                return Err(err.into_handler_error());
            }
        } else {
            trace!(name = %self.name, "Sub-pipeline predicate rejected context");
        }
        next.proceed();
        Ok(())
    }
}

impl<C> std::fmt::Debug for When<C>
where
    C: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("When")
            .field("name", &self.name)
            .field("handlers", &self.handlers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallLog, FailingHandler, RecordingHandler, RecoveringErrorHandler};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_rejected_predicate_skips_nested_handlers() {
        let log = CallLog::new();
        let pipeline = Pipeline::<u32>::with_handlers([
            when(
                |n: &u32| *n > 10,
                [RecordingHandler::handler("nested", &log)],
            ),
            RecordingHandler::handler("outer", &log),
        ]);

        pipeline.execute(5_u32, None).await.expect("pipeline should succeed");
        assert_eq!(log.calls(), vec!["outer"]);
    }

    #[tokio::test]
    async fn test_accepted_predicate_runs_nested_handlers_first() {
        let log = CallLog::new();
        let pipeline = Pipeline::<u32>::with_handlers([
            when(
                |n: &u32| *n > 10,
                [
                    RecordingHandler::handler("nested-1", &log),
                    RecordingHandler::handler("nested-2", &log),
                ],
            ),
            RecordingHandler::handler("outer", &log),
        ]);

        pipeline.execute(50_u32, None).await.expect("pipeline should succeed");
        assert_eq!(log.calls(), vec!["nested-1", "nested-2", "outer"]);
    }

    #[tokio::test]
    async fn test_nested_failure_raises_same_error() {
        let log = CallLog::new();
        let matcher = When::<u32>::new(
            |_: &u32| true,
            [FailingHandler::handler("nested", "nested boom", &log)],
        )
        .named("always");
        assert_eq!(Middleware::<u32>::name(&matcher), "always");
        assert_eq!(matcher.len(), 1);

        let (next, _continuation) = Next::channel();
        let err = matcher
            .handle(Arc::new(1), next)
            .await
            .expect_err("nested failure should be raised");
        assert_eq!(err.to_string(), "nested boom");
    }

    #[tokio::test]
    async fn test_nested_error_handler_recovers() {
        let log = CallLog::new();
        let pipeline = Pipeline::<u32>::with_handlers([
            when(
                |_: &u32| true,
                [
                    FailingHandler::handler("nested", "nested boom", &log),
                    RecoveringErrorHandler::handler("nested-recover", &log),
                ],
            ),
            RecordingHandler::handler("outer", &log),
        ]);

        pipeline.execute(1_u32, None).await.expect("nested recovery should not surface");
        assert_eq!(log.calls(), vec!["nested", "nested-recover", "outer"]);
    }
}
