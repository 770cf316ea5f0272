//! Per-execution state machine.

use super::registry::HandlerRegistry;
use crate::cancellation::Deadline;
use crate::errors::{BoxError, PipelineError};
use crate::middleware::{ErrorMiddleware, Middleware, Next, Signal};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Which stack is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Error,
}

/// State for one pass through a registry.
///
/// Built fresh by every `execute` call and consumed by [`Execution::run`].
pub(crate) struct Execution<C> {
    normal: std::vec::IntoIter<Arc<dyn Middleware<C>>>,
    errors: std::vec::IntoIter<Arc<dyn ErrorMiddleware<C>>>,
    mode: Mode,
    ctx: Arc<C>,
    deadline: Option<Arc<Deadline>>,
}

impl<C> Execution<C>
where
    C: Send + Sync + 'static,
{
    pub(crate) fn new(
        registry: &HandlerRegistry<C>,
        ctx: Arc<C>,
        deadline: Option<Arc<Deadline>>,
    ) -> Self {
        Self {
            normal: registry.normal_stack().into_iter(),
            errors: registry.error_stack().into_iter(),
            mode: Mode::Normal,
            ctx,
            deadline,
        }
    }

    /// Drives the chain until it settles or its deadline passes.
    pub(crate) async fn run(mut self) -> Result<(), PipelineError> {
        // The error carried by the latest `proceed` signal.
        let mut pending: Option<BoxError> = None;

        loop {
            if let Some(err) = self.deadline.as_deref().and_then(Deadline::expired) {
                trace!("Deadline passed, discarding remaining handlers");
                return Err(err.into());
            }

            if pending.is_some() && self.mode == Mode::Normal {
                debug!(
                    skipped = self.normal.len(),
                    "Switching to error handlers"
                );
                self.mode = Mode::Error;
            }

            let signal = match self.mode {
                Mode::Normal => match self.normal.next() {
                    Some(handler) => self.invoke(handler).await,
                    None => {
                        trace!("Normal handlers exhausted");
                        return Ok(());
                    }
                },
                Mode::Error => {
                    let Some(err) = pending.take() else {
                        debug!(
                            skipped = self.errors.len(),
                            "Error handler recovered"
                        );
                        return Ok(());
                    };
                    match self.errors.next() {
                        Some(handler) => self.invoke_error(handler, err).await,
                        None => {
                            debug!(error = %err, "Error handlers exhausted");
                            return Err(PipelineError::Handler(err));
                        }
                    }
                }
            };

            match signal {
                Signal::Proceed(err) => pending = err,
                Signal::Halted => {
                    warn!("Handler dropped its continuation, halting pipeline");
                    return Err(PipelineError::Halted);
                }
                Signal::Expired(err) => return Err(err.into()),
            }
        }
    }

    async fn invoke(&self, handler: Arc<dyn Middleware<C>>) -> Signal {
        trace!(handler = handler.name(), "Invoking handler");
        let (next, continuation) = Next::channel();
        let outcome = AssertUnwindSafe(handler.handle(Arc::clone(&self.ctx), next))
            .catch_unwind()
            .await;
        continuation.settle(outcome, self.deadline.as_deref()).await
    }

    async fn invoke_error(&self, handler: Arc<dyn ErrorMiddleware<C>>, err: BoxError) -> Signal {
        trace!(handler = handler.name(), error = %err, "Invoking error handler");
        let (next, continuation) = Next::channel();
        let outcome = AssertUnwindSafe(handler.handle_error(err, Arc::clone(&self.ctx), next))
            .catch_unwind()
            .await;
        continuation.settle(outcome, self.deadline.as_deref()).await
    }
}
