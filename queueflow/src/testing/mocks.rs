//! Mock handlers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::errors::{BoxError, HandlerResult};
use crate::middleware::{ErrorMiddleware, Handler, Middleware, Next};

/// The error raised by the failing mocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MockError(pub String);

/// Shared record of handler invocations.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a handler invocation.
    pub fn record(&self, name: &str) {
        self.calls.lock().push(name.to_string());
    }

    /// Records an error an error handler received.
    pub fn record_error(&self, err: &BoxError) {
        self.errors.lock().push(err.to_string());
    }

    /// Handler names in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Messages of the errors error handlers received, in order.
    #[must_use]
    pub fn errors_seen(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Number of recorded invocations.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Clears both records.
    pub fn clear(&self) {
        self.calls.lock().clear();
        self.errors.lock().clear();
    }
}

/// Records its name and proceeds.
#[derive(Debug)]
pub struct RecordingHandler {
    name: String,
    log: CallLog,
}

impl RecordingHandler {
    /// Creates a recording handler.
    #[must_use]
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
        }
    }

    /// Creates a recording handler ready to register.
    #[must_use]
    pub fn handler<C: Send + Sync + 'static>(name: impl Into<String>, log: &CallLog) -> Handler<C> {
        Handler::normal(Self::new(name, log))
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Middleware<C> for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _ctx: Arc<C>, next: Next) -> HandlerResult {
        self.log.record(&self.name);
        next.proceed();
        Ok(())
    }
}

/// Records its name and fails.
#[derive(Debug)]
pub struct FailingHandler {
    name: String,
    error: String,
    throws: bool,
    log: CallLog,
}

impl FailingHandler {
    /// Creates a handler that fails through its continuation.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
            throws: false,
            log: log.clone(),
        }
    }

    /// Creates a handler that fails by returning `Err`.
    #[must_use]
    pub fn throwing(name: impl Into<String>, error: impl Into<String>, log: &CallLog) -> Self {
        Self {
            throws: true,
            ..Self::new(name, error, log)
        }
    }

    /// Creates a continuation-failing handler ready to register.
    #[must_use]
    pub fn handler<C: Send + Sync + 'static>(
        name: impl Into<String>,
        error: impl Into<String>,
        log: &CallLog,
    ) -> Handler<C> {
        Handler::normal(Self::new(name, error, log))
    }

    /// Creates a returning-`Err` handler ready to register.
    #[must_use]
    pub fn throwing_handler<C: Send + Sync + 'static>(
        name: impl Into<String>,
        error: impl Into<String>,
        log: &CallLog,
    ) -> Handler<C> {
        Handler::normal(Self::throwing(name, error, log))
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Middleware<C> for FailingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _ctx: Arc<C>, next: Next) -> HandlerResult {
        self.log.record(&self.name);
        let err = MockError(self.error.clone());
        if self.throws {
            return Err(Box::new(err));
        }
        next.fail(err);
        Ok(())
    }
}

/// Records its name, sleeps, then proceeds.
#[derive(Debug)]
pub struct SlowHandler {
    name: String,
    delay: Duration,
    log: CallLog,
}

impl SlowHandler {
    /// Creates a slow handler.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            delay,
            log: log.clone(),
        }
    }

    /// Creates a slow handler ready to register.
    #[must_use]
    pub fn handler<C: Send + Sync + 'static>(
        name: impl Into<String>,
        delay: Duration,
        log: &CallLog,
    ) -> Handler<C> {
        Handler::normal(Self::new(name, delay, log))
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Middleware<C> for SlowHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _ctx: Arc<C>, next: Next) -> HandlerResult {
        self.log.record(&self.name);
        tokio::time::sleep(self.delay).await;
        next.proceed();
        Ok(())
    }
}

/// Records its name and returns without touching its continuation.
#[derive(Debug)]
pub struct HaltingHandler {
    name: String,
    log: CallLog,
}

impl HaltingHandler {
    /// Creates a halting handler ready to register.
    #[must_use]
    pub fn handler<C: Send + Sync + 'static>(name: impl Into<String>, log: &CallLog) -> Handler<C> {
        Handler::normal(Self {
            name: name.into(),
            log: log.clone(),
        })
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Middleware<C> for HaltingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _ctx: Arc<C>, next: Next) -> HandlerResult {
        self.log.record(&self.name);
        drop(next);
        Ok(())
    }
}

/// Records its name and panics.
#[derive(Debug)]
pub struct PanickingHandler {
    name: String,
    log: CallLog,
}

impl PanickingHandler {
    /// Creates a panicking handler ready to register.
    #[must_use]
    pub fn handler<C: Send + Sync + 'static>(name: impl Into<String>, log: &CallLog) -> Handler<C> {
        Handler::normal(Self {
            name: name.into(),
            log: log.clone(),
        })
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Middleware<C> for PanickingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _ctx: Arc<C>, _next: Next) -> HandlerResult {
        self.log.record(&self.name);
        panic!("{} panicked", self.name);
    }
}

/// Records the error and recovers.
#[derive(Debug)]
pub struct RecoveringErrorHandler {
    name: String,
    log: CallLog,
}

impl RecoveringErrorHandler {
    /// Creates a recovering error handler ready to register.
    #[must_use]
    pub fn handler<C: Send + Sync + 'static>(name: impl Into<String>, log: &CallLog) -> Handler<C> {
        Handler::error(Self {
            name: name.into(),
            log: log.clone(),
        })
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> ErrorMiddleware<C> for RecoveringErrorHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_error(&self, err: BoxError, _ctx: Arc<C>, next: Next) -> HandlerResult {
        self.log.record(&self.name);
        self.log.record_error(&err);
        next.proceed();
        Ok(())
    }
}

/// Records the error and passes it, or a replacement, on.
#[derive(Debug)]
pub struct ForwardingErrorHandler {
    name: String,
    replacement: Option<String>,
    log: CallLog,
}

impl ForwardingErrorHandler {
    /// Creates an error handler that forwards the error unchanged.
    #[must_use]
    pub fn handler<C: Send + Sync + 'static>(name: impl Into<String>, log: &CallLog) -> Handler<C> {
        Handler::error(Self {
            name: name.into(),
            replacement: None,
            log: log.clone(),
        })
    }

    /// Creates an error handler that forwards a new error with `message`.
    #[must_use]
    pub fn rewriting<C: Send + Sync + 'static>(
        name: impl Into<String>,
        message: impl Into<String>,
        log: &CallLog,
    ) -> Handler<C> {
        Handler::error(Self {
            name: name.into(),
            replacement: Some(message.into()),
            log: log.clone(),
        })
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> ErrorMiddleware<C> for ForwardingErrorHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_error(&self, err: BoxError, _ctx: Arc<C>, next: Next) -> HandlerResult {
        self.log.record(&self.name);
        self.log.record_error(&err);
        match &self.replacement {
            Some(message) => next.fail(MockError(message.clone())),
            None => next.fail(err),
        }
        Ok(())
    }
}
