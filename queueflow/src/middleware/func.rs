//! Closure-backed handlers.

use super::{ErrorMiddleware, Middleware, Next};
use crate::errors::{BoxError, HandlerResult};
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

/// A normal-path handler backed by an async closure.
pub struct FnMiddleware<F> {
    name: String,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a new closure-backed handler.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<C, F, Fut> Middleware<C> for FnMiddleware<F>
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Next) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: Arc<C>, next: Next) -> HandlerResult {
        (self.func)(ctx, next).await
    }
}

/// An error-path handler backed by an async closure.
pub struct ErrorFnMiddleware<F> {
    name: String,
    func: F,
}

impl<F> ErrorFnMiddleware<F> {
    /// Creates a new closure-backed error handler.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for ErrorFnMiddleware<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorFnMiddleware")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<C, F, Fut> ErrorMiddleware<C> for ErrorFnMiddleware<F>
where
    C: Send + Sync + 'static,
    F: Fn(BoxError, Arc<C>, Next) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_error(&self, err: BoxError, ctx: Arc<C>, next: Next) -> HandlerResult {
        (self.func)(err, ctx, next).await
    }
}
