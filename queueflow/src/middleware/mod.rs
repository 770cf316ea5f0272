//! Handler traits and the tagged handler type.
//!
//! A pipeline is made of two kinds of handlers:
//!
//! - [`Middleware`] runs on the normal path and receives the context.
//! - [`ErrorMiddleware`] runs only after an error was signalled and receives
//!   that error along with the context.
//!
//! The kind is fixed when a [`Handler`] is constructed and never inferred.

mod func;
mod next;

pub use func::{ErrorFnMiddleware, FnMiddleware};
pub use next::Next;
pub(crate) use next::Signal;

use crate::errors::{BoxError, HandlerResult};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// A handler on the normal path.
#[async_trait]
pub trait Middleware<C>: Send + Sync
where
    C: Send + Sync + 'static,
{
    /// Returns the handler's name, used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handles the context.
    ///
    /// Call `next.proceed()` to continue or `next.fail(err)` to switch to the
    /// error handlers. Returning `Err` is equivalent to `next.fail(err)`.
    async fn handle(&self, ctx: Arc<C>, next: Next) -> HandlerResult;
}

/// A handler on the error path.
#[async_trait]
pub trait ErrorMiddleware<C>: Send + Sync
where
    C: Send + Sync + 'static,
{
    /// Returns the handler's name, used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handles an error raised earlier in the chain.
    ///
    /// Call `next.proceed()` to recover, which ends the execution
    /// successfully, or `next.fail(err)` to hand the error to the next error
    /// handler.
    async fn handle_error(&self, err: BoxError, ctx: Arc<C>, next: Next) -> HandlerResult;
}

/// The kind a handler was registered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// Runs on the normal path.
    Normal,
    /// Runs on the error path.
    Error,
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A handler tagged with its kind.
pub enum Handler<C> {
    /// A normal-path handler.
    Normal(Arc<dyn Middleware<C>>),
    /// An error-path handler.
    Error(Arc<dyn ErrorMiddleware<C>>),
}

impl<C> Handler<C>
where
    C: Send + Sync + 'static,
{
    /// Wraps a normal-path handler.
    pub fn normal(middleware: impl Middleware<C> + 'static) -> Self {
        Self::Normal(Arc::new(middleware))
    }

    /// Wraps an error-path handler.
    pub fn error(middleware: impl ErrorMiddleware<C> + 'static) -> Self {
        Self::Error(Arc::new(middleware))
    }

    /// Creates a normal-path handler from an async closure.
    pub fn from_fn<F, Fut>(func: F) -> Self
    where
        F: Fn(Arc<C>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::normal(FnMiddleware::new("fn", func))
    }

    /// Creates an error-path handler from an async closure.
    pub fn from_error_fn<F, Fut>(func: F) -> Self
    where
        F: Fn(BoxError, Arc<C>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::error(ErrorFnMiddleware::new("error_fn", func))
    }

    /// Returns the handler's kind.
    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        match self {
            Self::Normal(_) => HandlerKind::Normal,
            Self::Error(_) => HandlerKind::Error,
        }
    }

    /// Returns the handler's name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Normal(handler) => handler.name(),
            Self::Error(handler) => handler.name(),
        }
    }
}

impl<C> Clone for Handler<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Normal(handler) => Self::Normal(Arc::clone(handler)),
            Self::Error(handler) => Self::Error(Arc::clone(handler)),
        }
    }
}

impl<C> std::fmt::Debug for Handler<C>
where
    C: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Passthrough;

    #[async_trait]
    impl Middleware<()> for Passthrough {
        async fn handle(&self, _ctx: Arc<()>, next: Next) -> HandlerResult {
            next.proceed();
            Ok(())
        }
    }

    #[test]
    fn test_handler_kinds() {
        let normal = Handler::<()>::from_fn(|_ctx, next| async move {
            next.proceed();
            Ok(())
        });
        let error = Handler::<()>::from_error_fn(|err, _ctx, next| async move {
            next.fail(err);
            Ok(())
        });

        assert_eq!(normal.kind(), HandlerKind::Normal);
        assert_eq!(error.kind(), HandlerKind::Error);
        assert_eq!(error.kind().to_string(), "error");
    }

    #[test]
    fn test_default_name_is_type_name() {
        let handler = Handler::normal(Passthrough);
        assert!(handler.name().ends_with("Passthrough"));
    }

    #[test]
    fn test_clone_shares_handler() {
        let handler = Handler::normal(Passthrough);
        let cloned = handler.clone();
        match (&handler, &cloned) {
            (Handler::Normal(a), Handler::Normal(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("kind changed on clone"),
        }
    }
}
