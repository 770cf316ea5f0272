//! Ordered handler registry.

use crate::middleware::{ErrorMiddleware, Handler, HandlerKind, Middleware};
use std::sync::Arc;

/// An ordered, growable list of tagged handlers.
///
/// Registration order is preserved. The normal and error stacks handed to an
/// execution are two views over the same list.
pub struct HandlerRegistry<C> {
    handlers: Vec<Handler<C>>,
}

impl<C> HandlerRegistry<C>
where
    C: Send + Sync + 'static,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Appends one handler.
    pub fn push(&mut self, handler: Handler<C>) {
        self.handlers.push(handler);
    }

    /// Appends handlers in order.
    pub fn register(&mut self, handlers: impl IntoIterator<Item = Handler<C>>) {
        self.handlers.extend(handlers);
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Counts the handlers of one kind.
    #[must_use]
    pub fn count(&self, kind: HandlerKind) -> usize {
        self.handlers.iter().filter(|h| h.kind() == kind).count()
    }

    /// Iterates over all handlers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Handler<C>> {
        self.handlers.iter()
    }

    /// The normal-path handlers, in registration order.
    #[must_use]
    pub fn normal_stack(&self) -> Vec<Arc<dyn Middleware<C>>> {
        self.handlers
            .iter()
            .filter_map(|handler| match handler {
                Handler::Normal(h) => Some(Arc::clone(h)),
                Handler::Error(_) => None,
            })
            .collect()
    }

    /// The error-path handlers, in registration order.
    #[must_use]
    pub fn error_stack(&self) -> Vec<Arc<dyn ErrorMiddleware<C>>> {
        self.handlers
            .iter()
            .filter_map(|handler| match handler {
                Handler::Error(h) => Some(Arc::clone(h)),
                Handler::Normal(_) => None,
            })
            .collect()
    }
}

impl<C> Default for HandlerRegistry<C>
where
    C: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for HandlerRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<C> FromIterator<Handler<C>> for HandlerRegistry<C>
where
    C: Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = Handler<C>>>(iter: I) -> Self {
        let mut registry = Self::new();
        registry.register(iter);
        registry
    }
}

impl<C> std::fmt::Debug for HandlerRegistry<C>
where
    C: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.handlers.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallLog, ForwardingErrorHandler, RecordingHandler};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_preserves_order() {
        let log = CallLog::new();
        let mut registry = HandlerRegistry::<()>::new();
        registry.push(RecordingHandler::handler("a", &log));
        registry.register([
            ForwardingErrorHandler::handler("h1", &log),
            RecordingHandler::handler("b", &log),
            ForwardingErrorHandler::handler("h2", &log),
        ]);

        let names: Vec<_> = registry.iter().map(Handler::name).collect();
        assert_eq!(names, vec!["a", "h1", "b", "h2"]);
    }

    #[test]
    fn test_stacks_split_by_kind() {
        let log = CallLog::new();
        let registry: HandlerRegistry<()> = [
            RecordingHandler::handler("a", &log),
            ForwardingErrorHandler::handler("h1", &log),
            RecordingHandler::handler("b", &log),
            ForwardingErrorHandler::handler("h2", &log),
            RecordingHandler::handler("c", &log),
        ]
        .into_iter()
        .collect();

        let normal: Vec<_> = registry
            .normal_stack()
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        let errors: Vec<_> = registry
            .error_stack()
            .iter()
            .map(|h| h.name().to_string())
            .collect();

        assert_eq!(normal, vec!["a", "b", "c"]);
        assert_eq!(errors, vec!["h1", "h2"]);
        assert_eq!(registry.count(HandlerKind::Normal), 3);
        assert_eq!(registry.count(HandlerKind::Error), 2);
    }

    #[test]
    fn test_empty_registry() {
        let registry = HandlerRegistry::<()>::default();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.normal_stack().is_empty());
        assert!(registry.error_stack().is_empty());
    }
}
