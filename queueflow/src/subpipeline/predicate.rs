//! Context predicates.

/// Decides whether a sub-pipeline runs for a context.
pub trait Predicate<C>: Send + Sync {
    /// Returns true if the sub-pipeline should run.
    fn matches(&self, ctx: &C) -> bool;
}

impl<C, F> Predicate<C> for F
where
    F: Fn(&C) -> bool + Send + Sync,
{
    fn matches(&self, ctx: &C) -> bool {
        self(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_predicate() {
        let even = |n: &u32| n % 2 == 0;
        assert!(even.matches(&4));
        assert!(!even.matches(&3));
    }
}
