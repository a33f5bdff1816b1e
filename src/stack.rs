//! Native stack headroom for the recursive tree walks.
//!
//! The formatter, the analyzer and the evaluator all recurse over the AST, and the evaluator
//! nests one future poll per call level on top of that. Each recursive step checks the
//! remaining stack and continues on a freshly allocated segment when it runs low, so the
//! depth of a walk is bounded by the configured limits and not by the thread's stack size.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

/// Below this much remaining stack, the next step moves to a new segment.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// Polls the inner future through [`ensure_sufficient_stack`].
pub struct GrowingStack<F> {
    inner: F,
}

impl<F> GrowingStack<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F: Future + Unpin> Future for GrowingStack<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = &mut self.inner;
        ensure_sufficient_stack(|| Pin::new(inner).poll(cx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: usize) -> usize {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
    }

    #[test]
    fn test_deep_recursion_grows_the_stack() {
        assert_eq!(depth(200_000), 200_000);
    }

    #[tokio::test]
    async fn test_growing_stack_passes_output_through() {
        let future = GrowingStack::new(Box::pin(async { 41 + 1 }));
        assert_eq!(future.await, 42);
    }
}
