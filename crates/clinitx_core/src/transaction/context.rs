//! Request lifetime: cancellation and deadlines.

use crate::error::{CoreError, CoreResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cloneable flag that signals cancellation of an inbound request.
///
/// Clones share the same flag, so the transport layer can keep one half
/// and hand the other to the coordinator.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-request state the coordinator consults between store calls.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Creates a context with no deadline and a fresh token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the given cancellation token.
    #[must_use]
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a copy that falls back to `timeout` when no deadline is set.
    #[must_use]
    pub fn or_timeout(&self, timeout: Option<Duration>) -> Self {
        match (self.deadline, timeout) {
            (None, Some(timeout)) => self.clone().with_timeout(timeout),
            _ => self.clone(),
        }
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails if the request was cancelled or its deadline has passed.
    ///
    /// `next_index` is the entry about to be processed and is carried in
    /// the error for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Cancelled`] or [`CoreError::TimedOut`].
    pub fn check(&self, next_index: usize) -> CoreResult<()> {
        if self.token.is_cancelled() {
            return Err(CoreError::Cancelled { index: next_index });
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(CoreError::TimedOut { index: next_index });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_passes() {
        assert!(RequestContext::new().check(0).is_ok());
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new().with_token(token.clone());
        token.cancel();
        assert!(ctx.token().is_cancelled());
        assert!(matches!(ctx.check(3), Err(CoreError::Cancelled { index: 3 })));
    }

    #[test]
    fn elapsed_deadline_times_out() {
        let ctx = RequestContext::new().with_deadline(Instant::now());
        assert!(matches!(ctx.check(0), Err(CoreError::TimedOut { index: 0 })));
    }

    #[test]
    fn future_deadline_passes() {
        let ctx = RequestContext::new().with_timeout(Duration::from_secs(60));
        assert!(ctx.check(0).is_ok());
    }

    #[test]
    fn or_timeout_keeps_explicit_deadline() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let ctx = RequestContext::new().with_deadline(deadline);
        let derived = ctx.or_timeout(Some(Duration::from_secs(600)));
        assert_eq!(derived.deadline(), Some(deadline));
    }

    #[test]
    fn or_timeout_fills_missing_deadline() {
        let ctx = RequestContext::new();
        assert!(ctx.or_timeout(None).deadline().is_none());
        assert!(ctx
            .or_timeout(Some(Duration::from_secs(1)))
            .deadline()
            .is_some());
    }
}
