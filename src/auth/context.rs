//! Per-call execution context.
//!
//! A `CallContext` is created by the transport adapter for every inbound call and
//! handed to the service by value. It carries the structured logging fields of the
//! call (`request_id`) and bounds every store and hashing step by an optional
//! deadline and a cancellation token. When either fires first, the in-flight future
//! is dropped and the call fails with [`AuthError::DeadlineExceeded`] or
//! [`AuthError::Cancelled`].

use super::AuthError;
use std::{future::Future, time::Duration};
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: String,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Context with a fresh ULID request id and no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::new(Ulid::new().to_string())
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Run `fut` until it completes, the deadline passes, or the context is cancelled.
    ///
    /// # Errors
    /// Returns `Cancelled` or `DeadlineExceeded` when `fut` is abandoned.
    pub async fn bound<F>(&self, fut: F) -> Result<F::Output, AuthError>
    where
        F: Future,
    {
        if self.cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        let work = async {
            match self.deadline {
                Some(deadline) => timeout_at(deadline, fut)
                    .await
                    .map_err(|_| AuthError::DeadlineExceeded),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AuthError::Cancelled),
            result = work => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bound_passes_through_completed_work() {
        let ctx = CallContext::new("req-1").with_timeout(Duration::from_secs(5));
        let value = ctx.bound(async { 42 }).await;
        assert_eq!(value, Ok(42));
        assert_eq!(ctx.request_id(), "req-1");
    }

    #[tokio::test]
    async fn bound_abandons_work_past_deadline() {
        let ctx = CallContext::background().with_timeout(Duration::from_millis(20));
        let result = ctx.bound(std::future::pending::<()>()).await;
        assert_eq!(result, Err(AuthError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn bound_abandons_work_on_cancel() {
        let token = CancellationToken::new();
        let ctx = CallContext::background().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let result = ctx.bound(std::future::pending::<()>()).await;
        assert_eq!(result, Err(AuthError::Cancelled));
        assert!(canceller.await.is_ok());
    }

    #[tokio::test]
    async fn bound_refuses_already_cancelled_context() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = CallContext::background().with_cancellation(token);
        assert_eq!(ctx.bound(async { 1 }).await, Err(AuthError::Cancelled));
    }

    #[test]
    fn background_context_has_ulid_and_no_deadline() {
        let ctx = CallContext::background();
        assert!(Ulid::from_string(ctx.request_id()).is_ok());
        assert!(ctx.deadline().is_none());
    }
}
