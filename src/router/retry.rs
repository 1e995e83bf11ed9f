//! Bounded retry on top of the routing layer.
//!
//! Unlike fallback, this layer signals failure: when every attempt fails
//! the caller gets [`Error::Exhausted`] carrying the last error message.

use std::future::Future;
use std::time::Duration;

use super::fallback::Executor;
use super::types::{ExecutionResult, TaskRequest};
use crate::error::{Error, Result};

/// Attempt budget and backoff for the retry wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_retries: u32,
    /// Delay before each retry; the last entry repeats. Empty means none.
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Vec::new(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, backoff: Vec<Duration>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before 1-based attempt `attempt`. The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.backoff.is_empty() {
            return Duration::ZERO;
        }
        let index = ((attempt - 2) as usize).min(self.backoff.len() - 1);
        self.backoff[index]
    }
}

/// Why an attempt produced no result.
pub(super) enum AttemptFailure {
    /// Another attempt may succeed.
    Retry(String),
    /// Repeating the call cannot help.
    Stop(String),
    /// Not a backend failure; propagate unchanged.
    Abort(Error),
}

/// Run `attempt_fn` until it succeeds or `max_attempts` are used up.
pub(super) async fn retry_loop<T, F, Fut>(
    max_attempts: u32,
    policy: &RetryPolicy,
    mut attempt_fn: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, AttemptFailure>>,
{
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match attempt_fn(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(AttemptFailure::Retry(message)) => {
                tracing::warn!(attempt, max_attempts, error = %message, "Attempt failed");
                last_error = message;
            }
            Err(AttemptFailure::Stop(message)) => {
                tracing::warn!(attempt, error = %message, "Attempt failed, not retryable");
                return Err(Error::Exhausted {
                    attempts: attempt,
                    message,
                });
            }
            Err(AttemptFailure::Abort(e)) => return Err(e),
        }
    }

    Err(Error::Exhausted {
        attempts: max_attempts,
        message: last_error,
    })
}

impl Executor {
    /// Repeat [`Executor::execute_with_fallback`] until it succeeds.
    ///
    /// `max_retries` overrides the policy's attempt count.
    pub async fn execute_with_retry(
        &self,
        request: &TaskRequest,
        max_retries: Option<u32>,
    ) -> Result<ExecutionResult> {
        request.validate()?;
        let attempts = self.attempt_budget(max_retries)?;

        retry_loop(attempts, self.retry_policy(), |_| async move {
            match self.execute_with_fallback(request).await {
                Ok(result) if result.success => Ok(result),
                Ok(result) => Err(AttemptFailure::Retry(result.error.unwrap_or_default())),
                Err(e) => Err(AttemptFailure::Abort(e)),
            }
        })
        .await
    }

    /// Repeat a request against one named backend, without fallback.
    ///
    /// Errors that are not transient stop the loop early.
    pub async fn execute_on_with_retry(
        &self,
        backend_name: &str,
        request: &TaskRequest,
        max_retries: Option<u32>,
    ) -> Result<ExecutionResult> {
        request.validate()?;
        let attempts = self.attempt_budget(max_retries)?;
        let backend = self.registry().get(backend_name)?;

        retry_loop(attempts, self.retry_policy(), |_| async move {
            match self.invoke(backend, request).await {
                Ok(invocation) => Ok(invocation.into_result(
                    backend.name(),
                    false,
                    vec![backend.name().to_string()],
                )),
                Err(e) if e.is_transient() => Err(AttemptFailure::Retry(e.to_string())),
                Err(e) => Err(AttemptFailure::Stop(e.to_string())),
            }
        })
        .await
    }

    fn attempt_budget(&self, max_retries: Option<u32>) -> Result<u32> {
        match max_retries.unwrap_or(self.retry_policy().max_retries) {
            0 => Err(Error::InvalidRequest(
                "max_retries must be at least 1".to_string(),
            )),
            n => Ok(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_support::{ScriptedAdapter, Step};
    use crate::backend::{AdapterKind, Backend};
    use crate::registry::Registry;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn executor(backends: Vec<Backend>) -> Executor {
        Executor::new(Arc::new(Registry::from_backends(backends).unwrap()))
    }

    fn flaky(name: &str, failures: usize, status: u16) -> Backend {
        Backend::new(
            name,
            AdapterKind::Groq,
            ScriptedAdapter::sequence(vec![Step::Fail(status); failures], Step::reply("ok", 8)),
        )
    }

    #[test]
    fn test_delay_before_clamps_to_last() {
        let policy = RetryPolicy::new(5).with_backoff(vec![
            Duration::from_millis(100),
            Duration::from_millis(300),
        ]);
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before(3), Duration::from_millis(300));
        assert_eq!(policy.delay_before(7), Duration::from_millis(300));
        assert_eq!(RetryPolicy::default().delay_before(3), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds() {
        let executor = executor(vec![flaky("only", 2, 503)]);

        let result = executor
            .execute_with_retry(&TaskRequest::new("t", "hello"), Some(3))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.text(), Some("ok"));

        let outcomes = executor.registry().get("only").unwrap().outcomes();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|r| !r.success).count(), 2);
        assert!(outcomes[2].success);
    }

    #[tokio::test]
    async fn test_always_failing_exhausts_after_three() {
        let executor = executor(vec![Backend::new(
            "only",
            AdapterKind::Groq,
            ScriptedAdapter::always(Step::Fail(503)),
        )]);

        let err = executor
            .execute_with_retry(&TaskRequest::new("t", "hello"), None)
            .await
            .unwrap_err();
        match err {
            Error::Exhausted { attempts, message } => {
                assert_eq!(attempts, 3);
                assert!(message.contains("503"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }

        let outcomes = executor.registry().get("only").unwrap().outcomes();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|r| !r.success));
    }

    // Paused time keeps latencies at zero so selection stays on registration order
    #[tokio::test(start_paused = true)]
    async fn test_each_attempt_falls_back_internally() {
        let executor = executor(vec![flaky("a", 10, 500), flaky("b", 1, 500)]);

        let result = executor
            .execute_with_retry(&TaskRequest::new("t", "hello"), None)
            .await
            .unwrap();

        // Attempt 1: a fails, b fails. Attempt 2: a fails, b succeeds.
        assert!(result.fallback_used);
        assert_eq!(result.backend.as_deref(), Some("b"));
        assert_eq!(executor.registry().get("a").unwrap().outcomes().len(), 2);
        assert_eq!(executor.registry().get("b").unwrap().outcomes().len(), 2);
    }

    #[tokio::test]
    async fn test_fixed_backend_retry() {
        let executor = executor(vec![flaky("a", 0, 500), flaky("target", 2, 502)]);

        let result = executor
            .execute_on_with_retry("target", &TaskRequest::new("t", "hello"), None)
            .await
            .unwrap();
        assert_eq!(result.backend.as_deref(), Some("target"));
        assert!(!result.fallback_used);
        assert!(executor.registry().get("a").unwrap().outcomes().is_empty());
        assert_eq!(executor.registry().get("target").unwrap().outcomes().len(), 3);
    }

    #[tokio::test]
    async fn test_fixed_backend_stops_on_permanent_error() {
        let executor = executor(vec![flaky("target", 5, 401)]);

        let err = executor
            .execute_on_with_retry("target", &TaskRequest::new("t", "hello"), Some(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Exhausted { attempts: 1, .. }));
        assert_eq!(executor.registry().get("target").unwrap().outcomes().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_backend() {
        let executor = executor(vec![flaky("a", 0, 500)]);
        let err = executor
            .execute_on_with_retry("ghost", &TaskRequest::new("t", "hello"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { name } if name == "ghost"));
    }

    #[tokio::test]
    async fn test_zero_retries_rejected() {
        let executor = executor(vec![flaky("a", 0, 500)]);
        let err = executor
            .execute_with_retry(&TaskRequest::new("t", "hello"), Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(executor.registry().get("a").unwrap().outcomes().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_retried() {
        let executor = executor(vec![flaky("a", 0, 500)]);
        let err = executor
            .execute_with_retry(&TaskRequest::new("", "hello"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_attempts() {
        let executor = executor(vec![flaky("only", 2, 503)]).with_retry_policy(
            RetryPolicy::new(3).with_backoff(vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
            ]),
        );

        let start = tokio::time::Instant::now();
        let result = executor
            .execute_with_retry(&TaskRequest::new("t", "hello"), None)
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert!(result.success);
        assert!(elapsed >= Duration::from_millis(300), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(400), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_retry_loop_counts_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<u32> = retry_loop(4, &RetryPolicy::default(), |attempt| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 4 {
                    Err(AttemptFailure::Retry(format!("attempt {}", attempt)))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_loop_reports_last_error() {
        let result: Result<()> = retry_loop(2, &RetryPolicy::default(), |attempt| async move {
            Err(AttemptFailure::Retry(format!("failure {}", attempt)))
        })
        .await;

        match result {
            Err(Error::Exhausted { attempts, message }) => {
                assert_eq!(attempts, 2);
                assert_eq!(message, "failure 2");
            }
            other => panic!("expected Exhausted, got {:?}", other.err()),
        }
    }
}
