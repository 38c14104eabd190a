//! Timeout and retry wrapper for LLM clients.
//!
//! Model calls are the dominant latency and failure source of a workflow
//! run. `RetryingClient` bounds each attempt with a timeout and retries
//! failed attempts with exponential backoff before giving up.

use std::sync::Arc;
use std::time::Duration;

use arag_core::{AppError, AppResult};
use tracing::{instrument, warn};

use crate::client::{LlmClient, LlmRequest, LlmResponse};

/// Default attempts per call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Initial backoff duration in milliseconds
pub const INITIAL_BACKOFF_MS: u64 = 100;

/// Default per-attempt timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Retry policy applied by [`RetryingClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Deadline for a single attempt
    pub timeout: Duration,
    /// Backoff before the second attempt; doubles afterwards
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Backoff to wait after the given (1-based) failed attempt.
    fn backoff_after(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// LLM client decorator adding per-call timeouts and retries.
pub struct RetryingClient {
    inner: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    /// Wrap a client with the given policy.
    pub fn new(inner: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn attempt(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        match tokio::time::timeout(self.policy.timeout, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Llm(format!(
                "Request to {} timed out after {:?}",
                self.inner.provider_name(),
                self.policy.timeout
            ))),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for RetryingClient {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < attempts => {
                    let backoff = self.policy.backoff_after(attempt);
                    warn!(
                        "Completion failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt, attempts, backoff, e
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails a fixed number of times before answering.
    struct FlakyClient {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl LlmClient for FlakyClient {
        fn provider_name(&self) -> &str {
            "flaky"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(AppError::Llm("connection reset".to_string()));
            }
            Ok(LlmResponse::text("ok", request.model.clone()))
        }
    }

    /// Never answers within any reasonable deadline.
    struct SlowClient {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl LlmClient for SlowClient {
        fn provider_name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(LlmResponse::text("late", request.model.clone()))
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            timeout: Duration::from_millis(50),
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let inner = Arc::new(FlakyClient {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let client = RetryingClient::new(inner.clone(), fast_policy(3));

        let response = client
            .complete(&LlmRequest::new("hi", "mistral"))
            .await
            .unwrap();

        assert_eq!(response.content, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let inner = Arc::new(FlakyClient {
            failures: 10,
            calls: AtomicU32::new(0),
        });
        let client = RetryingClient::new(inner.clone(), fast_policy(2));

        let result = client.complete(&LlmRequest::new("hi", "mistral")).await;

        assert!(matches!(result, Err(AppError::Llm(_))));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let inner = Arc::new(SlowClient {
            calls: AtomicU32::new(0),
        });
        let client = RetryingClient::new(inner.clone(), fast_policy(2));

        let result = client.complete(&LlmRequest::new("hi", "mistral")).await;

        match result {
            Err(AppError::Llm(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout error, got {:?}", other.map(|r| r.content)),
        }
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_after(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(400));
    }
}
