//! Retrying gateway wrapper
//!
//! [`RetryingClient`] re-issues failed calls up to a fixed number of attempts
//! with exponential backoff. Context-length failures are returned at once,
//! whether typed or recognized from a provider's overflow message: resending
//! the same oversized prompt cannot succeed, and the research stages that can
//! recover from them do so by truncating.
//!
//! Structured replies are checked against their schema inside the retried
//! call, so a malformed reply is retried like a failed request.

use crate::llm::capabilities::is_token_limit_exceeded;
use crate::llm::client::{ConversationMessage, LLMClient, LLMResponse, LLMStream};
use crate::llm::structured::OutputSchema;
use crate::types::{AppError, Result, ToolDefinition};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const MAX_DELAY_MS: u64 = 30_000;

/// Retry policy for gateway calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay_ms,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor).min(MAX_DELAY_MS))
    }
}

/// Wraps another client and retries its failed calls.
pub struct RetryingClient {
    inner: Arc<dyn LLMClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn LLMClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn is_retryable(&self, error: &AppError) -> bool {
        let permanent = matches!(
            error,
            AppError::ContextLengthExceeded { .. }
                | AppError::Unsupported(_)
                | AppError::Configuration(_)
                | AppError::InvalidInput(_)
        );
        !permanent && !is_token_limit_exceeded(error, self.inner.model_name())
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts || !self.is_retryable(&e) {
                        return Err(e);
                    }
                    let delay = self.policy.delay_for(attempt - 1);
                    warn!(
                        operation,
                        model = self.inner.model_name(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying LLM request"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl LLMClient for RetryingClient {
    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        self.with_retry("generate", || {
            self.inner.generate_with_tools_and_history(messages, tools)
        })
        .await
    }

    async fn generate_structured(
        &self,
        messages: &[ConversationMessage],
        schema: &OutputSchema,
    ) -> Result<serde_json::Value> {
        self.with_retry("generate_structured", || async move {
            let value = self.inner.generate_structured(messages, schema).await?;
            schema.check(&value)?;
            Ok(value)
        })
        .await
    }

    async fn stream_with_history(&self, messages: &[ConversationMessage]) -> Result<LLMStream> {
        // Only stream setup is retried; a stream that fails midway is the caller's concern.
        self.with_retry("stream", || self.inner.stream_with_history(messages))
            .await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyClient {
        calls: AtomicU32,
        failures: u32,
        error: fn() -> AppError,
        model: &'static str,
    }

    #[async_trait]
    impl LLMClient for FlakyClient {
        async fn generate_with_tools_and_history(
            &self,
            _messages: &[ConversationMessage],
            _tools: &[ToolDefinition],
        ) -> Result<LLMResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(LLMResponse::text("ok"))
            }
        }

        async fn generate_structured(
            &self,
            _messages: &[ConversationMessage],
            _schema: &OutputSchema,
        ) -> Result<serde_json::Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Ok(serde_json::json!({ "brief": "missing the required field" }))
            } else {
                Ok(serde_json::json!({ "approved": true }))
            }
        }

        fn model_name(&self) -> &str {
            self.model
        }
    }

    fn flaky(failures: u32, error: fn() -> AppError) -> Arc<FlakyClient> {
        flaky_model("flaky", failures, error)
    }

    fn flaky_model(model: &'static str, failures: u32, error: fn() -> AppError) -> Arc<FlakyClient> {
        Arc::new(FlakyClient {
            calls: AtomicU32::new(0),
            failures,
            error,
            model,
        })
    }

    #[derive(serde::Deserialize, schemars::JsonSchema)]
    #[allow(dead_code)]
    struct Verdict {
        approved: bool,
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let inner = flaky(2, || AppError::LLM("503 Service Unavailable".into()));
        let client = RetryingClient::new(inner.clone(), RetryPolicy::new(3, 500));

        let response = client.generate("hi").await.unwrap();
        assert_eq!(response, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let inner = flaky(10, || AppError::LLM("500".into()));
        let client = RetryingClient::new(inner.clone(), RetryPolicy::new(3, 500));

        assert!(client.generate("hi").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_length_is_not_retried() {
        let inner = flaky(10, || AppError::ContextLengthExceeded {
            model: "flaky".into(),
            message: "too long".into(),
        });
        let client = RetryingClient::new(inner.clone(), RetryPolicy::new(3, 500));

        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, AppError::ContextLengthExceeded { .. }));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_overflow_message_is_not_retried() {
        let inner = flaky_model("claude-sonnet-4", 10, || {
            AppError::LLM("400 Bad Request: prompt is too long: 210000 tokens > 200000 maximum".into())
        });
        let client = RetryingClient::new(inner.clone(), RetryPolicy::new(3, 500));

        assert!(client.generate("hi").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_structured_reply_is_retried() {
        let inner = flaky(1, || AppError::LLM("unused".into()));
        let client = RetryingClient::new(inner.clone(), RetryPolicy::new(3, 500));
        let schema = OutputSchema::for_type::<Verdict>("Verdict");

        let value = client
            .generate_structured(&[ConversationMessage::user("decide")], &schema)
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!({ "approved": true }));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_structured_reply_that_never_conforms_fails() {
        let inner = flaky(10, || AppError::LLM("unused".into()));
        let client = RetryingClient::new(inner.clone(), RetryPolicy::new(3, 500));
        let schema = OutputSchema::for_type::<Verdict>("Verdict");

        let err = client
            .generate_structured(&[ConversationMessage::user("decide")], &schema)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not match schema 'Verdict'"));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(10, 500);
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(20), Duration::from_millis(MAX_DELAY_MS));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, 100).max_attempts, 1);
    }
}
