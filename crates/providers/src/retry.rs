//! Retry wrapper: per-attempt timeout plus a single retry on transient errors.
//!
//! Model-client failures are retried at most once. Anything that would fail
//! identically the second time (auth, 4xx) is returned straight away so the
//! planner can fall back without delay.

use async_trait::async_trait;
use banter_core::error::ProviderError;
use banter_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A provider that bounds each attempt with a timeout and retries once.
pub struct RetryProvider {
    inner: Arc<dyn banter_core::Provider>,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl RetryProvider {
    /// Wrap `inner` with the default policy: one retry, 250ms backoff.
    pub fn new(inner: Arc<dyn banter_core::Provider>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            max_retries: 1,
            backoff: Duration::from_millis(250),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        match tokio::time::timeout(self.timeout, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "Provider '{}' timed out after {}s",
                self.inner.name(),
                self.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl banter_core::Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(request.clone()).await {
                Ok(response) => {
                    debug!(provider = %self.inner.name(), attempt, "Completion succeeded");
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        error = %e,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banter_core::Provider;
    use banter_core::message::Message;
    use std::sync::Mutex;

    /// Fails with the scripted errors in order, then succeeds.
    struct ScriptedProvider {
        errors: Mutex<Vec<ProviderError>>,
        call_count: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn new(mut errors: Vec<ProviderError>) -> Self {
            errors.reverse();
            Self {
                errors: Mutex::new(errors),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl banter_core::Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            if let Some(err) = self.errors.lock().unwrap().pop() {
                return Err(err);
            }
            Ok(ProviderResponse {
                message: Message::assistant("success"),
                usage: None,
                model: "test-model".into(),
            })
        }
    }

    /// A provider that hangs forever (for timeout testing).
    struct HangingProvider;

    #[async_trait]
    impl banter_core::Provider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ProviderError::Network("unreachable".into()))
        }
    }

    fn test_request() -> ProviderRequest {
        ProviderRequest {
            model: "test".into(),
            messages: vec![Message::user("hello")],
            temperature: 0.4,
            max_tokens: None,
            tools: vec![],
            tool_choice: ToolChoice::Auto,
        }
    }

    fn wrap(inner: Arc<dyn banter_core::Provider>) -> RetryProvider {
        RetryProvider::new(inner, Duration::from_secs(30)).with_backoff(Duration::ZERO)
    }

    #[tokio::test]
    async fn success_needs_one_call() {
        let inner = Arc::new(ScriptedProvider::new(vec![]));
        let provider = wrap(inner.clone());

        let response = provider.complete(test_request()).await.unwrap();
        assert_eq!(response.message.content, "success");
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn transient_error_is_retried_once() {
        let inner = Arc::new(ScriptedProvider::new(vec![ProviderError::ApiError {
            status_code: 502,
            message: "bad gateway".into(),
        }]));
        let provider = wrap(inner.clone());

        assert!(provider.complete(test_request()).await.is_ok());
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn second_transient_error_is_returned() {
        let inner = Arc::new(ScriptedProvider::new(vec![
            ProviderError::Network("reset".into()),
            ProviderError::Network("reset again".into()),
        ]));
        let provider = wrap(inner.clone());

        match provider.complete(test_request()).await {
            Err(ProviderError::Network(msg)) => assert_eq!(msg, "reset again"),
            other => panic!("Expected Network error, got: {other:?}"),
        }
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let inner = Arc::new(ScriptedProvider::new(vec![
            ProviderError::AuthenticationFailed("bad key".into()),
        ]));
        let provider = wrap(inner.clone());

        assert!(matches!(
            provider.complete(test_request()).await,
            Err(ProviderError::AuthenticationFailed(_))
        ));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_attempts_time_out() {
        let provider = RetryProvider::new(Arc::new(HangingProvider), Duration::from_secs(5))
            .with_max_retries(0);

        match provider.complete(test_request()).await {
            Err(ProviderError::Timeout(msg)) => assert!(msg.contains("hanging")),
            other => panic!("Expected Timeout, got: {other:?}"),
        }
    }

    #[test]
    fn name_is_delegated() {
        let provider = wrap(Arc::new(ScriptedProvider::new(vec![])));
        assert_eq!(provider.name(), "scripted");
        assert_eq!(provider.timeout(), Duration::from_secs(30));
    }
}
