//! Mock provider for testing
//!
//! Plays back a scripted sequence of outcomes and records what the router
//! asked of it, so routing decisions can be asserted without a network.

use crate::completion::{FinishReason, LlmRequest, ProviderCompletion, TokenUsage};
use crate::error::{Error, Result};
use crate::provider::LlmProvider;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A scripted outcome for one `generate_completion` call
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Succeed with this content
    Success(String),
    /// Fail with a provider error
    Failure {
        /// Vendor-reported message
        message: String,
        /// Whether the router may retry
        retryable: bool,
    },
    /// Sleep this long before succeeding, to exercise timeouts
    Slow(Duration),
}

/// A mock provider that plays back queued outcomes.
///
/// An empty queue yields a default success, so simple tests need no
/// scripting at all.
pub struct MockProvider {
    name: String,
    models: Vec<String>,
    script: Mutex<VecDeque<MockOutcome>>,
    calls: AtomicU32,
    last_request: Mutex<Option<LlmRequest>>,
    healthy: bool,
}

impl MockProvider {
    /// Create a mock named `name` serving one mock model
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            models: vec!["mock-model".to_string()],
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
            healthy: true,
        }
    }

    /// Report unhealthy from `is_healthy`
    #[must_use]
    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Queue an outcome for the next unscripted call
    pub fn push_outcome(&self, outcome: MockOutcome) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
    }

    /// Queue `n` copies of a failure outcome
    pub fn push_failures(&self, n: usize, retryable: bool) {
        for _ in 0..n {
            self.push_outcome(MockOutcome::Failure {
                message: "scripted failure".to_string(),
                retryable,
            });
        }
    }

    /// How many times `generate_completion` ran
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// The request received by the most recent call, if any
    #[must_use]
    pub fn last_request(&self) -> Option<LlmRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn completion(&self, request: &LlmRequest, content: String) -> ProviderCompletion {
        let prompt_tokens = self.estimate_tokens(&request.combined_text());
        let completion_tokens = self.estimate_tokens(&content);
        ProviderCompletion {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| "mock-model".to_string()),
            usage: Some(TokenUsage::new(prompt_tokens, completion_tokens)),
            content,
            finish_reason: FinishReason::Stop,
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn supported_models(&self) -> Vec<String> {
        self.models.clone()
    }

    async fn generate_completion(&self, request: &LlmRequest) -> Result<ProviderCompletion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.clone());
        let outcome = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match outcome {
            None => Ok(self.completion(request, "mock response".to_string())),
            Some(MockOutcome::Success(content)) => Ok(self.completion(request, content)),
            Some(MockOutcome::Failure { message, retryable }) => Err(Error::Provider {
                provider: self.name.clone(),
                model: request.model.clone(),
                message,
                retryable,
            }),
            Some(MockOutcome::Slow(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(self.completion(request, "slow response".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_default_success() {
        let provider = MockProvider::new("mock");
        let request = LlmRequest::new().with_prompt("hello");
        let completion = provider.generate_completion(&request).await.unwrap();
        assert_eq!(completion.content, "mock response");
        assert_eq!(provider.calls(), 1);
        assert!(completion.usage.unwrap().total_tokens > 0);
    }

    #[tokio::test]
    async fn test_mock_scripted_outcomes() {
        let provider = MockProvider::new("mock");
        provider.push_failures(1, true);
        provider.push_outcome(MockOutcome::Success("recovered".to_string()));

        let request = LlmRequest::new().with_prompt("hello");
        assert!(provider.generate_completion(&request).await.is_err());
        let completion = provider.generate_completion(&request).await.unwrap();
        assert_eq!(completion.content, "recovered");
        assert_eq!(provider.calls(), 2);
    }
}
