//! Provider capability contract
//!
//! The router consumes vendor integrations exclusively through this trait
//! and never inspects their transport details.

use crate::completion::{LlmRequest, ProviderCompletion};
use crate::error::Result;

/// Capability contract for a concrete vendor integration
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (matches its key in the router config)
    fn name(&self) -> &str;

    /// Whether the provider considers itself reachable
    fn is_healthy(&self) -> bool {
        true
    }

    /// Models this provider can serve
    fn supported_models(&self) -> Vec<String>;

    /// Client-side token estimate for `text`
    fn estimate_tokens(&self, text: &str) -> u32 {
        crate::token::count_tokens(text) as u32
    }

    /// Produce a completion for the request.
    ///
    /// Failures carry a retryable/non-retryable tag the router uses to
    /// decide between retry, failover and abort.
    async fn generate_completion(&self, request: &LlmRequest) -> Result<ProviderCompletion>;
}
