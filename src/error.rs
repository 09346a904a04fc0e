//! Error types for llm-relay

use thiserror::Error;

/// Routing error type
#[derive(Debug, Error)]
pub enum Error {
    /// Routing is globally disabled
    #[error("llm routing is disabled")]
    Disabled,

    /// Request is structurally invalid (no prompt and no messages)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error (e.g. a malformed custom redaction pattern)
    #[error("configuration error: {0}")]
    Config(String),

    /// Every provider was filtered out by enablement, circuit or budget state
    #[error("No available providers for request")]
    NoAvailableProviders,

    /// Provider-reported failure
    #[error("provider {provider} error: {message}")]
    Provider {
        /// Provider identifier
        provider: String,
        /// Model the failed call targeted, if known
        model: Option<String>,
        /// Vendor-reported message
        message: String,
        /// Whether the router may retry or fail over
        retryable: bool,
    },

    /// Provider call exceeded its configured timeout
    #[error("provider {provider} timed out after {timeout_ms}ms")]
    Timeout {
        /// Provider identifier
        provider: String,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Every candidate was attempted and failed
    #[error("all providers failed for request {request_id}, last error: {last}")]
    AllProvidersFailed {
        /// Identifier of the request that exhausted every candidate
        request_id: String,
        /// Failure from the last candidate attempted
        last: Box<Error>,
    },
}

impl Error {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Config(_) => "config_error",
            Self::NoAvailableProviders => "no_available_providers",
            Self::Provider { .. } => "provider_error",
            Self::Timeout { .. } => "timeout",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
        }
    }

    /// Whether a failover loop may retry after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Provider { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Provider identifier this error originated from, if any.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Provider { provider, .. } | Self::Timeout { provider, .. } => Some(provider),
            Self::AllProvidersFailed { last, .. } => last.provider(),
            _ => None,
        }
    }

    /// Model the failed call targeted, if any.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::Provider { model, .. } => model.as_deref(),
            Self::AllProvidersFailed { last, .. } => last.model(),
            _ => None,
        }
    }

    /// Identifier of the request this error belongs to, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::AllProvidersFailed { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
