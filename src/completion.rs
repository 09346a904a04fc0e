//! Completion request and response types

use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Token usage information
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Create a usage breakdown from prompt/completion counts
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Why the provider stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the max-token ceiling
    Length,
    /// Vendor content filter intervened
    ContentFilter,
    /// Generation ended in an error
    Error,
}

/// A single logical completion request
///
/// Either `prompt` or a non-empty `messages` sequence must be present;
/// the router rejects a request carrying neither.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Free-text prompt
    pub prompt: Option<String>,
    /// Structured conversation messages
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Target model override
    pub model: Option<String>,
    /// Structural schema the response content must conform to
    pub response_schema: Option<serde_json::Value>,
    /// System-prompt override
    pub system: Option<String>,
}

impl LlmRequest {
    /// Create an empty request
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the free-text prompt
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Add a message
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the target model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the response schema
    #[must_use]
    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Concatenated text of prompt and message contents, for token estimation
    #[must_use]
    pub fn combined_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(system) = &self.system {
            parts.push(system);
        }
        if let Some(prompt) = &self.prompt {
            parts.push(prompt);
        }
        for message in &self.messages {
            parts.push(&message.content);
        }
        parts.join("\n")
    }

    /// Whether the request carries any input at all
    #[must_use]
    pub fn has_input(&self) -> bool {
        self.prompt.is_some() || !self.messages.is_empty()
    }
}

/// What a provider integration returns for one attempt
///
/// The router layers request identity, redaction and validation flags on
/// top of this to build the final [`LlmResponse`].
#[derive(Debug, Clone)]
pub struct ProviderCompletion {
    /// Generated content
    pub content: String,
    /// Token usage as reported by the vendor, if any
    pub usage: Option<TokenUsage>,
    /// Model that actually served the request
    pub model: String,
    /// Why generation stopped
    pub finish_reason: FinishReason,
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated content
    pub content: String,
    /// Token usage breakdown
    pub usage: TokenUsage,
    /// Provider that served the request
    pub provider: String,
    /// Model that served the request
    pub model: String,
    /// Request identifier
    pub request_id: String,
    /// Why generation stopped
    pub finish_reason: FinishReason,
    /// Whether PII redaction ran over the outgoing request
    pub redaction_applied: bool,
    /// Whether the content passed schema validation
    ///
    /// `false` both when no schema was supplied and when validation failed;
    /// a failure additionally populates `validation_errors`.
    pub schema_validated: bool,
    /// Field-qualified validation failures, empty on success
    #[serde(default)]
    pub validation_errors: Vec<String>,
}
