//! llm-relay - Resilient LLM provider routing
//!
//! This crate sits between an application and several interchangeable LLM
//! providers and disciplines a single request/response exchange:
//! - Router: provider selection, failover ordering, retry-then-failover
//! - Budget: per-provider daily and per-request cost ceilings
//! - Breaker: per-provider circuit breaker (closed/open/half-open)
//! - Redact: pre-send PII scrubbing with stable placeholders
//! - Schema: post-receive structural validation with a validator cache
//!
//! Concrete vendor integrations are consumed through the [`LlmProvider`]
//! capability trait and live outside this crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod breaker;
pub mod budget;
pub mod completion;
pub mod config;
pub mod error;
pub mod message;
pub mod mock;
pub mod provider;
pub mod redact;
pub mod router;
pub mod schema;
pub mod token;
pub mod util;

pub use breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use budget::{
    estimate_cost_cents, BudgetSnapshot, BudgetTracker, TokenUsageRecord, UsageStats,
};
pub use completion::{FinishReason, LlmRequest, LlmResponse, ProviderCompletion, TokenUsage};
pub use config::{
    BreakerSettings, BudgetConfig, CustomRule, ProviderConfig, RedactionSettings, RouterConfig,
};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use mock::{MockOutcome, MockProvider};
pub use provider::LlmProvider;
pub use redact::PiiRedactor;
pub use router::{LlmRouter, ProviderStats};
pub use schema::{extraction_schema, narrative_schema, packet_schema, SchemaValidator, Validation};
pub use token::{count_message_tokens, count_tokens};
