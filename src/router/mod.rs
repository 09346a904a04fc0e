//! Request routing
//!
//! The router owns the full request path: scrub outgoing text, select the
//! ordered candidate list (enabled providers admitted by circuit and
//! budget state), attempt each candidate under its own timeout/retry
//! policy, record outcomes into the breaker and budget ledgers, and
//! validate the winning response against the caller's schema.

use crate::breaker::{BreakerSnapshot, CircuitBreaker};
use crate::budget::{estimate_cost_cents, BudgetSnapshot, BudgetTracker, TokenUsageRecord};
use crate::completion::{LlmRequest, LlmResponse, ProviderCompletion, TokenUsage};
use crate::config::{ProviderConfig, RouterConfig};
use crate::error::{Error, Result};
use crate::provider::LlmProvider;
use crate::redact::PiiRedactor;
use crate::schema::SchemaValidator;
use crate::util::mask_api_key;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[cfg(test)]
mod tests;

/// Read-only per-provider diagnostic view
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStats {
    /// Whether the provider is enabled in configuration
    pub enabled: bool,
    /// Whether the integration reports itself healthy
    pub healthy: bool,
    /// Masked credential, if one is configured
    pub api_key: Option<String>,
    /// Current budget snapshot
    pub budget: BudgetSnapshot,
    /// Current circuit snapshot
    pub breaker: BreakerSnapshot,
    /// Models the provider can serve
    pub models: Vec<String>,
}

/// A provider eligible to attempt the current request
struct Candidate<'a> {
    id: &'a str,
    config: &'a ProviderConfig,
    provider: Arc<dyn LlmProvider>,
    prompt_tokens: u32,
}

/// The routing/resilience engine
///
/// Constructed once from an already-validated [`RouterConfig`]; the config
/// is immutable afterwards. All dynamic state lives in the budget and
/// breaker ledgers, so concurrent `generate_completion` calls only contend
/// on those, and only per provider.
pub struct LlmRouter {
    config: RouterConfig,
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    redactor: PiiRedactor,
    validator: SchemaValidator,
    breaker: CircuitBreaker,
    budget: BudgetTracker,
}

impl LlmRouter {
    /// Create a router from configuration.
    ///
    /// The config is assumed to have passed [`RouterConfig::validate`];
    /// the only failure here is a malformed custom redaction pattern.
    pub fn new(config: RouterConfig) -> Result<Self> {
        let redactor = PiiRedactor::new(&config.redaction)?;
        let breaker = CircuitBreaker::new(config.breaker.clone());
        let budgets = config
            .providers
            .iter()
            .map(|(id, p)| (id.clone(), p.budget.clone()))
            .collect();
        Ok(Self {
            config,
            providers: HashMap::new(),
            redactor,
            validator: SchemaValidator::new(),
            breaker,
            budget: BudgetTracker::new(budgets),
        })
    }

    /// Register a provider integration under its configured identifier
    pub fn register(&mut self, id: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        let id = id.into();
        debug!(provider = %id, "Registering LLM provider");
        self.providers.insert(id, provider);
    }

    /// Get a registered provider by identifier
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(id).cloned()
    }

    /// The budget ledger, for operational callers
    #[must_use]
    pub fn budget(&self) -> &BudgetTracker {
        &self.budget
    }

    /// The circuit breaker registry, for operational callers
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Route a completion request to the best available provider.
    #[instrument(skip(self, request))]
    pub async fn generate_completion(&self, request: &LlmRequest) -> Result<LlmResponse> {
        if !self.config.enabled {
            return Err(Error::Disabled);
        }
        if !request.has_input() {
            return Err(Error::InvalidRequest(
                "either prompt or messages must be present".to_string(),
            ));
        }

        let request_id = Uuid::new_v4().to_string();
        let redaction_applied = self.redactor.is_enabled();
        let outgoing = self.redact_request(request);

        let candidates = self.candidates(&outgoing).await;
        if candidates.is_empty() {
            warn!(request_id = %request_id, "No available providers for request");
            return Err(Error::NoAvailableProviders);
        }
        debug!(
            request_id = %request_id,
            candidates = ?candidates.iter().map(|c| c.id).collect::<Vec<_>>(),
            "Selected candidate providers"
        );

        let mut last_error: Option<Error> = None;
        for candidate in candidates {
            match self.attempt_candidate(&candidate, &outgoing).await {
                Ok(completion) => {
                    return Ok(self
                        .finish(candidate, completion, request, &request_id, redaction_applied)
                        .await);
                }
                Err(err) => {
                    // One breaker failure per exhausted candidate, not per
                    // low-level retry.
                    self.breaker.record_failure(candidate.id);
                    warn!(
                        provider = %candidate.id,
                        request_id = %request_id,
                        error = %err,
                        "Candidate exhausted, failing over"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(Error::AllProvidersFailed {
            request_id,
            last: Box::new(last_error.unwrap_or(Error::NoAvailableProviders)),
        })
    }

    /// Diagnostic snapshot of every configured provider.
    ///
    /// Read-only; the routing algorithm does not consult it.
    pub async fn provider_stats(&self) -> HashMap<String, ProviderStats> {
        let mut stats = HashMap::new();
        for (id, config) in &self.config.providers {
            let provider = self.providers.get(id);
            let models = provider
                .map(|p| p.supported_models())
                .unwrap_or_else(|| config.models.clone());
            stats.insert(
                id.clone(),
                ProviderStats {
                    enabled: config.enabled,
                    healthy: provider.is_some_and(|p| p.is_healthy()),
                    api_key: config.api_key.as_deref().map(mask_api_key),
                    budget: self.budget.snapshot(id).await,
                    breaker: self.breaker.snapshot(id),
                    models,
                },
            );
        }
        stats
    }

    /// Produce the outgoing request, with prompt and message contents
    /// scrubbed. The caller's request is never mutated.
    fn redact_request(&self, request: &LlmRequest) -> LlmRequest {
        if !self.redactor.is_enabled() {
            return request.clone();
        }
        let mut outgoing = request.clone();
        if let Some(prompt) = &mut outgoing.prompt {
            *prompt = self.redactor.redact(prompt);
        }
        for message in &mut outgoing.messages {
            message.content = self.redactor.redact(&message.content);
        }
        outgoing
    }

    /// Build the ordered candidate list for `request`.
    ///
    /// A provider qualifies when it is enabled and registered, its circuit
    /// admits an attempt, and its budget admits the estimated cost.
    /// Ordering is ascending priority, ties broken by identifier.
    async fn candidates<'a>(&'a self, request: &LlmRequest) -> Vec<Candidate<'a>> {
        let text = request.combined_text();
        let mut candidates = Vec::new();

        for (id, config) in &self.config.providers {
            if !config.enabled {
                continue;
            }
            let Some(provider) = self.providers.get(id) else {
                warn!(provider = %id, "Provider enabled but not registered, skipping");
                continue;
            };
            if !self.breaker.can_execute(id) {
                debug!(provider = %id, "Skipping provider: circuit open");
                continue;
            }
            let prompt_tokens = provider.estimate_tokens(&text);
            let estimated_cost =
                estimate_cost_cents(prompt_tokens, config.budget.token_cost_per_k_cents);
            if !self.budget.check_budget(id, estimated_cost).await {
                debug!(provider = %id, estimated_cost, "Skipping provider: over budget");
                continue;
            }
            candidates.push(Candidate {
                id,
                config,
                provider: Arc::clone(provider),
                prompt_tokens,
            });
        }

        candidates.sort_by(|a, b| {
            a.config
                .priority
                .cmp(&b.config.priority)
                .then_with(|| a.id.cmp(b.id))
        });
        candidates
    }

    /// Run one candidate's bounded retry loop.
    ///
    /// Each attempt runs under the provider's configured timeout. A
    /// non-retryable provider error ends the loop early; the error of the
    /// final attempt is returned either way.
    async fn attempt_candidate(
        &self,
        candidate: &Candidate<'_>,
        request: &LlmRequest,
    ) -> Result<ProviderCompletion> {
        let attempts = candidate.config.retry_attempts.max(1);
        let timeout = Duration::from_millis(candidate.config.timeout_ms);
        let mut last_error = Error::NoAvailableProviders;

        for attempt in 1..=attempts {
            let call = candidate.provider.generate_completion(request);
            match tokio::time::timeout(timeout, call).await {
                Ok(Ok(completion)) => return Ok(completion),
                Ok(Err(err)) => {
                    debug!(
                        provider = %candidate.id,
                        attempt,
                        attempts,
                        error = %err,
                        "Provider attempt failed"
                    );
                    let retryable = err.is_retryable();
                    last_error = err;
                    if !retryable {
                        break;
                    }
                }
                Err(_) => {
                    debug!(
                        provider = %candidate.id,
                        attempt,
                        attempts,
                        timeout_ms = candidate.config.timeout_ms,
                        "Provider attempt timed out"
                    );
                    last_error = Error::Timeout {
                        provider: candidate.id.to_string(),
                        timeout_ms: candidate.config.timeout_ms,
                    };
                }
            }
        }

        Err(last_error)
    }

    /// Record a successful attempt and assemble the final response.
    async fn finish(
        &self,
        candidate: Candidate<'_>,
        completion: ProviderCompletion,
        request: &LlmRequest,
        request_id: &str,
        redaction_applied: bool,
    ) -> LlmResponse {
        // Fall back to client-side estimates when the vendor reports no
        // usage, so the ledger never silently under-counts.
        let usage = completion.usage.unwrap_or_else(|| {
            TokenUsage::new(
                candidate.prompt_tokens,
                candidate.provider.estimate_tokens(&completion.content),
            )
        });
        let cost_cents =
            estimate_cost_cents(usage.total_tokens, candidate.config.budget.token_cost_per_k_cents);

        self.budget
            .record_usage(TokenUsageRecord {
                provider: candidate.id.to_string(),
                model: completion.model.clone(),
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                cost_cents,
                timestamp: Utc::now(),
                request_id: request_id.to_string(),
            })
            .await;
        self.breaker.record_success(candidate.id);

        // A schema mismatch on an otherwise-successful call is surfaced on
        // the response, not treated as a failover trigger.
        let (schema_validated, validation_errors) = match &request.response_schema {
            Some(schema) => {
                let outcome = self.validator.validate_response(&completion.content, Some(schema));
                if !outcome.valid {
                    warn!(
                        provider = %candidate.id,
                        request_id = %request_id,
                        errors = ?outcome.errors,
                        "Response failed schema validation"
                    );
                }
                (outcome.valid, outcome.errors)
            }
            None => (false, Vec::new()),
        };

        info!(
            provider = %candidate.id,
            model = %completion.model,
            request_id = %request_id,
            tokens = usage.total_tokens,
            cost_cents,
            "Completion served"
        );

        LlmResponse {
            content: completion.content,
            usage,
            provider: candidate.id.to_string(),
            model: completion.model,
            request_id: request_id.to_string(),
            finish_reason: completion.finish_reason,
            redaction_applied,
            schema_validated,
            validation_errors,
        }
    }
}
