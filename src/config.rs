//! Configuration types for the routing layer
//!
//! The full `RouterConfig` is supplied once at construction and treated as
//! immutable afterwards; all dynamic state (budget ledgers, circuit state)
//! lives in separate trackers keyed by provider identifier.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Budget
// ============================================================================

/// Spending ceilings and pricing for a single provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Rolling daily cost ceiling, in cents
    pub daily_limit_cents: u64,
    /// Per-request cost ceiling, in cents
    pub per_request_limit_cents: u64,
    /// Cost per 1000 tokens, in cents
    pub token_cost_per_k_cents: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit_cents: 10_000,
            per_request_limit_cents: 100,
            token_cost_per_k_cents: 0.2,
        }
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Configuration for a single provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Whether the provider may serve requests
    pub enabled: bool,
    /// API key; required when enabled unless `local`
    pub api_key: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
    /// Models this provider may be asked for; non-empty when enabled
    #[serde(default)]
    pub models: Vec<String>,
    /// Spending ceilings and pricing
    #[serde(default)]
    pub budget: BudgetConfig,
    /// Priority rank; lower values are tried first
    pub priority: u32,
    /// Attempts against this provider before failing over
    pub retry_attempts: u32,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Local/offline provider, exempt from the credential requirement
    #[serde(default)]
    pub local: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: None,
            models: Vec::new(),
            budget: BudgetConfig::default(),
            priority: 100,
            retry_attempts: 1,
            timeout_ms: 60_000,
            local: false,
        }
    }
}

// ============================================================================
// Circuit breaker
// ============================================================================

/// Global circuit-breaker thresholds, applied per provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// How long an open circuit waits before admitting a probe, in milliseconds
    pub reset_timeout_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
        }
    }
}

// ============================================================================
// Redaction
// ============================================================================

/// A caller-supplied redaction rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRule {
    /// Rule name, for diagnostics
    pub name: String,
    /// Regular expression to match
    pub pattern: String,
    /// Fixed replacement text
    pub replacement: String,
}

/// PII redaction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionSettings {
    /// Whether redaction runs at all
    pub enabled: bool,
    /// Built-in pattern names to apply (empty = all built-ins)
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Additional caller-supplied rules
    #[serde(default)]
    pub custom_rules: Vec<CustomRule>,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            patterns: Vec::new(),
            custom_rules: Vec::new(),
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Top-level router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Global enable switch
    pub enabled: bool,
    /// Provider identifier -> configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Circuit-breaker thresholds shared by every provider
    #[serde(default)]
    pub breaker: BreakerSettings,
    /// PII redaction settings
    #[serde(default)]
    pub redaction: RedactionSettings,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: HashMap::new(),
            breaker: BreakerSettings::default(),
            redaction: RedactionSettings::default(),
        }
    }
}

impl RouterConfig {
    /// Validate the configuration before constructing a router.
    ///
    /// Returns one human-readable message per violated invariant; an empty
    /// vec means the configuration passed. The router itself assumes a
    /// config that has already passed this check.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, provider) in &self.providers {
            if !provider.enabled {
                continue;
            }
            if provider.models.is_empty() {
                errors.push(format!("provider '{id}': enabled but no models configured"));
            }
            if !provider.local && provider.api_key.as_deref().unwrap_or("").is_empty() {
                errors.push(format!("provider '{id}': enabled but no api key configured"));
            }
            if provider.timeout_ms == 0 {
                errors.push(format!("provider '{id}': timeout must be positive"));
            }
            if provider.budget.daily_limit_cents == 0 {
                errors.push(format!("provider '{id}': daily budget must be positive"));
            }
            if provider.budget.per_request_limit_cents == 0 {
                errors.push(format!(
                    "provider '{id}': per-request budget must be positive"
                ));
            }
        }

        if self.breaker.failure_threshold == 0 {
            errors.push("circuit breaker failure threshold must be positive".to_string());
        }
        if self.breaker.reset_timeout_ms == 0 {
            errors.push("circuit breaker reset timeout must be positive".to_string());
        }

        errors
    }
}
