//! Budget tracking
//!
//! Maintains a rolling daily ledger of token usage per provider and
//! enforces a per-request ceiling plus a daily ceiling, both in cents.
//! The ledger is keyed by the Utc calendar day and clears implicitly when
//! the day boundary is crossed.

use crate::config::BudgetConfig;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[cfg(test)]
mod tests;

/// A single immutable usage record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsageRecord {
    /// Provider that served the request
    pub provider: String,
    /// Model that served the request
    pub model: String,
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
    /// Cost of the request, in cents
    pub cost_cents: u64,
    /// When the usage occurred
    pub timestamp: DateTime<Utc>,
    /// Request identifier
    pub request_id: String,
}

/// Aggregates over one provider's current-day ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    /// Requests recorded today
    pub request_count: u64,
    /// Prompt tokens today
    pub prompt_tokens: u64,
    /// Completion tokens today
    pub completion_tokens: u64,
    /// Total tokens today
    pub total_tokens: u64,
    /// Cost today, in cents
    pub cost_cents: u64,
}

/// Read-only budget view for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct BudgetSnapshot {
    /// Configured daily ceiling, in cents
    pub daily_limit_cents: u64,
    /// Configured per-request ceiling, in cents
    pub per_request_limit_cents: u64,
    /// Cost accumulated today, in cents
    pub daily_cost_cents: u64,
    /// Remaining budget today, in cents (never negative)
    pub remaining_cents: u64,
    /// Tokens accumulated today
    pub daily_tokens: u64,
    /// Requests recorded today
    pub request_count: u64,
}

/// One provider's current-day ledger
#[derive(Debug, Default)]
struct ProviderLedger {
    day: Option<NaiveDate>,
    records: Vec<TokenUsageRecord>,
    cost_cents: u64,
    tokens: u64,
}

impl ProviderLedger {
    /// Clear aggregates when the calendar day has rolled over.
    fn roll(&mut self, today: NaiveDate) {
        if self.day != Some(today) {
            self.day = Some(today);
            self.records.clear();
            self.cost_cents = 0;
            self.tokens = 0;
        }
    }
}

/// Estimated cost in cents for a token count at a per-1K rate.
///
/// Rounded up so an estimate never under-admits against a ceiling.
#[must_use]
pub fn estimate_cost_cents(tokens: u32, token_cost_per_k_cents: f64) -> u64 {
    (f64::from(tokens) / 1000.0 * token_cost_per_k_cents).ceil() as u64
}

/// Per-provider cost/token ledger enforcing spending ceilings
#[derive(Debug)]
pub struct BudgetTracker {
    budgets: HashMap<String, BudgetConfig>,
    ledgers: RwLock<HashMap<String, ProviderLedger>>,
}

impl BudgetTracker {
    /// Create a tracker for the given provider budgets.
    ///
    /// Providers absent from the map are unknown and never admitted.
    #[must_use]
    pub fn new(budgets: HashMap<String, BudgetConfig>) -> Self {
        Self {
            budgets,
            ledgers: RwLock::new(HashMap::new()),
        }
    }

    /// Budget configured for `provider`, if known
    #[must_use]
    pub fn budget(&self, provider: &str) -> Option<&BudgetConfig> {
        self.budgets.get(provider)
    }

    /// Whether `provider` may serve a request estimated at
    /// `estimated_cost_cents`.
    ///
    /// False for unknown providers, when the estimate exceeds the
    /// per-request ceiling, or when it would push today's cost over the
    /// daily ceiling.
    pub async fn check_budget(&self, provider: &str, estimated_cost_cents: u64) -> bool {
        let Some(budget) = self.budgets.get(provider) else {
            return false;
        };
        if estimated_cost_cents > budget.per_request_limit_cents {
            debug!(
                provider = %provider,
                estimated_cost_cents,
                limit = budget.per_request_limit_cents,
                "Request denied: exceeds per-request budget"
            );
            return false;
        }

        let today = Utc::now().date_naive();
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers.entry(provider.to_string()).or_default();
        ledger.roll(today);

        if ledger.cost_cents + estimated_cost_cents > budget.daily_limit_cents {
            debug!(
                provider = %provider,
                daily_cost = ledger.cost_cents,
                estimated_cost_cents,
                limit = budget.daily_limit_cents,
                "Request denied: would exceed daily budget"
            );
            return false;
        }
        true
    }

    /// Append a usage record to its provider's ledger.
    ///
    /// This is the only way ledger aggregates change; it must be called
    /// exactly once per billable success. A record whose request id is
    /// already present today is ignored.
    pub async fn record_usage(&self, record: TokenUsageRecord) {
        let today = Utc::now().date_naive();
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers.entry(record.provider.clone()).or_default();
        ledger.roll(today);

        if ledger
            .records
            .iter()
            .any(|r| r.request_id == record.request_id)
        {
            warn!(
                provider = %record.provider,
                request_id = %record.request_id,
                "Duplicate usage record ignored"
            );
            return;
        }

        ledger.cost_cents += record.cost_cents;
        ledger.tokens += u64::from(record.total_tokens);
        ledger.records.push(record);
    }

    /// Cost accumulated today for `provider`, in cents
    pub async fn daily_cost(&self, provider: &str) -> u64 {
        self.read_ledger(provider, |l| l.cost_cents).await
    }

    /// Tokens accumulated today for `provider`
    pub async fn daily_tokens(&self, provider: &str) -> u64 {
        self.read_ledger(provider, |l| l.tokens).await
    }

    /// Remaining daily budget for `provider`, in cents.
    ///
    /// Saturates at 0: an over-admission race never reports negative.
    pub async fn remaining_budget(&self, provider: &str) -> u64 {
        let Some(budget) = self.budgets.get(provider) else {
            return 0;
        };
        let spent = self.daily_cost(provider).await;
        budget.daily_limit_cents.saturating_sub(spent)
    }

    /// Aggregates over today's ledger for `provider`
    pub async fn usage_stats(&self, provider: &str) -> UsageStats {
        self.read_ledger(provider, |ledger| {
            let mut stats = UsageStats {
                request_count: ledger.records.len() as u64,
                cost_cents: ledger.cost_cents,
                total_tokens: ledger.tokens,
                ..Default::default()
            };
            for record in &ledger.records {
                stats.prompt_tokens += u64::from(record.prompt_tokens);
                stats.completion_tokens += u64::from(record.completion_tokens);
            }
            stats
        })
        .await
    }

    /// Diagnostic snapshot for `provider`
    pub async fn snapshot(&self, provider: &str) -> BudgetSnapshot {
        let budget = self.budgets.get(provider).cloned().unwrap_or(BudgetConfig {
            daily_limit_cents: 0,
            per_request_limit_cents: 0,
            token_cost_per_k_cents: 0.0,
        });
        let stats = self.usage_stats(provider).await;
        BudgetSnapshot {
            daily_limit_cents: budget.daily_limit_cents,
            per_request_limit_cents: budget.per_request_limit_cents,
            daily_cost_cents: stats.cost_cents,
            remaining_cents: budget.daily_limit_cents.saturating_sub(stats.cost_cents),
            daily_tokens: stats.total_tokens,
            request_count: stats.request_count,
        }
    }

    async fn read_ledger<T: Default>(
        &self,
        provider: &str,
        f: impl FnOnce(&ProviderLedger) -> T,
    ) -> T {
        let today = Utc::now().date_naive();
        let ledgers = self.ledgers.read().await;
        match ledgers.get(provider) {
            // Stale ledger from a previous day reads as empty.
            Some(ledger) if ledger.day == Some(today) => f(ledger),
            _ => T::default(),
        }
    }
}
