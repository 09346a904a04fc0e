//! Circuit breaker
//!
//! Per-provider failure-tracking state machine gating whether a call
//! attempt is permitted:
//! - Closed: normal operation, requests pass through
//! - Open: failures reached the threshold, requests are rejected
//! - HalfOpen: reset timeout elapsed, a single probe is admitted
//!
//! Failure accumulation is monotonic while closed: a success in the closed
//! state does not decrement the counter. Only the half-open -> closed
//! transition resets it.

use crate::config::BreakerSettings;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};


/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Failures reached threshold - requests are rejected
    Open,
    /// Testing recovery - a single probe passes through
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Read-only view of one provider's circuit, for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    /// Current state
    pub state: CircuitState,
    /// Consecutive failures recorded
    pub failure_count: u32,
    /// When the last failure was recorded
    pub last_failure: Option<DateTime<Utc>>,
    /// When an open circuit next admits a probe
    pub next_retry: Option<DateTime<Utc>>,
}

/// State for a single provider's circuit
struct ProviderCircuit {
    provider: String,
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    last_failure: AtomicU64,
    next_retry: AtomicU64,
}

impl ProviderCircuit {
    fn new(provider: String) -> Self {
        Self {
            provider,
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            last_failure: AtomicU64::new(0),
            next_retry: AtomicU64::new(0),
        }
    }

    fn state(&self) -> CircuitState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn can_execute(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let next_retry = self.next_retry.load(Ordering::SeqCst);
                if current_timestamp() >= next_retry {
                    self.half_open();
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_failure(&self, threshold: u32, reset_timeout: Duration) {
        let now = current_timestamp();
        self.last_failure.store(now, Ordering::SeqCst);

        match self.state() {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(
                    provider = %self.provider,
                    failures = failures,
                    threshold = threshold,
                    "Circuit breaker failure recorded"
                );
                if failures >= threshold {
                    self.open(reset_timeout);
                }
            }
            CircuitState::HalfOpen => {
                // The probe failed; reopen without re-accumulating the
                // full threshold.
                warn!(
                    provider = %self.provider,
                    "Circuit breaker failure in half-open state, reopening"
                );
                self.failure_count.fetch_add(1, Ordering::SeqCst);
                self.open(reset_timeout);
            }
            CircuitState::Open => {
                // Already open, nothing to transition.
            }
        }
    }

    fn record_success(&self) {
        if self.state() == CircuitState::HalfOpen {
            self.close();
        }
        // A success while closed does not touch the failure count.
    }

    fn open(&self, reset_timeout: Duration) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state != CircuitState::Open {
            info!(
                provider = %self.provider,
                failures = self.failure_count.load(Ordering::SeqCst),
                "Circuit breaker opened"
            );
            *state = CircuitState::Open;
            self.next_retry.store(
                current_timestamp() + reset_timeout.as_millis() as u64,
                Ordering::SeqCst,
            );
        }
    }

    fn half_open(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state == CircuitState::Open {
            info!(provider = %self.provider, "Circuit breaker entering half-open state");
            *state = CircuitState::HalfOpen;
        }
    }

    fn close(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state != CircuitState::Closed {
            info!(provider = %self.provider, "Circuit breaker closed");
            *state = CircuitState::Closed;
            self.failure_count.store(0, Ordering::SeqCst);
        }
    }

    fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state(),
            failure_count: self.failure_count.load(Ordering::SeqCst),
            last_failure: timestamp_to_datetime(self.last_failure.load(Ordering::SeqCst)),
            next_retry: timestamp_to_datetime(self.next_retry.load(Ordering::SeqCst)),
        }
    }
}

/// Per-provider circuit breaker registry
///
/// Thresholds are global; state is independent per provider identifier, so
/// circuits for different providers never interact or block one another.
pub struct CircuitBreaker {
    settings: BreakerSettings,
    circuits: RwLock<HashMap<String, Arc<ProviderCircuit>>>,
}

impl CircuitBreaker {
    /// Create a registry with the given thresholds
    #[must_use]
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            circuits: RwLock::new(HashMap::new()),
        }
    }

    /// Create with default thresholds
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BreakerSettings::default())
    }

    fn circuit(&self, provider: &str) -> Arc<ProviderCircuit> {
        if let Some(circuit) = self
            .circuits
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(provider)
        {
            return Arc::clone(circuit);
        }
        let mut circuits = self.circuits.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            circuits
                .entry(provider.to_string())
                .or_insert_with(|| Arc::new(ProviderCircuit::new(provider.to_string()))),
        )
    }

    /// Whether the circuit admits a call attempt for `provider`.
    ///
    /// An open circuit whose reset timeout has elapsed transitions to
    /// half-open and admits exactly the probing attempt; the caller is
    /// responsible for recording its outcome.
    #[must_use]
    pub fn can_execute(&self, provider: &str) -> bool {
        self.circuit(provider).can_execute()
    }

    /// Record a failed attempt for `provider`
    pub fn record_failure(&self, provider: &str) {
        self.circuit(provider).record_failure(
            self.settings.failure_threshold,
            Duration::from_millis(self.settings.reset_timeout_ms),
        );
    }

    /// Record a successful attempt for `provider`
    pub fn record_success(&self, provider: &str) {
        self.circuit(provider).record_success();
    }

    /// Current state for `provider`
    #[must_use]
    pub fn state(&self, provider: &str) -> CircuitState {
        self.circuit(provider).state()
    }

    /// Consecutive failures recorded for `provider`
    #[must_use]
    pub fn failure_count(&self, provider: &str) -> u32 {
        self.circuit(provider).failure_count.load(Ordering::SeqCst)
    }

    /// Diagnostic snapshot for `provider`
    #[must_use]
    pub fn snapshot(&self, provider: &str) -> BreakerSnapshot {
        self.circuit(provider).snapshot()
    }
}

/// Current timestamp in milliseconds since the epoch
fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn timestamp_to_datetime(millis: u64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}
