//! Tests for the router

use super::*;
use crate::config::{BreakerSettings, BudgetConfig};
use crate::mock::{MockOutcome, MockProvider};

fn provider_config(priority: u32) -> ProviderConfig {
    ProviderConfig {
        enabled: true,
        api_key: Some("sk-test-1234567890".to_string()),
        base_url: None,
        models: vec!["mock-model".to_string()],
        budget: BudgetConfig {
            daily_limit_cents: 10_000,
            per_request_limit_cents: 1_000,
            token_cost_per_k_cents: 0.2,
        },
        priority,
        retry_attempts: 1,
        timeout_ms: 1_000,
        local: false,
    }
}

fn router_with(providers: Vec<(&str, ProviderConfig)>) -> (LlmRouter, Vec<Arc<MockProvider>>) {
    let mut config = RouterConfig::default();
    for (id, provider_config) in &providers {
        config
            .providers
            .insert((*id).to_string(), provider_config.clone());
    }
    assert!(config.validate().is_empty());

    let mut router = LlmRouter::new(config).unwrap();
    let mut mocks = Vec::new();
    for (id, _) in providers {
        let mock = Arc::new(MockProvider::new(id));
        router.register(id, Arc::clone(&mock) as Arc<dyn LlmProvider>);
        mocks.push(mock);
    }
    (router, mocks)
}

fn request() -> LlmRequest {
    LlmRequest::new().with_prompt("please summarize the quarterly report")
}

#[tokio::test]
async fn test_disabled_router_rejects() {
    let (mut router, _mocks) = router_with(vec![("alpha", provider_config(1))]);
    router.config.enabled = false;

    let err = router.generate_completion(&request()).await.unwrap_err();
    assert_eq!(err.code(), "disabled");
}

#[tokio::test]
async fn test_request_without_input_rejected() {
    let (router, mocks) = router_with(vec![("alpha", provider_config(1))]);
    let err = router
        .generate_completion(&LlmRequest::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_request");
    assert_eq!(mocks[0].calls(), 0);
}

#[tokio::test]
async fn test_no_enabled_providers_is_terminal() {
    let mut disabled = provider_config(1);
    disabled.enabled = false;
    let (router, mocks) = router_with(vec![("alpha", disabled)]);

    let err = router.generate_completion(&request()).await.unwrap_err();
    assert_eq!(err.to_string(), "No available providers for request");
    assert_eq!(mocks[0].calls(), 0);
}

#[tokio::test]
async fn test_single_provider_success() {
    let (router, mocks) = router_with(vec![("alpha", provider_config(1))]);

    let response = router.generate_completion(&request()).await.unwrap();
    assert_eq!(response.provider, "alpha");
    assert_eq!(response.content, "mock response");
    assert!(!response.request_id.is_empty());
    assert!(response.redaction_applied);
    assert!(!response.schema_validated);
    assert!(response.validation_errors.is_empty());
    assert!(response.usage.total_tokens > 0);

    // Success was recorded into both ledgers.
    assert!(router.budget().daily_cost("alpha").await <= 1);
    assert_eq!(router.budget().usage_stats("alpha").await.request_count, 1);
    assert_eq!(router.breaker().failure_count("alpha"), 0);
}

#[tokio::test]
async fn test_over_per_request_budget_never_invokes_provider() {
    let mut config = provider_config(1);
    // A handful of prompt tokens at 1000 cents per 1K estimates above a
    // 1-cent per-request ceiling.
    config.budget.per_request_limit_cents = 1;
    config.budget.token_cost_per_k_cents = 1_000.0;
    let (router, mocks) = router_with(vec![("alpha", config)]);

    let err = router.generate_completion(&request()).await.unwrap_err();
    assert_eq!(err.to_string(), "No available providers for request");
    assert_eq!(mocks[0].calls(), 0);
}

#[tokio::test]
async fn test_daily_budget_exhaustion_denies_next_request() {
    let mut config = provider_config(1);
    config.budget.per_request_limit_cents = 1_000;
    config.budget.daily_limit_cents = 120;
    config.budget.token_cost_per_k_cents = 25_000.0;
    let (router, mocks) = router_with(vec![("alpha", config)]);

    let short = LlmRequest::new().with_prompt("hello world");
    router.generate_completion(&short).await.unwrap();
    assert_eq!(mocks[0].calls(), 1);

    // The recorded cost pushed the ledger near the daily ceiling; the next
    // estimate no longer fits.
    let err = router.generate_completion(&short).await.unwrap_err();
    assert_eq!(err.code(), "no_available_providers");
    assert_eq!(mocks[0].calls(), 1);
}

#[tokio::test]
async fn test_priority_ordering() {
    let (router, mocks) = router_with(vec![
        ("beta", provider_config(2)),
        ("alpha", provider_config(1)),
    ]);

    let response = router.generate_completion(&request()).await.unwrap();
    assert_eq!(response.provider, "alpha");
    assert_eq!(mocks[0].calls(), 0); // beta
    assert_eq!(mocks[1].calls(), 1); // alpha
}

#[tokio::test]
async fn test_priority_tie_broken_by_identifier() {
    let (router, _mocks) = router_with(vec![
        ("zeta", provider_config(1)),
        ("alpha", provider_config(1)),
    ]);
    let response = router.generate_completion(&request()).await.unwrap();
    assert_eq!(response.provider, "alpha");
}

#[tokio::test]
async fn test_failover_to_next_candidate() {
    let (router, mocks) = router_with(vec![
        ("alpha", provider_config(1)),
        ("beta", provider_config(2)),
    ]);
    mocks[0].push_failures(1, true);

    let response = router.generate_completion(&request()).await.unwrap();
    assert_eq!(response.provider, "beta");
    assert_eq!(mocks[0].calls(), 1);
    assert_eq!(router.breaker().failure_count("alpha"), 1);
    assert_eq!(router.breaker().failure_count("beta"), 0);
}

#[tokio::test]
async fn test_retry_within_candidate_before_failover() {
    let mut config = provider_config(1);
    config.retry_attempts = 3;
    let (router, mocks) = router_with(vec![("alpha", config)]);
    mocks[0].push_failures(2, true);

    let response = router.generate_completion(&request()).await.unwrap();
    assert_eq!(response.provider, "alpha");
    assert_eq!(mocks[0].calls(), 3);
    // The candidate ultimately succeeded: no breaker failure recorded.
    assert_eq!(router.breaker().failure_count("alpha"), 0);
}

#[tokio::test]
async fn test_non_retryable_error_skips_remaining_retries() {
    let mut alpha = provider_config(1);
    alpha.retry_attempts = 3;
    let (router, mocks) = router_with(vec![("alpha", alpha), ("beta", provider_config(2))]);
    mocks[0].push_failures(1, false);

    let response = router.generate_completion(&request()).await.unwrap();
    assert_eq!(response.provider, "beta");
    assert_eq!(mocks[0].calls(), 1);
    assert_eq!(router.breaker().failure_count("alpha"), 1);
}

#[tokio::test]
async fn test_timeout_is_a_retryable_failure() {
    let mut alpha = provider_config(1);
    alpha.timeout_ms = 40;
    let (router, mocks) = router_with(vec![("alpha", alpha), ("beta", provider_config(2))]);
    mocks[0].push_outcome(MockOutcome::Slow(Duration::from_millis(300)));

    let response = router.generate_completion(&request()).await.unwrap();
    assert_eq!(response.provider, "beta");
    assert_eq!(router.breaker().failure_count("alpha"), 1);
}

#[tokio::test]
async fn test_all_candidates_failing_aggregates_last_error() {
    let (router, mocks) = router_with(vec![
        ("alpha", provider_config(1)),
        ("beta", provider_config(2)),
    ]);
    mocks[0].push_failures(1, true);
    mocks[1].push_failures(1, true);

    let err = router.generate_completion(&request()).await.unwrap_err();
    assert_eq!(err.code(), "all_providers_failed");
    assert_eq!(err.provider(), Some("beta"));
    // The aggregate carries the generated request id for correlation.
    assert!(!err.request_id().unwrap().is_empty());
}

#[tokio::test]
async fn test_open_circuit_skips_provider_entirely() {
    let mut config = RouterConfig {
        breaker: BreakerSettings {
            failure_threshold: 3,
            reset_timeout_ms: 60_000,
        },
        ..Default::default()
    };
    config.providers.insert("alpha".into(), provider_config(1));
    config.providers.insert("beta".into(), provider_config(2));

    let mut router = LlmRouter::new(config).unwrap();
    let alpha = Arc::new(MockProvider::new("alpha"));
    let beta = Arc::new(MockProvider::new("beta"));
    router.register("alpha", Arc::clone(&alpha) as Arc<dyn LlmProvider>);
    router.register("beta", Arc::clone(&beta) as Arc<dyn LlmProvider>);
    alpha.push_failures(10, true);

    // Three requests: alpha fails each time, beta serves.
    for _ in 0..3 {
        let response = router.generate_completion(&request()).await.unwrap();
        assert_eq!(response.provider, "beta");
    }
    assert_eq!(alpha.calls(), 3);
    assert_eq!(router.breaker().state("alpha"), crate::breaker::CircuitState::Open);

    // Fourth request inside the reset window: alpha is skipped entirely.
    let response = router.generate_completion(&request()).await.unwrap();
    assert_eq!(response.provider, "beta");
    assert_eq!(alpha.calls(), 3);
}

#[tokio::test]
async fn test_request_is_redacted_before_send() {
    let (router, mocks) = router_with(vec![("alpha", provider_config(1))]);

    let sensitive = LlmRequest::new()
        .with_prompt("Contact john.doe@example.com")
        .with_message(crate::message::Message::user("SSN 123-45-6789"));
    let response = router.generate_completion(&sensitive).await.unwrap();
    assert!(response.redaction_applied);

    let seen = mocks[0].last_request().unwrap();
    assert_eq!(seen.prompt.as_deref(), Some("Contact [EMAIL-REDACTED]"));
    assert_eq!(seen.messages[0].content, "SSN [SSN-REDACTED]");
    // The caller's request is untouched.
    assert_eq!(
        sensitive.prompt.as_deref(),
        Some("Contact john.doe@example.com")
    );
}

#[tokio::test]
async fn test_schema_validation_flagged_on_response() {
    let (router, mocks) = router_with(vec![("alpha", provider_config(1))]);
    let valid_narrative = serde_json::json!({
        "summary": "assessment is high",
        "key_points": ["comps lower"],
        "confidence": "0.8"
    })
    .to_string();
    mocks[0].push_outcome(MockOutcome::Success(valid_narrative));
    mocks[0].push_outcome(MockOutcome::Success("not json {".to_string()));

    let schemad = request().with_response_schema(crate::schema::narrative_schema());
    let response = router.generate_completion(&schemad).await.unwrap();
    assert!(response.schema_validated);
    assert!(response.validation_errors.is_empty());

    // Malformed content does not trigger failover; it comes back flagged.
    let response = router.generate_completion(&schemad).await.unwrap();
    assert!(!response.schema_validated);
    assert_eq!(response.validation_errors, vec!["Invalid JSON format"]);
    assert_eq!(mocks[0].calls(), 2);
    assert_eq!(router.breaker().failure_count("alpha"), 0);
}

#[tokio::test]
async fn test_provider_stats_snapshot() {
    let mut disabled = provider_config(3);
    disabled.enabled = false;

    // One registered provider and one configured-but-unregistered one.
    let mut config = RouterConfig::default();
    config.providers.insert("alpha".into(), provider_config(1));
    config.providers.insert("ghost".into(), disabled);
    let mut router = LlmRouter::new(config).unwrap();
    let alpha = Arc::new(MockProvider::new("alpha"));
    router.register("alpha", Arc::clone(&alpha) as Arc<dyn LlmProvider>);

    let stats = router.provider_stats().await;
    assert_eq!(stats.len(), 2);

    let alpha_stats = &stats["alpha"];
    assert!(alpha_stats.enabled);
    assert!(alpha_stats.healthy);
    assert_eq!(alpha_stats.models, vec!["mock-model".to_string()]);
    assert_eq!(alpha_stats.api_key.as_deref(), Some("sk-t...7890"));
    assert_eq!(alpha_stats.budget.daily_cost_cents, 0);

    let ghost_stats = &stats["ghost"];
    assert!(!ghost_stats.enabled);
    assert!(!ghost_stats.healthy);
}

#[tokio::test]
async fn test_unregistered_provider_not_a_candidate() {
    let mut config = RouterConfig::default();
    config.providers.insert("alpha".into(), provider_config(1));
    let router = LlmRouter::new(config).unwrap();

    let err = router.generate_completion(&request()).await.unwrap_err();
    assert_eq!(err.code(), "no_available_providers");
}
