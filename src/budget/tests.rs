//! Tests for budget tracking

use super::*;

fn tracker(daily: u64, per_request: u64) -> BudgetTracker {
    let mut budgets = HashMap::new();
    budgets.insert(
        "openai".to_string(),
        BudgetConfig {
            daily_limit_cents: daily,
            per_request_limit_cents: per_request,
            token_cost_per_k_cents: 0.2,
        },
    );
    BudgetTracker::new(budgets)
}

fn record(provider: &str, cost_cents: u64, total_tokens: u32, request_id: &str) -> TokenUsageRecord {
    TokenUsageRecord {
        provider: provider.to_string(),
        model: "test-model".to_string(),
        prompt_tokens: total_tokens / 2,
        completion_tokens: total_tokens - total_tokens / 2,
        total_tokens,
        cost_cents,
        timestamp: Utc::now(),
        request_id: request_id.to_string(),
    }
}

#[tokio::test]
async fn test_unknown_provider_denied() {
    let tracker = tracker(1000, 100);
    assert!(!tracker.check_budget("nonexistent", 1).await);
    assert_eq!(tracker.remaining_budget("nonexistent").await, 0);
}

#[tokio::test]
async fn test_per_request_ceiling() {
    let tracker = tracker(10_000, 100);
    assert!(tracker.check_budget("openai", 100).await);
    // Exceeds the per-request ceiling regardless of daily usage.
    assert!(!tracker.check_budget("openai", 101).await);
}

#[tokio::test]
async fn test_daily_ceiling() {
    let tracker = tracker(100, 100);
    tracker.record_usage(record("openai", 80, 400, "r1")).await;

    assert!(tracker.check_budget("openai", 20).await);
    assert!(!tracker.check_budget("openai", 21).await);
}

#[tokio::test]
async fn test_record_usage_is_additive() {
    let tracker = tracker(10_000, 1_000);
    tracker.record_usage(record("openai", 50, 1200, "r1")).await;
    tracker.record_usage(record("openai", 75, 800, "r2")).await;

    assert_eq!(tracker.daily_cost("openai").await, 125);
    assert_eq!(tracker.daily_tokens("openai").await, 2000);

    let stats = tracker.usage_stats("openai").await;
    assert_eq!(stats.request_count, 2);
    assert_eq!(stats.cost_cents, 125);
    assert_eq!(stats.total_tokens, 2000);
    assert_eq!(stats.prompt_tokens + stats.completion_tokens, 2000);
}

#[tokio::test]
async fn test_duplicate_request_id_ignored() {
    let tracker = tracker(10_000, 1_000);
    tracker.record_usage(record("openai", 50, 500, "r1")).await;
    tracker.record_usage(record("openai", 50, 500, "r1")).await;

    assert_eq!(tracker.daily_cost("openai").await, 50);
    assert_eq!(tracker.usage_stats("openai").await.request_count, 1);
}

#[tokio::test]
async fn test_remaining_budget_saturates_at_zero() {
    let tracker = tracker(100, 1_000);
    assert_eq!(tracker.remaining_budget("openai").await, 100);

    tracker.record_usage(record("openai", 100, 500, "r1")).await;
    assert_eq!(tracker.remaining_budget("openai").await, 0);

    // Over-admission beyond the ceiling still reads as exactly zero.
    tracker.record_usage(record("openai", 40, 200, "r2")).await;
    assert_eq!(tracker.remaining_budget("openai").await, 0);
    assert_eq!(tracker.daily_cost("openai").await, 140);
}

#[tokio::test]
async fn test_providers_ledgered_independently() {
    let mut budgets = HashMap::new();
    for id in ["openai", "anthropic"] {
        budgets.insert(
            id.to_string(),
            BudgetConfig {
                daily_limit_cents: 1000,
                per_request_limit_cents: 100,
                token_cost_per_k_cents: 0.2,
            },
        );
    }
    let tracker = BudgetTracker::new(budgets);

    tracker.record_usage(record("openai", 60, 300, "r1")).await;
    assert_eq!(tracker.daily_cost("openai").await, 60);
    assert_eq!(tracker.daily_cost("anthropic").await, 0);
}

#[test]
fn test_estimate_cost_rounds_up() {
    assert_eq!(estimate_cost_cents(1000, 0.2), 1);
    assert_eq!(estimate_cost_cents(5000, 0.2), 1);
    assert_eq!(estimate_cost_cents(5001, 0.2), 2);
    assert_eq!(estimate_cost_cents(0, 0.2), 0);
    // 250K tokens at 20 cents per 1K.
    assert_eq!(estimate_cost_cents(250_000, 20.0), 5000);
}

#[tokio::test]
async fn test_concurrent_admission_and_recording() {
    use std::sync::Arc;

    let tracker = Arc::new(tracker(10_000, 1_000));
    let mut handles = Vec::new();
    for i in 0..20 {
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            if tracker.check_budget("openai", 10).await {
                tracker
                    .record_usage(record("openai", 10, 100, &format!("r{i}")))
                    .await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(tracker.daily_cost("openai").await, 200);
    assert_eq!(tracker.usage_stats("openai").await.request_count, 20);
}
