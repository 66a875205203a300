//! Fixtures shared by unit tests

use crate::models::{
    CostEstimate, DailyUsage, ModelCost, ModelUsage, UsageSnapshot, WeeklyUsage, WindowUsage,
};

/// A well-formed snapshot for Monday 2025-03-10 with two models
pub(crate) fn snapshot() -> UsageSnapshot {
    UsageSnapshot {
        window: WindowUsage {
            total_input_tokens: 12_000,
            total_output_tokens: 48_000,
            total_cache_read_tokens: 300_000,
            total_cache_creation_tokens: 20_000,
            message_count: 42,
            session_count: 3,
            window_start: "2025-03-10T07:00:00Z".to_string(),
            window_end: "2025-03-10T12:00:00Z".to_string(),
        },
        weekly: WeeklyUsage {
            total_input_tokens: 12_000,
            total_output_tokens: 48_000,
            total_cache_read_tokens: 300_000,
            total_cache_creation_tokens: 20_000,
            message_count: 42,
            session_count: 3,
            daily_breakdown: vec![DailyUsage {
                date: "2025-03-10".to_string(),
                input_tokens: 12_000,
                output_tokens: 48_000,
                message_count: 42,
            }],
        },
        models: vec![
            ModelUsage {
                model: "claude-opus-4-1".to_string(),
                display_name: "Opus 4.1".to_string(),
                input_tokens: 2_000,
                output_tokens: 8_000,
                cache_read_tokens: 100_000,
                cache_creation_tokens: 5_000,
                message_count: 10,
            },
            ModelUsage {
                model: "claude-sonnet-4-5".to_string(),
                display_name: "Sonnet 4.5".to_string(),
                input_tokens: 10_000,
                output_tokens: 40_000,
                cache_read_tokens: 200_000,
                cache_creation_tokens: 15_000,
                message_count: 32,
            },
        ],
        cost_estimate: CostEstimate {
            window_cost_usd: 1.25,
            weekly_cost_usd: 1.25,
            by_model: vec![
                ModelCost {
                    model: "claude-opus-4-1".to_string(),
                    display_name: "Opus 4.1".to_string(),
                    cost_usd: 0.75,
                },
                ModelCost {
                    model: "claude-sonnet-4-5".to_string(),
                    display_name: "Sonnet 4.5".to_string(),
                    cost_usd: 0.5,
                },
            ],
        },
        last_updated: "2025-03-10T12:00:00Z".to_string(),
    }
}
