//! Core Data Models
//!
//! This module defines the usage snapshot exchanged with the external producer
//! and every aggregate nested inside it. A snapshot is produced whole, handed
//! over as JSON and never mutated afterwards; consumers share it behind an
//! `Arc` and replace it wholesale on refresh.
//!
//! ## Snapshot Layout
//!
//! - [`UsageSnapshot`] - top-level bundle with its `last_updated` timestamp
//!   - [`WindowUsage`] - totals over the rolling window (default 5 hours)
//!   - [`WeeklyUsage`] - totals since Monday plus a sparse [`DailyUsage`] list
//!   - [`ModelUsage`] - per-model rollups for the window
//!   - [`CostEstimate`] - derived USD figures with a [`ModelCost`] breakdown
//!
//! ## Invariants
//!
//! The producer is trusted, but [`UsageSnapshot::validate`] reports any
//! [`SnapshotIssue`] so the refresh layer can log a warning when a producer
//! drifts from the contract.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timestamp::parse_timestamp;

/// Tolerance used when comparing summed costs
pub const COST_TOLERANCE: f64 = 1e-6;

/// Maximum number of daily entries in a week
pub const DAYS_PER_WEEK: usize = 7;

/// Per-model rollup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model: String,
    pub display_name: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    pub message_count: u64,
}

impl ModelUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_read_tokens)
            .saturating_add(self.cache_creation_tokens)
    }
}

/// Rolling window aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowUsage {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cache_read_tokens: u64,
    pub total_cache_creation_tokens: u64,
    pub message_count: u64,
    pub session_count: u64,
    pub window_start: String,
    pub window_end: String,
}

impl WindowUsage {
    /// Sum of all four token totals, the value a usage meter tracks
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens
            .saturating_add(self.total_output_tokens)
            .saturating_add(self.total_cache_read_tokens)
            .saturating_add(self.total_cache_creation_tokens)
    }

    /// Length of the window, if both bounds parse
    pub fn duration(&self) -> Option<Duration> {
        let start = parse_timestamp(&self.window_start).ok()?;
        let end = parse_timestamp(&self.window_end).ok()?;
        Some(end - start)
    }
}

/// Single day usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
    /// Calendar date, `YYYY-MM-DD`
    pub date: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub message_count: u64,
}

/// Weekly usage with daily breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyUsage {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cache_read_tokens: u64,
    pub total_cache_creation_tokens: u64,
    pub message_count: u64,
    pub session_count: u64,
    /// Days with activity only; idle days are absent rather than zero
    #[serde(default)]
    pub daily_breakdown: Vec<DailyUsage>,
}

impl WeeklyUsage {
    pub fn daily_output_total(&self) -> u64 {
        self.daily_breakdown
            .iter()
            .fold(0u64, |total, d| total.saturating_add(d.output_tokens))
    }

    /// True when the daily breakdown accounts for every output token
    pub fn has_complete_breakdown(&self) -> bool {
        self.daily_output_total() == self.total_output_tokens
    }
}

/// Cost for a single model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCost {
    pub model: String,
    pub display_name: String,
    pub cost_usd: f64,
}

/// Cost estimates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub window_cost_usd: f64,
    pub weekly_cost_usd: f64,
    #[serde(default)]
    pub by_model: Vec<ModelCost>,
}

impl CostEstimate {
    pub fn by_model_total(&self) -> f64 {
        self.by_model.iter().map(|c| c.cost_usd).sum()
    }

    /// Whether the per-model breakdown sums to `total` within [`COST_TOLERANCE`]
    pub fn is_consistent_with(&self, total: f64) -> bool {
        (self.by_model_total() - total).abs() <= COST_TOLERANCE
    }
}

/// Complete usage snapshot as delivered by the producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub window: WindowUsage,
    pub weekly: WeeklyUsage,
    #[serde(default)]
    pub models: Vec<ModelUsage>,
    pub cost_estimate: CostEstimate,
    pub last_updated: String,
}

/// A contract violation found in a snapshot
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotIssue {
    #[error("window_start is after window_end")]
    WindowReversed,

    #[error("window bounds are not valid timestamps")]
    WindowUnparseable,

    #[error("daily breakdown has {0} entries, expected at most 7")]
    TooManyDays(usize),

    #[error("daily output tokens {daily} exceed weekly total {total}")]
    DailyExceedsWeekly { daily: u64, total: u64 },

    #[error("{0} is negative or not a number")]
    InvalidCost(&'static str),

    #[error("per-model costs sum to {by_model:.6}, matching neither window nor weekly cost")]
    CostMismatch { by_model: f64 },
}

impl UsageSnapshot {
    /// Check the snapshot against the data-model invariants.
    ///
    /// Returns every violation found; an empty list means the snapshot is
    /// well-formed.
    pub fn validate(&self) -> Vec<SnapshotIssue> {
        let mut issues = Vec::new();

        match self.window.duration() {
            Some(d) if d < Duration::zero() => issues.push(SnapshotIssue::WindowReversed),
            Some(_) => {}
            None => issues.push(SnapshotIssue::WindowUnparseable),
        }

        let days = self.weekly.daily_breakdown.len();
        if days > DAYS_PER_WEEK {
            issues.push(SnapshotIssue::TooManyDays(days));
        }

        let daily = self.weekly.daily_output_total();
        if daily > self.weekly.total_output_tokens {
            issues.push(SnapshotIssue::DailyExceedsWeekly {
                daily,
                total: self.weekly.total_output_tokens,
            });
        }

        let cost = &self.cost_estimate;
        if !is_valid_cost(cost.window_cost_usd) {
            issues.push(SnapshotIssue::InvalidCost("window_cost_usd"));
        }
        if !is_valid_cost(cost.weekly_cost_usd) {
            issues.push(SnapshotIssue::InvalidCost("weekly_cost_usd"));
        }
        if cost.by_model.iter().any(|c| !is_valid_cost(c.cost_usd)) {
            issues.push(SnapshotIssue::InvalidCost("by_model"));
        }

        // The breakdown may be scoped to either total
        if !cost.by_model.is_empty()
            && !cost.is_consistent_with(cost.window_cost_usd)
            && !cost.is_consistent_with(cost.weekly_cost_usd)
        {
            issues.push(SnapshotIssue::CostMismatch {
                by_model: cost.by_model_total(),
            });
        }

        issues
    }
}

fn is_valid_cost(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}
