//! Display Derivations
//!
//! View-model helpers that turn a [`UsageSnapshot`](crate::models::UsageSnapshot)
//! into the quantities a popover draws. Nothing here touches a terminal; the
//! [`report`] module renders these values as text and [`state`] assembles them
//! into a complete [`PopoverView`].
//!
//! ## Core Components
//!
//! - [`UsageMeter`] - window tokens against the user's token limit, with a
//!   [`MeterLevel`] of normal, warning (70 %) or critical (90 %)
//! - [`WeeklyChart`] - Monday to Sunday output bars, zero-filled for idle days
//! - [`ModelBar`] - per-model output bars sized relative to the busiest model
//!
//! ## Layout
//!
//! ```text
//! Claude Pulse                         5m ago
//! 5-Hour Window                       42 msgs
//!   ██████████████▓░░░░░  380.0K / 500.0K  76%
//!   Output 48.0K  Input 12.0K  Cache Read 300.0K  Sessions 3
//! This Week                 42 msgs · 3 sessions
//!   M ▇  T ▁  W ▁  T ▁  F ▁  S ▁  S ▁
//! Model Breakdown
//!   ● Opus 4.1     ████░░░░░░░░░░░░  8.0K
//!   ● Sonnet 4.5   ████████████████  40.0K
//! Est. Cost        5-Hour Window $1.25   This Week $1.25
//! ```

use chrono::Datelike;
use serde::Serialize;

use crate::format::{format_percentage, format_token_count};
use crate::models::{ModelUsage, WeeklyUsage};
use crate::timestamp::parse_date;

pub mod report;
pub mod state;

pub use report::render_report;
pub use state::{CostView, HeaderView, PopoverView, ReadyView, WeeklyView, WindowView};

/// Meter percentage at which usage is flagged as a warning
pub const WARNING_PERCENT: f64 = 70.0;

/// Meter percentage at which usage is flagged as critical
pub const CRITICAL_PERCENT: f64 = 90.0;

/// Smallest bar height so idle days remain visible
pub const MIN_BAR_PERCENT: f64 = 3.0;

pub const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Severity of window usage against the limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterLevel {
    Normal,
    Warning,
    Critical,
}

impl MeterLevel {
    pub fn from_percent(percent: f64) -> Self {
        if percent >= CRITICAL_PERCENT {
            MeterLevel::Critical
        } else if percent >= WARNING_PERCENT {
            MeterLevel::Warning
        } else {
            MeterLevel::Normal
        }
    }
}

/// Window usage against a token limit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageMeter {
    pub current: u64,
    pub limit: u64,
    /// Share of the limit used, capped at 100
    pub percent: f64,
    pub level: MeterLevel,
}

impl UsageMeter {
    /// A zero limit counts as exhausted once any token is used
    pub fn new(current: u64, limit: u64) -> Self {
        let percent = if limit == 0 {
            if current == 0 {
                0.0
            } else {
                100.0
            }
        } else {
            (current as f64 / limit as f64 * 100.0).min(100.0)
        };

        Self {
            current,
            limit,
            percent,
            level: MeterLevel::from_percent(percent),
        }
    }

    /// `380.0K / 500.0K`
    pub fn label(&self) -> String {
        format!(
            "{} / {}",
            format_token_count(self.current),
            format_token_count(self.limit)
        )
    }

    /// `76%`
    pub fn percent_label(&self) -> String {
        format_percentage(self.percent)
    }
}

/// One bar of the weekly chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDay {
    pub label: &'static str,
    pub date: Option<String>,
    pub output_tokens: u64,
    /// Bar height relative to the busiest day, never below [`MIN_BAR_PERCENT`]
    pub height_percent: f64,
    pub has_data: bool,
}

impl ChartDay {
    /// `Mon: 1.2K output` or `Mon: no data`
    pub fn tooltip(&self) -> String {
        if self.has_data {
            format!("{}: {} output", self.label, format_token_count(self.output_tokens))
        } else {
            format!("{}: no data", self.label)
        }
    }
}

/// Monday to Sunday output chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyChart {
    pub days: Vec<ChartDay>,
    pub max_output: u64,
}

impl WeeklyChart {
    /// Place each daily entry on its weekday and zero-fill the rest.
    ///
    /// Entries whose date cannot be parsed fall back to their position in the
    /// breakdown. Several entries on one weekday are summed.
    pub fn from_usage(usage: &WeeklyUsage) -> Self {
        let mut slots: [Option<(String, u64)>; 7] = Default::default();

        for (i, day) in usage.daily_breakdown.iter().enumerate() {
            let index = parse_date(&day.date)
                .map(|d| d.weekday().num_days_from_monday() as usize)
                .unwrap_or(i);
            let Some(slot) = slots.get_mut(index) else {
                continue;
            };
            if let Some((_, tokens)) = slot.as_mut() {
                *tokens = tokens.saturating_add(day.output_tokens);
            } else {
                *slot = Some((day.date.clone(), day.output_tokens));
            }
        }

        let max_output = slots
            .iter()
            .flatten()
            .map(|(_, tokens)| *tokens)
            .max()
            .unwrap_or(0)
            .max(1);

        let days = DAY_NAMES
            .iter()
            .zip(slots)
            .map(|(label, slot)| {
                let (date, output_tokens, has_data) = match slot {
                    Some((date, tokens)) => (Some(date), tokens, true),
                    None => (None, 0, false),
                };
                let height = output_tokens as f64 / max_output as f64 * 100.0;
                ChartDay {
                    label: *label,
                    date,
                    output_tokens,
                    height_percent: height.max(MIN_BAR_PERCENT),
                    has_data,
                }
            })
            .collect();

        Self { days, max_output }
    }
}

/// Model family used to pick a bar color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    Opus,
    Sonnet,
    Haiku,
}

impl ModelFamily {
    /// Classify by display name; unknown models count as sonnet
    pub fn from_display_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("opus") {
            ModelFamily::Opus
        } else if lower.contains("haiku") {
            ModelFamily::Haiku
        } else {
            ModelFamily::Sonnet
        }
    }
}

/// One row of the model breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelBar {
    pub model: String,
    pub display_name: String,
    pub family: ModelFamily,
    pub output_tokens: u64,
    /// Bar width relative to the model with the most output
    pub width_percent: f64,
}

pub fn model_bars(models: &[ModelUsage]) -> Vec<ModelBar> {
    let max_output = models
        .iter()
        .map(|m| m.output_tokens)
        .max()
        .unwrap_or(0)
        .max(1);

    models
        .iter()
        .map(|m| ModelBar {
            model: m.model.clone(),
            display_name: m.display_name.clone(),
            family: ModelFamily::from_display_name(&m.display_name),
            output_tokens: m.output_tokens,
            width_percent: m.output_tokens as f64 / max_output as f64 * 100.0,
        })
        .collect()
}

/// Title of the window card, e.g. `5-Hour Window` or `8.5-Hour Window`
pub fn window_title(window_hours: f64) -> String {
    format!("{}-Hour Window", window_hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_levels() {
        assert_eq!(UsageMeter::new(69, 100).level, MeterLevel::Normal);
        assert_eq!(UsageMeter::new(70, 100).level, MeterLevel::Warning);
        assert_eq!(UsageMeter::new(90, 100).level, MeterLevel::Critical);
        assert_eq!(UsageMeter::new(250, 100).percent, 100.0);
    }

    #[test]
    fn test_same_day_entries_saturate() {
        let day = |date: &str| crate::models::DailyUsage {
            date: date.to_string(),
            input_tokens: 0,
            output_tokens: u64::MAX,
            message_count: 1,
        };
        let usage = WeeklyUsage {
            total_input_tokens: 0,
            total_output_tokens: u64::MAX,
            total_cache_read_tokens: 0,
            total_cache_creation_tokens: 0,
            message_count: 2,
            session_count: 1,
            daily_breakdown: vec![day("2025-03-10"), day("2025-03-10")],
        };

        let chart = WeeklyChart::from_usage(&usage);
        assert_eq!(chart.days[0].output_tokens, u64::MAX);
        assert_eq!(chart.days[0].height_percent, 100.0);
    }

    #[test]
    fn test_meter_zero_limit() {
        assert_eq!(UsageMeter::new(0, 0).percent, 0.0);
        assert_eq!(UsageMeter::new(1, 0).level, MeterLevel::Critical);
    }

    #[test]
    fn test_meter_labels() {
        let meter = UsageMeter::new(380_000, 500_000);
        assert_eq!(meter.label(), "380.0K / 500.0K");
        assert_eq!(meter.percent_label(), "76%");
        assert_eq!(UsageMeter::new(725, 1_000).percent_label(), "73%");
    }

    #[test]
    fn test_model_family() {
        assert_eq!(ModelFamily::from_display_name("Opus 4.5"), ModelFamily::Opus);
        assert_eq!(ModelFamily::from_display_name("claude HAIKU"), ModelFamily::Haiku);
        assert_eq!(ModelFamily::from_display_name("Mystery"), ModelFamily::Sonnet);
    }

    #[test]
    fn test_window_title() {
        assert_eq!(window_title(5.0), "5-Hour Window");
        assert_eq!(window_title(8.5), "8.5-Hour Window");
    }
}
