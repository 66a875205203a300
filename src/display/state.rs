//! Popover View State
//!
//! Assembles controller state, settings and the resolved theme into the one
//! value a front end draws. The view is rebuilt from scratch on every change;
//! it borrows nothing and owns only display-ready values.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{model_bars, window_title, ModelBar, UsageMeter, WeeklyChart};
use crate::format::{format_currency, format_relative_time_at, format_token_count};
use crate::live::UsageState;
use crate::models::{CostEstimate, UsageSnapshot, WeeklyUsage, WindowUsage};
use crate::settings::AppSettings;
use crate::theme::Theme;

/// What the popover shows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum PopoverView {
    /// No data yet
    Loading,
    /// No data and the last fetch failed
    Error { message: String },
    Ready(Box<ReadyView>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadyView {
    pub header: HeaderView,
    pub window: WindowView,
    pub weekly: WeeklyView,
    pub models: Vec<ModelBar>,
    pub cost: CostView,
    pub theme: Theme,
    pub settings_open: bool,
    pub settings: AppSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderView {
    /// Relative age of the snapshot, e.g. `5m ago`
    pub updated: String,
    pub refreshing: bool,
    /// Advisory error shown next to stale data
    pub stale_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowView {
    pub title: String,
    pub message_count: u64,
    /// Present only when the user configured a token limit
    pub meter: Option<UsageMeter>,
    pub output: String,
    pub input: String,
    pub cache_read: String,
    pub sessions: u64,
}

impl WindowView {
    pub fn new(usage: &WindowUsage, settings: &AppSettings) -> Self {
        Self {
            title: window_title(settings.window_hours),
            message_count: usage.message_count,
            meter: settings
                .usage_limit_tokens
                .map(|limit| UsageMeter::new(usage.total_tokens(), limit)),
            output: format_token_count(usage.total_output_tokens),
            input: format_token_count(usage.total_input_tokens),
            cache_read: format_token_count(usage.total_cache_read_tokens),
            sessions: usage.session_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyView {
    pub message_count: u64,
    pub session_count: u64,
    pub chart: WeeklyChart,
    pub output: String,
    pub input: String,
    pub cache: String,
}

impl From<&WeeklyUsage> for WeeklyView {
    fn from(usage: &WeeklyUsage) -> Self {
        Self {
            message_count: usage.message_count,
            session_count: usage.session_count,
            chart: WeeklyChart::from_usage(usage),
            output: format_token_count(usage.total_output_tokens),
            input: format_token_count(usage.total_input_tokens),
            cache: format_token_count(usage.total_cache_read_tokens),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostView {
    pub window: String,
    pub weekly: String,
}

impl From<&CostEstimate> for CostView {
    fn from(estimate: &CostEstimate) -> Self {
        Self {
            window: format_currency(estimate.window_cost_usd),
            weekly: format_currency(estimate.weekly_cost_usd),
        }
    }
}

impl PopoverView {
    /// Build the view as of `now`
    pub fn build(
        state: &UsageState,
        settings: &AppSettings,
        theme: Theme,
        settings_open: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(snapshot) = state.snapshot.as_deref() else {
            return match &state.error {
                Some(message) if !state.loading => PopoverView::Error {
                    message: message.clone(),
                },
                _ => PopoverView::Loading,
            };
        };

        PopoverView::Ready(Box::new(ReadyView::new(
            snapshot,
            state,
            settings,
            theme,
            settings_open,
            now,
        )))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PopoverView::Ready(_))
    }
}

impl ReadyView {
    fn new(
        snapshot: &UsageSnapshot,
        state: &UsageState,
        settings: &AppSettings,
        theme: Theme,
        settings_open: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            header: HeaderView {
                updated: format_relative_time_at(&snapshot.last_updated, now),
                refreshing: state.refreshing,
                stale_error: state.error.clone(),
            },
            window: WindowView::new(&snapshot.window, settings),
            weekly: WeeklyView::from(&snapshot.weekly),
            models: model_bars(&snapshot.models),
            cost: CostView::from(&snapshot.cost_estimate),
            theme,
            settings_open,
            settings: settings.clone(),
        }
    }
}
