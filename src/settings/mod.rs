//! User Settings
//!
//! Typed user settings that parameterize refresh cadence, the rolling window
//! length, the usage meter and the theme. Values are validated against their
//! enumerated domains before they are ever committed.
//!
//! - [`AppSettings`] - the complete settings record, also the persisted layout
//! - [`SettingsPatch`] - a partial edit merged into the current settings
//! - [`SettingsStore`] - optimistic in-memory state with best-effort persistence
//! - [`SettingsPersistence`] - the storage collaborator ([`JsonFilePersistence`],
//!   [`MemoryPersistence`])

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

pub mod persistence;
pub mod store;

pub use persistence::{JsonFilePersistence, MemoryPersistence, SettingsPersistence};
pub use store::{PersistHandle, SettingsStore};

pub const MIN_WINDOW_HOURS: f64 = 1.0;
pub const MAX_WINDOW_HOURS: f64 = 24.0;
pub const WINDOW_HOURS_STEP: f64 = 0.5;

/// Polling cadence choices offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum RefreshInterval {
    OneMinute,
    TwoMinutes,
    ThreeMinutes,
    FiveMinutes,
}

impl RefreshInterval {
    pub const ALL: [RefreshInterval; 4] = [
        RefreshInterval::OneMinute,
        RefreshInterval::TwoMinutes,
        RefreshInterval::ThreeMinutes,
        RefreshInterval::FiveMinutes,
    ];

    pub fn as_secs(self) -> u64 {
        match self {
            RefreshInterval::OneMinute => 60,
            RefreshInterval::TwoMinutes => 120,
            RefreshInterval::ThreeMinutes => 180,
            RefreshInterval::FiveMinutes => 300,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    pub fn label(self) -> &'static str {
        match self {
            RefreshInterval::OneMinute => "1 minute",
            RefreshInterval::TwoMinutes => "2 minutes",
            RefreshInterval::ThreeMinutes => "3 minutes",
            RefreshInterval::FiveMinutes => "5 minutes",
        }
    }
}

impl TryFrom<u64> for RefreshInterval {
    type Error = SettingsError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        RefreshInterval::ALL
            .into_iter()
            .find(|i| i.as_secs() == secs)
            .ok_or_else(|| {
                SettingsError::invalid(
                    "refresh_interval_secs",
                    format!("{} is not one of 60, 120, 180, 300", secs),
                )
            })
    }
}

impl From<RefreshInterval> for u64 {
    fn from(interval: RefreshInterval) -> Self {
        interval.as_secs()
    }
}

impl FromStr for RefreshInterval {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs: u64 = s.trim().parse().map_err(|_| {
            SettingsError::invalid("refresh_interval_secs", format!("'{}' is not a number", s))
        })?;
        RefreshInterval::try_from(secs)
    }
}

/// Theme preference as chosen by the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThemePreference::Light => "light",
            ThemePreference::Dark => "dark",
            ThemePreference::System => "system",
        })
    }
}

impl FromStr for ThemePreference {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemePreference::Light),
            "dark" => Ok(ThemePreference::Dark),
            "system" => Ok(ThemePreference::System),
            other => Err(SettingsError::invalid(
                "theme",
                format!("'{}' is not one of light, dark, system", other),
            )),
        }
    }
}

/// User-configurable settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    pub refresh_interval_secs: RefreshInterval,
    pub window_hours: f64,
    pub usage_limit_tokens: Option<u64>,
    pub theme: ThemePreference,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: RefreshInterval::ThreeMinutes,
            window_hours: 5.0,
            usage_limit_tokens: None,
            theme: ThemePreference::System,
        }
    }
}

impl AppSettings {
    /// Validate values that the type system does not already constrain
    pub fn validate(&self) -> Result<(), SettingsError> {
        let hours = self.window_hours;
        if !hours.is_finite() || !(MIN_WINDOW_HOURS..=MAX_WINDOW_HOURS).contains(&hours) {
            return Err(SettingsError::invalid(
                "window_hours",
                format!(
                    "{} is outside {}..={}",
                    hours, MIN_WINDOW_HOURS, MAX_WINDOW_HOURS
                ),
            ));
        }
        if (hours / WINDOW_HOURS_STEP).fract() != 0.0 {
            return Err(SettingsError::invalid(
                "window_hours",
                format!("{} is not a multiple of {}", hours, WINDOW_HOURS_STEP),
            ));
        }
        Ok(())
    }

    /// Apply a partial edit, returning the complete resulting settings
    pub fn merged(&self, patch: &SettingsPatch) -> AppSettings {
        AppSettings {
            refresh_interval_secs: patch
                .refresh_interval_secs
                .unwrap_or(self.refresh_interval_secs),
            window_hours: patch.window_hours.unwrap_or(self.window_hours),
            usage_limit_tokens: patch.usage_limit_tokens.unwrap_or(self.usage_limit_tokens),
            theme: patch.theme.unwrap_or(self.theme),
        }
    }

    pub fn window_duration(&self) -> Duration {
        Duration::from_secs_f64(self.window_hours * 3600.0)
    }
}

/// A partial settings edit; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub refresh_interval_secs: Option<RefreshInterval>,
    pub window_hours: Option<f64>,
    /// `Some(None)` clears the limit
    pub usage_limit_tokens: Option<Option<u64>>,
    pub theme: Option<ThemePreference>,
}

impl SettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_interval(mut self, interval: RefreshInterval) -> Self {
        self.refresh_interval_secs = Some(interval);
        self
    }

    pub fn window_hours(mut self, hours: f64) -> Self {
        self.window_hours = Some(hours);
        self
    }

    pub fn usage_limit(mut self, limit: Option<u64>) -> Self {
        self.usage_limit_tokens = Some(limit);
        self
    }

    pub fn theme(mut self, theme: ThemePreference) -> Self {
        self.theme = Some(theme);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &SettingsPatch::default()
    }
}
