//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults
//! - Validation and type safety
//!
//! User settings (refresh cadence, window length, token limit, theme) are not
//! configuration: they live in the settings store and are edited at runtime.
//! This module only covers how the process itself is wired.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::live::ResponseOrdering;
use crate::settings::JsonFilePersistence;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Paths configuration
    pub paths: PathsConfig,

    /// Where snapshots come from
    pub source: SourceConfig,

    /// Refresh behavior
    pub refresh: RefreshConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub settings_file: PathBuf,
    pub snapshot_file: PathBuf,
    pub log_directory: PathBuf,
    /// Directory holding the assistant's `.jsonl` session logs
    pub watch_directory: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Read the snapshot document at `paths.snapshot_file`
    #[default]
    File,
    /// Run `source.command` and parse its stdout
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub command: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub ordering: ResponseOrdering,
    pub push_debounce_ms: u64,
    pub watch_enabled: bool,
}

fn claude_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "ERROR".to_string(),
            format: "pretty".to_string(),
            output: "console".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            settings_file: JsonFilePersistence::default_path(),
            snapshot_file: claude_home().join("claudepulse-usage.json"),
            log_directory: PathBuf::from("logs"),
            watch_directory: claude_home().join("projects"),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::File,
            command: String::new(),
            args: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            ordering: ResponseOrdering::LastResolved,
            push_debounce_ms: 5_000,
            watch_enabled: true,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["pretty", "json"];
const LOG_OUTPUTS: [&str; 3] = ["console", "file", "both"];

/// Longest accepted push debounce
const MAX_DEBOUNCE_MS: u64 = 60_000;

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        // Try to load from config file if it exists
        let config_paths = [
            PathBuf::from("claude-pulse.toml"),
            PathBuf::from(".claude-pulse.toml"),
            dirs::config_dir()
                .map(|d| d.join("claude-pulse").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load an explicit config file, then apply env overrides and validate
    pub fn load_with_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        // Path overrides
        if let Ok(val) = env::var("CLAUDE_PULSE_SETTINGS_FILE") {
            self.paths.settings_file = PathBuf::from(val);
        }
        if let Ok(val) = env::var("CLAUDE_PULSE_SNAPSHOT_FILE") {
            self.paths.snapshot_file = PathBuf::from(val);
        }
        if let Ok(val) = env::var("CLAUDE_PULSE_WATCH_DIR") {
            self.paths.watch_directory = PathBuf::from(val);
        }
        if let Ok(val) = env::var("CLAUDE_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        // Source overrides
        if let Ok(val) = env::var("CLAUDE_PULSE_SOURCE_COMMAND") {
            let mut parts = val.split_whitespace().map(str::to_string);
            if let Some(program) = parts.next() {
                self.source.kind = SourceKind::Command;
                self.source.command = program;
                self.source.args = parts.collect();
            }
        }
        if let Ok(val) = env::var("CLAUDE_PULSE_FETCH_TIMEOUT_SECS") {
            self.source.timeout_secs = val
                .parse()
                .context("Invalid CLAUDE_PULSE_FETCH_TIMEOUT_SECS")?;
        }

        // Refresh overrides
        if let Ok(val) = env::var("CLAUDE_PULSE_ORDERING") {
            self.refresh.ordering = val
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid CLAUDE_PULSE_ORDERING")?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(anyhow::anyhow!(
                "Log level must be one of {}, got {}",
                LOG_LEVELS.join(", "),
                self.logging.level
            ));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Log format must be pretty or json, got {}",
                self.logging.format
            ));
        }
        if !LOG_OUTPUTS.contains(&self.logging.output.as_str()) {
            return Err(anyhow::anyhow!(
                "Log output must be console, file or both, got {}",
                self.logging.output
            ));
        }

        if self.source.kind == SourceKind::Command && self.source.command.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "Source kind is command but no source command is configured"
            ));
        }
        if self.source.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Fetch timeout must be greater than 0"));
        }

        if self.refresh.push_debounce_ms > MAX_DEBOUNCE_MS {
            return Err(anyhow::anyhow!(
                "Push debounce must be at most {}ms, got {}ms",
                MAX_DEBOUNCE_MS,
                self.refresh.push_debounce_ms
            ));
        }
        if self.refresh.watch_enabled && !self.paths.watch_directory.exists() {
            warn!(
                watch_directory = %self.paths.watch_directory.display(),
                "Watch directory does not exist, relying on polling only"
            );
        }

        // Create the log directory only when something will be written there
        if self.logging.output != "console" && !self.paths.log_directory.exists() {
            fs::create_dir_all(&self.paths.log_directory)
                .context("Failed to create log directory")?;
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration instance, falling back to defaults
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load configuration, using defaults");
            Config::default()
        })
    })
}

/// Install an already loaded configuration; returns false if one was set
pub fn set_config(config: Config) -> bool {
    CONFIG.set(config).is_ok()
}
