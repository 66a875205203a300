//! Claude Pulse Library
//!
//! Rolling usage and cost telemetry for an AI assistant client: token
//! consumption over a sliding window and over the current week, broken down by
//! model, with derived USD cost estimates. The library owns the rules that turn
//! raw usage snapshots into display values and the concurrency that keeps them
//! fresh; scanning the assistant's logs is left to an external producer.
//!
//! ## Architecture Overview
//!
//! - [`format`] - pure conversions of counts, amounts and timestamps to text
//! - [`models`] - the usage snapshot and its nested aggregates
//! - [`settings`] - typed user settings with optimistic persistence
//! - [`theme`] - resolves a light/dark/system preference to a concrete theme
//! - [`live`] - snapshot sources, push invalidation, the refresh controller
//!   and the [`Orchestrator`] presentation surface
//! - [`display`] - view-model derivations and the text report
//! - [`config`] - process configuration from TOML files and the environment
//! - [`logging`] - structured logging setup
//! - [`error`] - the library's error types
//!
//! ## Main Entry Point
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use claude_pulse::live::{FileSnapshotSource, InvalidationHub, Orchestrator, ResponseOrdering};
//! use claude_pulse::settings::{JsonFilePersistence, SettingsStore};
//! use claude_pulse::theme::WatchAppearance;
//!
//! # async fn example() {
//! let settings = Arc::new(SettingsStore::new(Arc::new(JsonFilePersistence::new(
//!     JsonFilePersistence::default_path(),
//! ))));
//! let orchestrator = Orchestrator::start(
//!     settings,
//!     Arc::new(FileSnapshotSource::new("usage.json")),
//!     Arc::new(InvalidationHub::new()),
//!     Arc::new(WatchAppearance::from_env()),
//!     ResponseOrdering::default(),
//! );
//!
//! orchestrator.refresh().await;
//! let view = orchestrator.view();
//! print!("{}", claude_pulse::display::render_report(&view));
//! # }
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod format;
pub mod live;
pub mod logging;
pub mod models;
pub mod settings;
pub mod theme;
pub mod timestamp;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{FetchError, SettingsError};
pub use live::Orchestrator;
pub use models::*;
