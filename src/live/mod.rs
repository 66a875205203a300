//! Live usage refresh
//!
//! This module keeps a usage snapshot current. A [`RefreshController`] polls a
//! [`SnapshotSource`] on the user's cadence and re-fetches immediately when a
//! [`PushChannel`] reports that the underlying usage data changed. The
//! [`Orchestrator`] wires the controller, the settings store and the theme
//! resolver into the presentation surface consumed by the view layer.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::UsageSnapshot;
use crate::settings::RefreshInterval;

pub mod controller;
pub mod orchestrator;
pub mod source;
pub mod watcher;

pub use controller::RefreshController;
pub use orchestrator::Orchestrator;
pub use source::{CommandSnapshotSource, FileSnapshotSource, SnapshotSource};
#[cfg(feature = "fs-watch")]
pub use watcher::FsWatcher;
pub use watcher::{InvalidationHub, PushChannel};

/// How responses of overlapping fetches are reconciled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrdering {
    /// Whichever response resolves last is applied
    #[default]
    LastResolved,
    /// Responses issued before the last applied one are discarded
    LatestIssued,
}

impl std::str::FromStr for ResponseOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "last_resolved" => Ok(ResponseOrdering::LastResolved),
            "latest_issued" => Ok(ResponseOrdering::LatestIssued),
            other => Err(format!(
                "unknown ordering '{}', expected last_resolved or latest_issued",
                other
            )),
        }
    }
}

/// Refresh controller options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    pub interval: Duration,
    pub ordering: ResponseOrdering,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            interval: RefreshInterval::ThreeMinutes.as_duration(),
            ordering: ResponseOrdering::default(),
        }
    }
}

/// Coarse lifecycle phase derived from [`UsageState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    /// No data yet, first fetch outstanding
    InitialLoading,
    /// Data held, no error
    Ready,
    /// Data held, last fetch failed
    ReadyStaleError,
    /// Data held, another fetch outstanding
    Refreshing,
    /// No data, last fetch failed
    Failed,
}

/// Observable controller state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageState {
    /// Current snapshot, replaced wholesale on each successful fetch
    pub snapshot: Option<Arc<UsageSnapshot>>,
    /// True until the first fetch settles
    pub loading: bool,
    /// Message of the most recent failure; cleared by the next success
    pub error: Option<String>,
    /// Whether any fetch is currently outstanding
    pub refreshing: bool,
    pub(crate) in_flight: usize,
    pub(crate) applied_seq: u64,
}

impl UsageState {
    pub(crate) fn initial() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    /// State after a single settled fetch, for one-shot consumers
    pub fn from_result(result: Result<UsageSnapshot, crate::error::FetchError>) -> Self {
        match result {
            Ok(snapshot) => Self {
                snapshot: Some(Arc::new(snapshot)),
                ..Self::default()
            },
            Err(e) => Self {
                error: Some(e.to_string()),
                ..Self::default()
            },
        }
    }

    pub fn phase(&self) -> RefreshPhase {
        match (&self.snapshot, &self.error) {
            (None, _) if self.loading => RefreshPhase::InitialLoading,
            (None, Some(_)) => RefreshPhase::Failed,
            (None, None) => RefreshPhase::InitialLoading,
            (Some(_), _) if self.refreshing => RefreshPhase::Refreshing,
            (Some(_), Some(_)) => RefreshPhase::ReadyStaleError,
            (Some(_), None) => RefreshPhase::Ready,
        }
    }

    /// The error is blocking when there is no data to fall back on
    pub fn is_blocking_error(&self) -> bool {
        self.snapshot.is_none() && self.error.is_some()
    }
}

/// What happened to the result of one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A snapshot was applied
    Applied,
    /// The fetch failed and its error was recorded
    Failed,
    /// A newer response had already been applied
    Superseded,
    /// The controller was disposed before the fetch resolved
    Discarded,
}
