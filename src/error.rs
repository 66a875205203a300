//! Error taxonomy for the telemetry core
//!
//! Three families of failure exist and none of them is fatal:
//!
//! - [`FetchError`] - a snapshot could not be retrieved. Its `Display` text is
//!   the message shown to the user, either as a blocking error (no data yet)
//!   or as an advisory next to a stale snapshot.
//! - [`SettingsError::Persist`] - a settings write failed. Logged only; the
//!   in-memory settings are never rolled back.
//! - [`SettingsError::Load`] - a settings read failed. Recovered silently by
//!   keeping the defaults.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to retrieve a usage snapshot
#[derive(Debug, Error)]
pub enum FetchError {
    /// The snapshot document could not be read
    #[error("failed to read usage snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The producer returned something that is not a snapshot
    #[error("invalid usage snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    /// The producer command could not be run or exited unsuccessfully
    #[error("usage producer failed: {0}")]
    Command(String),

    /// The producer did not answer in time
    #[error("usage producer timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Any other transport or application failure reported by a source
    #[error("{0}")]
    Transport(String),
}

/// Failure in the settings layer
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading persisted settings failed
    #[error("failed to load settings: {0}")]
    Load(String),

    /// Writing settings failed
    #[error("failed to save settings: {0}")]
    Persist(String),

    /// A value outside its allowed domain
    #[error("invalid setting {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl SettingsError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}
