//! Snapshot sources
//!
//! A snapshot source hands the refresh controller one complete
//! [`UsageSnapshot`] per call. The producer that scans assistant logs lives
//! outside this crate; sources only know how to reach it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::models::UsageSnapshot;
use crate::settings::AppSettings;

/// Environment variable carrying the configured window length to a producer
pub const WINDOW_HOURS_ENV: &str = "CLAUDE_PULSE_WINDOW_HOURS";

/// Default time a producer command may take
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches usage snapshots from the external producer
pub trait SnapshotSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Result<UsageSnapshot, FetchError>>;

    /// Short human-readable description used in logs
    fn describe(&self) -> String;
}

/// Reads a snapshot JSON document that the producer keeps up to date
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<UsageSnapshot, FetchError> {
        let content = tokio::fs::read(&self.path).await.map_err(|e| FetchError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(serde_json::from_slice(&content)?)
    }
}

impl SnapshotSource for FileSnapshotSource {
    fn fetch(&self) -> BoxFuture<'_, Result<UsageSnapshot, FetchError>> {
        self.read().boxed()
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Runs a producer command and parses the snapshot it prints on stdout
#[derive(Debug, Clone)]
pub struct CommandSnapshotSource {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    settings: Option<watch::Receiver<AppSettings>>,
}

impl CommandSnapshotSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_FETCH_TIMEOUT,
            settings: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pass the current window length to every producer run
    pub fn with_settings(mut self, settings: watch::Receiver<AppSettings>) -> Self {
        self.settings = Some(settings);
        self
    }

    async fn run(&self) -> Result<UsageSnapshot, FetchError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(settings) = &self.settings {
            let hours = settings.borrow().window_hours;
            cmd.env(WINDOW_HOURS_ENV, hours.to_string());
        }

        debug!(program = %self.program, args = ?self.args, "Running usage producer");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result
                .map_err(|e| FetchError::Command(format!("failed to run {}: {}", self.program, e)))?,
            Err(_) => {
                warn!(program = %self.program, timeout_secs = self.timeout.as_secs(), "Usage producer timed out");
                return Err(FetchError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            return Err(FetchError::Command(if detail.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                format!("{} exited with {}: {}", self.program, output.status, detail)
            }));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

impl SnapshotSource for CommandSnapshotSource {
    fn fetch(&self) -> BoxFuture<'_, Result<UsageSnapshot, FetchError>> {
        self.run().boxed()
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            format!("command {}", self.program)
        } else {
            format!("command {} {}", self.program, self.args.join(" "))
        }
    }
}
