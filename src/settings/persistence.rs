//! Settings storage collaborators

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;
use uuid::Uuid;

use super::AppSettings;
use crate::error::SettingsError;

/// Durable storage for [`AppSettings`]
///
/// Every write carries the complete settings value, so writes completing out
/// of order can never leave a torn record behind.
pub trait SettingsPersistence: Send + Sync {
    fn load(&self) -> BoxFuture<'_, Result<AppSettings, SettingsError>>;

    fn persist(&self, settings: AppSettings) -> BoxFuture<'_, Result<(), SettingsError>>;
}

/// Settings stored as a pretty-printed JSON document
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.claude/claudepulse-settings.json`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".claude")
            .join("claudepulse-settings.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<AppSettings, SettingsError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SettingsError::Load(format!("{}: {}", self.path.display(), e)))?;

        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| SettingsError::Load(format!("{}: {}", self.path.display(), e)))?;
        settings.validate()?;

        Ok(settings)
    }

    async fn write(&self, settings: AppSettings) -> Result<(), SettingsError> {
        let persist_err = |e: &dyn std::fmt::Display| {
            SettingsError::Persist(format!("{}: {}", self.path.display(), e))
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| persist_err(&e))?;
            }
        }

        let content = serde_json::to_string_pretty(&settings).map_err(|e| persist_err(&e))?;

        // Concurrent writes each get their own temp file; the rename is atomic
        let tmp = self
            .path
            .with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| persist_err(&e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(persist_err(&e));
        }

        debug!(path = %self.path.display(), "Settings written");
        Ok(())
    }
}

impl SettingsPersistence for JsonFilePersistence {
    fn load(&self) -> BoxFuture<'_, Result<AppSettings, SettingsError>> {
        self.read().boxed()
    }

    fn persist(&self, settings: AppSettings) -> BoxFuture<'_, Result<(), SettingsError>> {
        self.write(settings).boxed()
    }
}

/// Process-local settings storage, useful for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    stored: Mutex<Option<AppSettings>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: AppSettings) -> Self {
        Self {
            stored: Mutex::new(Some(settings)),
        }
    }

    pub fn stored(&self) -> Option<AppSettings> {
        self.stored.lock().map(|s| s.clone()).unwrap_or(None)
    }
}

impl SettingsPersistence for MemoryPersistence {
    fn load(&self) -> BoxFuture<'_, Result<AppSettings, SettingsError>> {
        let result = self
            .stored()
            .ok_or_else(|| SettingsError::Load("no settings stored".to_string()));
        futures::future::ready(result).boxed()
    }

    fn persist(&self, settings: AppSettings) -> BoxFuture<'_, Result<(), SettingsError>> {
        let result = match self.stored.lock() {
            Ok(mut stored) => {
                *stored = Some(settings);
                Ok(())
            }
            Err(e) => Err(SettingsError::Persist(e.to_string())),
        };
        futures::future::ready(result).boxed()
    }
}
