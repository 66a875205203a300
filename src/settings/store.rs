//! Optimistic settings store
//!
//! Edits are committed to memory synchronously, in call order, and then
//! written to the persistence collaborator in the background. A failed write is
//! logged and never rolls the in-memory value back: the UI keeps reflecting
//! what the user chose even when the durable copy lags behind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{AppSettings, SettingsPatch, SettingsPersistence};
use crate::error::SettingsError;

/// Handle to a background settings write; awaiting it is optional
pub type PersistHandle = JoinHandle<()>;

pub struct SettingsStore {
    state: watch::Sender<AppSettings>,
    persistence: Arc<dyn SettingsPersistence>,
    /// Number of user edits committed so far
    edits: AtomicU64,
}

impl SettingsStore {
    /// Create a store seeded with [`AppSettings::default`]
    pub fn new(persistence: Arc<dyn SettingsPersistence>) -> Self {
        let (state, _) = watch::channel(AppSettings::default());
        Self {
            state,
            persistence,
            edits: AtomicU64::new(0),
        }
    }

    /// Overwrite the defaults with the persisted settings.
    ///
    /// Best-effort: a failed load keeps the current values and is only visible
    /// in debug logs. A load that finishes after the user already edited the
    /// settings is discarded. Returns whether the loaded values were applied.
    pub async fn load(&self) -> bool {
        let edits_before = self.edits.load(Ordering::SeqCst);

        let loaded = match self.persistence.load().await {
            Ok(settings) => settings,
            Err(e) => {
                debug!(error = %e, "No persisted settings, keeping defaults");
                return false;
            }
        };

        let applied = self.state.send_if_modified(|current| {
            if self.edits.load(Ordering::SeqCst) != edits_before {
                return false;
            }
            *current = loaded;
            true
        });

        if applied {
            info!("Loaded persisted settings");
        } else {
            debug!("Discarding persisted settings, a newer edit was already applied");
        }
        applied
    }

    /// Current settings
    pub fn settings(&self) -> AppSettings {
        self.state.borrow().clone()
    }

    /// Watch for settings changes
    pub fn subscribe(&self) -> watch::Receiver<AppSettings> {
        self.state.subscribe()
    }

    /// Merge `patch` into the current settings, commit it, and persist the
    /// complete result in the background.
    ///
    /// An invalid patch is rejected before anything is committed. Must be
    /// called from within a tokio runtime.
    pub fn update_settings(&self, patch: SettingsPatch) -> Result<PersistHandle, SettingsError> {
        let mut outcome: Result<AppSettings, SettingsError> =
            Err(SettingsError::invalid("settings", "not applied"));

        self.state.send_if_modified(|current| {
            let next = current.merged(&patch);
            if let Err(e) = next.validate() {
                outcome = Err(e);
                return false;
            }
            self.edits.fetch_add(1, Ordering::SeqCst);
            *current = next.clone();
            outcome = Ok(next);
            true
        });

        let committed = outcome?;
        debug!(
            refresh_interval_secs = committed.refresh_interval_secs.as_secs(),
            window_hours = committed.window_hours,
            usage_limit_tokens = ?committed.usage_limit_tokens,
            theme = %committed.theme,
            "Settings updated"
        );

        Ok(self.spawn_persist(committed))
    }

    /// Replace the settings wholesale; equivalent to a patch touching every field
    pub fn replace_settings(&self, next: AppSettings) -> Result<PersistHandle, SettingsError> {
        self.update_settings(SettingsPatch {
            refresh_interval_secs: Some(next.refresh_interval_secs),
            window_hours: Some(next.window_hours),
            usage_limit_tokens: Some(next.usage_limit_tokens),
            theme: Some(next.theme),
        })
    }

    fn spawn_persist(&self, settings: AppSettings) -> PersistHandle {
        let persistence = Arc::clone(&self.persistence);
        tokio::spawn(async move {
            match persistence.persist(settings).await {
                Ok(()) => debug!("Settings persisted"),
                Err(e) => error!(error = %e, "Failed to save settings"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{MemoryPersistence, RefreshInterval, ThemePreference};

    #[tokio::test]
    async fn test_load_overwrites_defaults() {
        let persisted = AppSettings {
            theme: ThemePreference::Dark,
            ..AppSettings::default()
        };
        let store = SettingsStore::new(Arc::new(MemoryPersistence::with_settings(persisted.clone())));

        assert_eq!(store.settings(), AppSettings::default());
        assert!(store.load().await);
        assert_eq!(store.settings(), persisted);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_defaults() {
        let store = SettingsStore::new(Arc::new(MemoryPersistence::new()));
        assert!(!store.load().await);
        assert_eq!(store.settings(), AppSettings::default());
    }

    #[tokio::test]
    async fn test_updates_apply_in_call_order() {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = SettingsStore::new(persistence.clone());

        let first = store
            .update_settings(SettingsPatch::new().refresh_interval(RefreshInterval::OneMinute))
            .unwrap();
        let second = store
            .update_settings(SettingsPatch::new().window_hours(8.0))
            .unwrap();

        let settings = store.settings();
        assert_eq!(settings.refresh_interval_secs, RefreshInterval::OneMinute);
        assert_eq!(settings.window_hours, 8.0);

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(persistence.stored(), Some(settings));
    }

    #[tokio::test]
    async fn test_invalid_patch_is_rejected() {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = SettingsStore::new(persistence.clone());

        let result = store.update_settings(SettingsPatch::new().window_hours(30.0));
        assert!(matches!(result, Err(SettingsError::Invalid { field: "window_hours", .. })));
        assert_eq!(store.settings(), AppSettings::default());
        assert_eq!(persistence.stored(), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let store = SettingsStore::new(Arc::new(MemoryPersistence::new()));
        let mut rx = store.subscribe();

        store
            .update_settings(SettingsPatch::new().theme(ThemePreference::Light))
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().theme, ThemePreference::Light);
    }
}
