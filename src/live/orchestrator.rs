//! Presentation surface
//!
//! The orchestrator coordinates the pieces a front end needs:
//! - Loading persisted settings in the background
//! - Driving the refresh controller's interval from the settings
//! - Driving the theme resolver's preference from the settings
//! - Tracking whether the settings panel is open
//!
//! Front ends read state and call the surface operations; they never reach
//! into the controller or the stores directly.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{
    PushChannel, RefreshController, RefreshOptions, RefreshOutcome, ResponseOrdering,
    SnapshotSource, UsageState,
};
use crate::display::PopoverView;
use crate::error::SettingsError;
use crate::settings::{AppSettings, PersistHandle, SettingsPatch, SettingsStore};
use crate::theme::{AppearanceSignal, Theme, ThemeResolver};

/// Main coordinator behind the popover
pub struct Orchestrator {
    settings: Arc<SettingsStore>,
    controller: Arc<RefreshController>,
    theme: Arc<ThemeResolver>,
    settings_open: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Wire everything up and start refreshing.
    ///
    /// Persisted settings are loaded in the background; until they arrive the
    /// controller and theme run on the store's current values. Must be called
    /// from within a tokio runtime.
    pub fn start(
        settings: Arc<SettingsStore>,
        source: Arc<dyn SnapshotSource>,
        push: Arc<dyn PushChannel>,
        appearance: Arc<dyn AppearanceSignal>,
        ordering: ResponseOrdering,
    ) -> Self {
        let initial = settings.settings();
        // Subscribe before the load starts so its result is always observed
        let changes = settings.subscribe();

        let controller = Arc::new(RefreshController::start(
            source,
            push,
            RefreshOptions {
                interval: initial.refresh_interval_secs.as_duration(),
                ordering,
            },
        ));
        let theme = Arc::new(ThemeResolver::new(appearance, initial.theme));
        let (settings_open, _) = watch::channel(false);

        let load = {
            let settings = Arc::clone(&settings);
            tokio::spawn(async move {
                settings.load().await;
            })
        };
        let sync = tokio::spawn(sync_settings(
            changes,
            initial,
            Arc::clone(&controller),
            Arc::clone(&theme),
        ));

        info!("Orchestrator started");

        Self {
            settings,
            controller,
            theme,
            settings_open,
            tasks: Mutex::new(vec![load, sync]),
        }
    }

    /// Controller state: loading flag, optional error and the snapshot
    pub fn usage(&self) -> UsageState {
        self.controller.state()
    }

    pub fn subscribe_usage(&self) -> watch::Receiver<UsageState> {
        self.controller.subscribe()
    }

    pub fn settings(&self) -> AppSettings {
        self.settings.settings()
    }

    pub fn subscribe_settings(&self) -> watch::Receiver<AppSettings> {
        self.settings.subscribe()
    }

    /// Resolved theme
    pub fn theme(&self) -> Theme {
        self.theme.theme()
    }

    pub fn subscribe_theme(&self) -> watch::Receiver<Theme> {
        self.theme.subscribe()
    }

    pub fn controller(&self) -> &RefreshController {
        &self.controller
    }

    /// Fetch now and wait for the result to settle
    pub async fn refresh(&self) -> RefreshOutcome {
        self.controller.refresh().await
    }

    /// Apply a settings edit immediately and persist it in the background.
    ///
    /// The new interval and theme take effect before this returns.
    pub fn update_settings(&self, patch: SettingsPatch) -> Result<PersistHandle, SettingsError> {
        let handle = self.settings.update_settings(patch)?;
        apply_settings(&self.settings.settings(), &self.controller, &self.theme);
        Ok(handle)
    }

    pub fn open_settings(&self) {
        self.settings_open.send_replace(true);
    }

    pub fn close_settings(&self) {
        self.settings_open.send_replace(false);
    }

    pub fn settings_open(&self) -> bool {
        *self.settings_open.borrow()
    }

    pub fn subscribe_settings_open(&self) -> watch::Receiver<bool> {
        self.settings_open.subscribe()
    }

    /// Everything the popover draws, as of now
    pub fn view(&self) -> PopoverView {
        PopoverView::build(
            &self.usage(),
            &self.settings(),
            self.theme(),
            self.settings_open(),
            Utc::now(),
        )
    }

    /// Stop refreshing and detach every subscription. Safe to call more than once.
    pub fn dispose(&self) {
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .map(|mut t| t.drain(..).collect())
            .unwrap_or_default();
        for task in tasks {
            task.abort();
        }
        self.controller.dispose();
        self.theme.dispose();
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn apply_settings(settings: &AppSettings, controller: &RefreshController, theme: &ThemeResolver) {
    controller.set_interval(settings.refresh_interval_secs.as_duration());
    theme.set_preference(settings.theme);
}

async fn sync_settings(
    mut changes: watch::Receiver<AppSettings>,
    mut previous: AppSettings,
    controller: Arc<RefreshController>,
    theme: Arc<ThemeResolver>,
) {
    while changes.changed().await.is_ok() {
        let current = changes.borrow_and_update().clone();
        apply_settings(&current, &controller, &theme);

        // The producer aggregates over the window, so a new length needs new data
        if current.window_hours != previous.window_hours
            && current.refresh_interval_secs == previous.refresh_interval_secs
        {
            debug!(window_hours = current.window_hours, "Window length changed, refreshing");
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                controller.refresh().await;
            });
        }
        previous = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::InvalidationHub;
    use crate::settings::MemoryPersistence;
    use crate::test_support;
    use crate::theme::WatchAppearance;
    use crate::error::FetchError;
    use crate::models::UsageSnapshot;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    struct StaticSource;

    impl SnapshotSource for StaticSource {
        fn fetch(&self) -> BoxFuture<'_, Result<UsageSnapshot, FetchError>> {
            futures::future::ready(Ok(test_support::snapshot())).boxed()
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::start(
            Arc::new(SettingsStore::new(Arc::new(MemoryPersistence::new()))),
            Arc::new(StaticSource),
            Arc::new(InvalidationHub::new()),
            Arc::new(WatchAppearance::new(true)),
            ResponseOrdering::default(),
        )
    }

    #[tokio::test]
    async fn test_settings_panel_flag() {
        let orchestrator = orchestrator();
        assert!(!orchestrator.settings_open());
        orchestrator.open_settings();
        assert!(orchestrator.settings_open());
        orchestrator.close_settings();
        assert!(!orchestrator.settings_open());
    }

    #[tokio::test]
    async fn test_update_settings_drives_controller_and_theme() {
        let orchestrator = orchestrator();
        assert_eq!(orchestrator.theme(), Theme::Dark);

        orchestrator
            .update_settings(
                SettingsPatch::new()
                    .refresh_interval(crate::settings::RefreshInterval::OneMinute)
                    .theme(crate::settings::ThemePreference::Light),
            )
            .unwrap();

        assert_eq!(orchestrator.theme(), Theme::Light);
        assert_eq!(
            orchestrator.controller().interval(),
            Some(std::time::Duration::from_secs(60))
        );
    }

    #[tokio::test]
    async fn test_view_becomes_ready() {
        let orchestrator = orchestrator();
        let mut usage = orchestrator.subscribe_usage();
        usage.wait_for(|s| s.snapshot.is_some()).await.unwrap();
        assert!(orchestrator.view().is_ready());

        orchestrator.dispose();
        orchestrator.dispose();
        assert!(orchestrator.controller().is_disposed());
    }
}
