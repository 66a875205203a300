//! Theme Resolution
//!
//! Turns a [`ThemePreference`] into a concrete [`Theme`] and keeps it current.
//! Explicit preferences resolve immediately. The `system` preference follows an
//! [`AppearanceSignal`] for as long as it stays selected; the subscription is
//! owned by the active resolution and torn down when the preference changes or
//! the resolver is disposed.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::settings::ThemePreference;

/// Environment variable forcing the detected appearance (`dark` or `light`)
pub const APPEARANCE_ENV: &str = "CLAUDE_PULSE_APPEARANCE";

/// Concrete theme after resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark(dark: bool) -> Self {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        })
    }
}

/// Source of the system dark-mode preference
pub trait AppearanceSignal: Send + Sync {
    /// Whether the system currently prefers a dark appearance
    fn is_dark(&self) -> bool;

    /// Receive a notification for every appearance change
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Appearance signal backed by a watch channel
#[derive(Debug)]
pub struct WatchAppearance {
    tx: watch::Sender<bool>,
}

impl WatchAppearance {
    pub fn new(dark: bool) -> Self {
        let (tx, _) = watch::channel(dark);
        Self { tx }
    }

    /// Probe the terminal environment once.
    ///
    /// `CLAUDE_PULSE_APPEARANCE` wins; otherwise the background index of
    /// `COLORFGBG` decides (0-6 and 8 are dark); otherwise light.
    pub fn from_env() -> Self {
        let forced = std::env::var(APPEARANCE_ENV).ok();
        let colorfgbg = std::env::var("COLORFGBG").ok();
        Self::new(detect_dark(forced.as_deref(), colorfgbg.as_deref()))
    }

    /// Report a new system appearance to every subscriber
    pub fn set_dark(&self, dark: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != dark;
            *current = dark;
            changed
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl AppearanceSignal for WatchAppearance {
    fn is_dark(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

fn detect_dark(forced: Option<&str>, colorfgbg: Option<&str>) -> bool {
    match forced.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "dark" => return true,
        Some(v) if v == "light" => return false,
        _ => {}
    }

    colorfgbg
        .and_then(|v| v.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok())
        .map(|bg| bg <= 6 || bg == 8)
        .unwrap_or(false)
}

/// Active resolution; only the system branch owns a subscription
enum Resolution {
    Fixed,
    System { task: JoinHandle<()> },
}

impl Resolution {
    fn detach(self) {
        if let Resolution::System { task } = self {
            task.abort();
            debug!("Detached from system appearance changes");
        }
    }
}

struct ResolverState {
    preference: ThemePreference,
    active: Option<Resolution>,
}

pub struct ThemeResolver {
    signal: Arc<dyn AppearanceSignal>,
    theme: Arc<watch::Sender<Theme>>,
    state: Mutex<ResolverState>,
}

impl ThemeResolver {
    /// Resolve `preference` immediately.
    ///
    /// A `system` preference spawns the subscription task, so it must be
    /// created inside a tokio runtime.
    pub fn new(signal: Arc<dyn AppearanceSignal>, preference: ThemePreference) -> Self {
        let (tx, _) = watch::channel(Theme::Light);
        let theme = Arc::new(tx);
        let active = activate(&signal, &theme, preference);

        Self {
            signal,
            theme,
            state: Mutex::new(ResolverState {
                preference,
                active: Some(active),
            }),
        }
    }

    /// Current resolved theme
    pub fn theme(&self) -> Theme {
        *self.theme.borrow()
    }

    /// Watch the resolved theme
    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.theme.subscribe()
    }

    pub fn preference(&self) -> ThemePreference {
        self.lock_state().preference
    }

    /// Whether a system appearance subscription is currently held
    pub fn is_tracking_system(&self) -> bool {
        matches!(self.lock_state().active, Some(Resolution::System { .. }))
    }

    /// Switch preference; an unchanged preference keeps the current resolution
    pub fn set_preference(&self, preference: ThemePreference) {
        let mut state = self.lock_state();
        if state.active.is_none() || state.preference == preference {
            return;
        }

        if let Some(previous) = state.active.take() {
            previous.detach();
        }
        state.preference = preference;
        state.active = Some(activate(&self.signal, &self.theme, preference));
    }

    /// Detach any subscription. Safe to call more than once.
    pub fn dispose(&self) {
        if let Some(active) = self.lock_state().active.take() {
            active.detach();
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ResolverState> {
        // State is plain data, a poisoned lock is still consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ThemeResolver {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn activate(
    signal: &Arc<dyn AppearanceSignal>,
    theme: &Arc<watch::Sender<Theme>>,
    preference: ThemePreference,
) -> Resolution {
    let fixed = match preference {
        ThemePreference::Light => Some(Theme::Light),
        ThemePreference::Dark => Some(Theme::Dark),
        ThemePreference::System => None,
    };
    if let Some(resolved) = fixed {
        theme.send_replace(resolved);
        return Resolution::Fixed;
    }

    // Subscribe before reading so a flip in between is not lost
    let mut changes = signal.subscribe();
    theme.send_replace(Theme::from_dark(signal.is_dark()));

    let theme = Arc::clone(theme);
    let task = tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let resolved = Theme::from_dark(*changes.borrow_and_update());
            debug!(theme = %resolved, "System appearance changed");
            theme.send_replace(resolved);
        }
    });

    Resolution::System { task }
}
