//! Push invalidation
//!
//! Out-of-band "usage data changed" hints. The [`InvalidationHub`] is a
//! broadcast channel that any producer of hints can feed; the refresh
//! controller subscribes to it and re-fetches on every hint. With the
//! `fs-watch` feature an [`FsWatcher`] feeds the hub from filesystem events on
//! the assistant's `.jsonl` logs and the snapshot document, debounced so a
//! burst of writes yields one hint.

use std::path::{Path, PathBuf};

use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the hint channel; a lagging receiver still sees a hint
const HINT_CAPACITY: usize = 16;

/// Source of "usage data changed" hints
pub trait PushChannel: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<()>;
}

/// Broadcast hub for invalidation hints
#[derive(Debug, Clone)]
pub struct InvalidationHub {
    tx: broadcast::Sender<()>,
}

impl Default for InvalidationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HINT_CAPACITY);
        Self { tx }
    }

    /// Emit a hint; returns how many subscribers will see it
    pub fn notify(&self) -> usize {
        let receivers = self.tx.send(()).unwrap_or(0);
        trace!(receivers, "Usage data changed");
        receivers
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl PushChannel for InvalidationHub {
    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

/// Whether a changed path should invalidate the snapshot.
///
/// Any `.jsonl` log counts, as does any of the explicitly watched `files`.
pub fn is_relevant_change(path: &Path, files: &[PathBuf]) -> bool {
    if path.extension().map(|ext| ext == "jsonl").unwrap_or(false) {
        return true;
    }
    files
        .iter()
        .any(|f| f == path || (f.file_name().is_some() && f.file_name() == path.file_name()))
}

#[cfg(feature = "fs-watch")]
pub use fs::FsWatcher;

#[cfg(feature = "fs-watch")]
mod fs {
    use std::path::PathBuf;
    use std::time::Duration;

    use anyhow::{Context, Result};
    use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    use super::{is_relevant_change, InvalidationHub};

    /// Filesystem watcher feeding an [`InvalidationHub`]
    ///
    /// Directories are watched recursively for `.jsonl` changes; files are
    /// watched through their parent directory. Dropping the watcher stops both
    /// the OS subscription and the debounce task.
    pub struct FsWatcher {
        _watcher: RecommendedWatcher,
        task: JoinHandle<()>,
    }

    impl FsWatcher {
        pub fn start(targets: &[PathBuf], hub: InvalidationHub, debounce: Duration) -> Result<Self> {
            let filter: Vec<PathBuf> = targets.iter().filter(|p| !p.is_dir()).cloned().collect();
            let (tx, mut rx) = mpsc::unbounded_channel::<()>();

            let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                match res {
                    Ok(event) => {
                        if !matches!(
                            event.kind,
                            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                        ) {
                            return;
                        }
                        if event.paths.iter().any(|p| is_relevant_change(p, &filter)) {
                            let _ = tx.send(());
                        }
                    }
                    Err(e) => warn!(error = %e, "File watch error"),
                }
            })
            .context("Failed to create file watcher")?;

            for target in targets {
                if target.is_dir() {
                    watcher
                        .watch(target, RecursiveMode::Recursive)
                        .with_context(|| format!("Failed to watch {}", target.display()))?;
                } else if let Some(parent) = target.parent().filter(|p| p.is_dir()) {
                    watcher
                        .watch(parent, RecursiveMode::NonRecursive)
                        .with_context(|| format!("Failed to watch {}", parent.display()))?;
                } else {
                    warn!(path = %target.display(), "Skipping watch target that does not exist");
                }
            }

            info!(targets = targets.len(), debounce_ms = debounce.as_millis() as u64, "Watching for usage changes");

            let task = tokio::spawn(async move {
                while rx.recv().await.is_some() {
                    // Collapse the burst into one hint
                    tokio::time::sleep(debounce).await;
                    while rx.try_recv().is_ok() {}
                    debug!("Usage files changed");
                    hub.notify();
                }
            });

            Ok(Self {
                _watcher: watcher,
                task,
            })
        }
    }

    impl Drop for FsWatcher {
        fn drop(&mut self) {
            self.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevant_changes() {
        let files = vec![PathBuf::from("/tmp/pulse/usage.json")];
        assert!(is_relevant_change(Path::new("/home/u/.claude/projects/a/b.jsonl"), &files));
        assert!(is_relevant_change(Path::new("/tmp/pulse/usage.json"), &files));
        assert!(!is_relevant_change(Path::new("/tmp/pulse/usage.json.tmp"), &files));
        assert!(!is_relevant_change(Path::new("/home/u/.claude/settings.json"), &[]));
    }

    #[tokio::test]
    async fn test_hub_fans_out() {
        let hub = InvalidationHub::new();
        assert_eq!(hub.notify(), 0);

        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.notify(), 2);
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[cfg(feature = "fs-watch")]
    #[tokio::test]
    async fn test_fs_watcher_emits_debounced_hint() {
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let hub = InvalidationHub::new();
        let mut rx = hub.subscribe();
        let _watcher =
            FsWatcher::start(&[dir.path().to_path_buf()], hub.clone(), Duration::from_millis(50))
                .unwrap();

        let log = dir.path().join("session.jsonl");
        for i in 0..3 {
            std::fs::write(&log, format!("{{\"n\":{}}}\n", i)).unwrap();
        }

        let hint = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
        assert!(matches!(hint, Ok(Ok(()))));
    }
}
