//! Usage refresh controller
//!
//! Keeps one [`UsageSnapshot`] current. On start the controller fetches
//! immediately, then re-fetches on every tick of its interval timer and on
//! every push hint. Fetches are never deduplicated: each one runs in its own
//! task and settles independently, and the [`ResponseOrdering`] policy decides
//! what a late response may overwrite.
//!
//! The timer and the push subscription live in a single schedule task owned by
//! the controller. Changing the interval or disposing the controller tears that
//! task down as a unit. Fetches already in flight are left to finish; after
//! disposal their results are discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{
    PushChannel, RefreshOptions, RefreshOutcome, ResponseOrdering, SnapshotSource, UsageState,
};
use crate::error::FetchError;
use crate::models::UsageSnapshot;

/// Shortest accepted timer period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// State shared between the controller handle, its schedule and its fetches
struct Shared {
    source: Arc<dyn SnapshotSource>,
    ordering: ResponseOrdering,
    state: watch::Sender<UsageState>,
    next_seq: AtomicU64,
    disposed: AtomicBool,
}

impl Shared {
    async fn refresh(self: Arc<Self>) -> RefreshOutcome {
        if self.disposed.load(Ordering::SeqCst) {
            return RefreshOutcome::Discarded;
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let request_id = Uuid::new_v4();
        let span = info_span!("refresh", %request_id, seq);

        self.state.send_modify(|s| {
            s.in_flight += 1;
            s.refreshing = true;
        });

        let result = self
            .source
            .fetch()
            .instrument(span.clone())
            .await;

        span.in_scope(|| self.settle(seq, result))
    }

    fn settle(&self, seq: u64, result: Result<UsageSnapshot, FetchError>) -> RefreshOutcome {
        if self.disposed.load(Ordering::SeqCst) {
            debug!("Controller disposed, discarding response");
            return RefreshOutcome::Discarded;
        }

        if let Ok(snapshot) = &result {
            for issue in snapshot.validate() {
                warn!(issue = %issue, "Usage snapshot violates its contract");
            }
        }

        let ordering = self.ordering;
        let mut outcome = RefreshOutcome::Superseded;
        self.state.send_modify(|s| {
            s.in_flight = s.in_flight.saturating_sub(1);
            s.refreshing = s.in_flight > 0;

            if ordering == ResponseOrdering::LatestIssued && seq < s.applied_seq {
                return;
            }

            s.loading = false;
            s.applied_seq = seq;
            outcome = match result {
                Ok(snapshot) => {
                    s.snapshot = Some(Arc::new(snapshot));
                    s.error = None;
                    RefreshOutcome::Applied
                }
                Err(e) => {
                    s.error = Some(e.to_string());
                    RefreshOutcome::Failed
                }
            };
        });

        match outcome {
            RefreshOutcome::Applied => debug!("Usage snapshot refreshed"),
            RefreshOutcome::Failed => {
                let state = self.state.borrow();
                let stale = state.snapshot.is_some();
                let error = state.error.as_deref().unwrap_or_default();
                warn!(error = %error, stale, "Usage refresh failed");
            }
            RefreshOutcome::Superseded => debug!("Newer response already applied, dropping this one"),
            RefreshOutcome::Discarded => {}
        }
        outcome
    }

    fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<RefreshOutcome> {
        tokio::spawn(Arc::clone(self).refresh())
    }
}

/// Timer plus push subscription, torn down together
struct Schedule {
    interval: Duration,
    task: JoinHandle<()>,
}

impl Schedule {
    fn start(shared: &Arc<Shared>, push: &dyn PushChannel, interval: Duration) -> Self {
        let hints = push.subscribe();
        let task = tokio::spawn(run_schedule(Arc::clone(shared), hints, interval));
        Self { interval, task }
    }

    fn stop(self) {
        self.task.abort();
    }
}

async fn run_schedule(shared: Arc<Shared>, mut hints: broadcast::Receiver<()>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut listening = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                debug!("Scheduled usage refresh");
                shared.spawn_refresh();
            }
            hint = hints.recv(), if listening => match hint {
                Ok(()) => {
                    debug!("Usage data changed, refreshing");
                    shared.spawn_refresh();
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Missed change hints, refreshing");
                    shared.spawn_refresh();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Push channel closed, polling only");
                    listening = false;
                }
            },
        }
    }
}

/// Owns the refresh loop for one usage snapshot
pub struct RefreshController {
    shared: Arc<Shared>,
    push: Arc<dyn PushChannel>,
    schedule: Mutex<Option<Schedule>>,
}

impl RefreshController {
    /// Start refreshing: fetch now, then on every tick and push hint.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        source: Arc<dyn SnapshotSource>,
        push: Arc<dyn PushChannel>,
        options: RefreshOptions,
    ) -> Self {
        let (state, _) = watch::channel(UsageState::initial());
        let interval = options.interval.max(MIN_INTERVAL);

        info!(
            source = %source.describe(),
            interval_secs = interval.as_secs(),
            ordering = ?options.ordering,
            "Starting usage refresh"
        );

        let shared = Arc::new(Shared {
            source,
            ordering: options.ordering,
            state,
            next_seq: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        });

        let schedule = Schedule::start(&shared, push.as_ref(), interval);
        shared.spawn_refresh();

        Self {
            shared,
            push,
            schedule: Mutex::new(Some(schedule)),
        }
    }

    /// Current state
    pub fn state(&self) -> UsageState {
        self.shared.state.borrow().clone()
    }

    /// Current snapshot, if any fetch has succeeded yet
    pub fn snapshot(&self) -> Option<Arc<UsageSnapshot>> {
        self.shared.state.borrow().snapshot.clone()
    }

    /// Watch the state; every fetch start and settle is a change
    pub fn subscribe(&self) -> watch::Receiver<UsageState> {
        self.shared.state.subscribe()
    }

    pub fn ordering(&self) -> ResponseOrdering {
        self.shared.ordering
    }

    /// Active timer period, `None` once disposed
    pub fn interval(&self) -> Option<Duration> {
        self.lock_schedule().as_ref().map(|s| s.interval)
    }

    /// Fetch now and wait for the result to settle.
    ///
    /// Concurrent calls each perform their own fetch. The fetch keeps running
    /// if the returned future is dropped.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.shared
            .spawn_refresh()
            .await
            .unwrap_or(RefreshOutcome::Discarded)
    }

    /// Restart the timer with a new period and fetch immediately.
    ///
    /// Returns false when the period is unchanged or the controller is
    /// disposed; nothing is restarted in that case.
    pub fn set_interval(&self, interval: Duration) -> bool {
        let interval = interval.max(MIN_INTERVAL);
        let mut schedule = self.lock_schedule();

        let Some(current) = schedule.take() else {
            return false;
        };
        if current.interval == interval {
            *schedule = Some(current);
            return false;
        }

        current.stop();
        *schedule = Some(Schedule::start(&self.shared, self.push.as_ref(), interval));
        drop(schedule);

        info!(interval_secs = interval.as_secs(), "Refresh interval changed");
        self.shared.spawn_refresh();
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// Stop the timer and the push subscription. Safe to call more than once.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(schedule) = self.lock_schedule().take() {
            schedule.stop();
        }
        info!("Usage refresh stopped");
    }

    fn lock_schedule(&self) -> std::sync::MutexGuard<'_, Option<Schedule>> {
        self.schedule.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for RefreshController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::InvalidationHub;
    use crate::test_support;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl SnapshotSource for CountingSource {
        fn fetch(&self) -> BoxFuture<'_, Result<UsageSnapshot, FetchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.fail {
                Err(FetchError::Transport("backend unavailable".to_string()))
            } else {
                Ok(test_support::snapshot())
            };
            futures::future::ready(result).boxed()
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    fn counting(fail: bool) -> Arc<CountingSource> {
        Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn test_initial_fetch_populates_state() {
        let source = counting(false);
        let controller = RefreshController::start(
            source.clone(),
            Arc::new(InvalidationHub::new()),
            RefreshOptions::default(),
        );
        assert!(controller.state().loading);

        let mut rx = controller.subscribe();
        let state = rx.wait_for(|s| !s.loading).await.unwrap().clone();
        assert!(state.snapshot.is_some());
        assert!(state.error.is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_initial_failure_is_blocking() {
        let controller = RefreshController::start(
            counting(true),
            Arc::new(InvalidationHub::new()),
            RefreshOptions::default(),
        );

        let mut rx = controller.subscribe();
        let state = rx.wait_for(|s| !s.loading).await.unwrap().clone();
        assert!(state.is_blocking_error());
        assert_eq!(state.error.as_deref(), Some("backend unavailable"));
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let hub = InvalidationHub::new();
        let controller =
            RefreshController::start(counting(false), Arc::new(hub.clone()), RefreshOptions::default());
        assert!(controller.interval().is_some());

        controller.dispose();
        controller.dispose();
        assert!(controller.is_disposed());
        assert_eq!(controller.interval(), None);
        assert!(!controller.set_interval(Duration::from_secs(60)));
        assert_eq!(controller.refresh().await, RefreshOutcome::Discarded);
    }
}
