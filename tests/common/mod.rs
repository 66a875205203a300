#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Semaphore;

use claude_pulse::error::{FetchError, SettingsError};
use claude_pulse::live::SnapshotSource;
use claude_pulse::models::{
    CostEstimate, DailyUsage, ModelCost, ModelUsage, UsageSnapshot, WeeklyUsage, WindowUsage,
};
use claude_pulse::settings::{AppSettings, SettingsPersistence};

/// Builder for realistic snapshots
pub struct SnapshotBuilder {
    snapshot: UsageSnapshot,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            snapshot: UsageSnapshot {
                window: WindowUsage {
                    total_input_tokens: 50_000,
                    total_output_tokens: 200_000,
                    total_cache_read_tokens: 500_000,
                    total_cache_creation_tokens: 10_000,
                    message_count: 30,
                    session_count: 2,
                    window_start: "2025-03-12T07:00:00Z".to_string(),
                    window_end: "2025-03-12T12:00:00Z".to_string(),
                },
                weekly: WeeklyUsage {
                    total_input_tokens: 60_000,
                    total_output_tokens: 250_000,
                    total_cache_read_tokens: 600_000,
                    total_cache_creation_tokens: 15_000,
                    message_count: 38,
                    session_count: 3,
                    daily_breakdown: vec![
                        daily("2025-03-10", 50_000),
                        daily("2025-03-12", 200_000),
                    ],
                },
                models: vec![
                    model("claude-sonnet-4-5-20250929", "Sonnet 4.5", 200_000),
                    model("claude-opus-4-5-20251101", "Opus 4.5", 50_000),
                ],
                cost_estimate: CostEstimate {
                    window_cost_usd: 3.2,
                    weekly_cost_usd: 4.5,
                    by_model: vec![
                        cost("claude-sonnet-4-5-20250929", "Sonnet 4.5", 3.0),
                        cost("claude-opus-4-5-20251101", "Opus 4.5", 1.5),
                    ],
                },
                last_updated: "2025-03-12T12:00:00Z".to_string(),
            },
        }
    }

    /// Tag the snapshot so tests can tell responses apart
    pub fn marker(mut self, marker: u64) -> Self {
        self.snapshot.window.message_count = marker;
        self
    }

    pub fn daily_breakdown(mut self, days: Vec<DailyUsage>) -> Self {
        self.snapshot.weekly.total_output_tokens = days.iter().map(|d| d.output_tokens).sum();
        self.snapshot.weekly.daily_breakdown = days;
        self
    }

    pub fn models(mut self, models: Vec<ModelUsage>) -> Self {
        self.snapshot.models = models;
        self
    }

    pub fn last_updated(mut self, ts: &str) -> Self {
        self.snapshot.last_updated = ts.to_string();
        self
    }

    pub fn costs(mut self, window: f64, weekly: f64) -> Self {
        self.snapshot.cost_estimate.window_cost_usd = window;
        self.snapshot.cost_estimate.weekly_cost_usd = weekly;
        self
    }

    pub fn build(self) -> UsageSnapshot {
        self.snapshot
    }
}

pub fn snapshot(marker: u64) -> UsageSnapshot {
    SnapshotBuilder::new().marker(marker).build()
}

pub fn daily(date: &str, output_tokens: u64) -> DailyUsage {
    DailyUsage {
        date: date.to_string(),
        input_tokens: output_tokens / 4,
        output_tokens,
        message_count: 5,
    }
}

pub fn model(id: &str, name: &str, output_tokens: u64) -> ModelUsage {
    ModelUsage {
        model: id.to_string(),
        display_name: name.to_string(),
        input_tokens: output_tokens / 4,
        output_tokens,
        cache_read_tokens: output_tokens * 2,
        cache_creation_tokens: 1_000,
        message_count: 10,
    }
}

pub fn cost(id: &str, name: &str, usd: f64) -> ModelCost {
    ModelCost {
        model: id.to_string(),
        display_name: name.to_string(),
        cost_usd: usd,
    }
}

pub fn write_snapshot(dir: &Path, snapshot: &UsageSnapshot) -> Result<PathBuf> {
    let path = dir.join("usage.json");
    fs::write(&path, serde_json::to_vec_pretty(snapshot)?)?;
    Ok(path)
}

/// One scripted response: wait `delay`, then resolve
pub struct Step {
    pub delay: Duration,
    pub result: Result<UsageSnapshot, String>,
}

impl Step {
    pub fn ok(marker: u64) -> Self {
        Self::ok_after(marker, Duration::ZERO)
    }

    pub fn ok_after(marker: u64, delay: Duration) -> Self {
        Self {
            delay,
            result: Ok(snapshot(marker)),
        }
    }

    pub fn err(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(message.to_string()),
        }
    }
}

/// Source answering from a script; once the script runs out every call
/// succeeds immediately with its call number as marker
#[derive(Default)]
pub struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for ScriptedSource {
    fn fetch(&self) -> BoxFuture<'_, Result<UsageSnapshot, FetchError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::ok(call as u64));

        async move {
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
            step.result.map_err(FetchError::Transport)
        }
        .boxed()
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Settings persistence whose reads and writes can be held back or failed
pub struct TestPersistence {
    stored: Mutex<Option<AppSettings>>,
    load_gate: Option<Arc<Semaphore>>,
    persist_gate: Option<Arc<Semaphore>>,
    fail_persist: bool,
    persist_calls: AtomicUsize,
}

impl TestPersistence {
    pub fn new(stored: Option<AppSettings>) -> Self {
        Self {
            stored: Mutex::new(stored),
            load_gate: None,
            persist_gate: None,
            fail_persist: false,
            persist_calls: AtomicUsize::new(0),
        }
    }

    /// Loads wait until the returned semaphore gets a permit
    pub fn gate_load(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.load_gate = Some(gate.clone());
        (self, gate)
    }

    /// Writes wait until the returned semaphore gets a permit
    pub fn gate_persist(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.persist_gate = Some(gate.clone());
        (self, gate)
    }

    pub fn failing(mut self) -> Self {
        self.fail_persist = true;
        self
    }

    pub fn stored(&self) -> Option<AppSettings> {
        self.stored.lock().unwrap().clone()
    }

    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }
}

impl SettingsPersistence for TestPersistence {
    fn load(&self) -> BoxFuture<'_, Result<AppSettings, SettingsError>> {
        async move {
            if let Some(gate) = &self.load_gate {
                gate.acquire().await.unwrap().forget();
            }
            self.stored()
                .ok_or_else(|| SettingsError::Load("nothing stored".to_string()))
        }
        .boxed()
    }

    fn persist(&self, settings: AppSettings) -> BoxFuture<'_, Result<(), SettingsError>> {
        async move {
            if let Some(gate) = &self.persist_gate {
                gate.acquire().await.unwrap().forget();
            }
            self.persist_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_persist {
                return Err(SettingsError::Persist("disk full".to_string()));
            }
            *self.stored.lock().unwrap() = Some(settings);
            Ok(())
        }
        .boxed()
    }
}

/// Let every ready task run
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
