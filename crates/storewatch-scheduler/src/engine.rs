//! Scheduler engine — runs detection cycles daily and on demand.
//!
//! ```text
//!  Idle ──ready──▶ Waiting ──next instant──▶ Running ──▶ Waiting ...
//!                      ▲                        │
//!                      └────────────────────────┘
//!  manual trigger ─────────────────────────────▶ Running (queued behind any cycle in flight)
//! ```
//!
//! The change detector sits behind an async mutex held for the whole cycle,
//! so scheduled and manual cycles never overlap and never race on the
//! known-key set.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use storewatch_core::config::WatchConfig;
use storewatch_core::error::{Result, WatchError};
use storewatch_core::traits::{Channel, SnapshotSource};
use storewatch_core::{ChangeDetector, NotificationRenderer};
use tokio::sync::{Mutex, watch};

use crate::daily::DailySchedule;
use crate::dispatch::{DispatchReport, Dispatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Waiting,
    Running,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::Waiting => write!(f, "waiting"),
            SchedulerState::Running => write!(f, "running"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Scheduled => write!(f, "scheduled"),
            Trigger::Manual => write!(f, "manual"),
        }
    }
}

/// What one completed cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub trigger: Trigger,
    pub destination: String,
    pub new_records: usize,
    /// Keys dropped because they could not be rendered.
    pub render_skipped: Vec<String>,
    pub dispatch: DispatchReport,
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} new, {} sent, {} failed, {} unrenderable",
            self.new_records,
            self.dispatch.sent.len(),
            self.dispatch.failed.len(),
            self.render_skipped.len()
        );
        if let Some(reason) = &self.dispatch.aborted {
            summary.push_str(&format!(", aborted: {reason}"));
        }
        summary
    }
}

#[derive(Debug, Clone)]
pub struct LastCycle {
    pub trigger: Trigger,
    pub at: DateTime<Utc>,
    pub ok: bool,
    pub outcome: String,
}

/// Observable engine state.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub state: SchedulerState,
    pub known_keys: usize,
    pub next_run: Option<DateTime<Utc>>,
    pub cycles: u64,
    pub last_cycle: Option<LastCycle>,
}

pub struct SchedulerEngine {
    source: Arc<dyn SnapshotSource>,
    renderer: NotificationRenderer,
    dispatcher: Dispatcher,
    schedule: DailySchedule,
    destination: String,
    detector: Mutex<ChangeDetector>,
    looping: AtomicBool,
    status: watch::Sender<EngineStatus>,
}

impl SchedulerEngine {
    /// Build an engine from a validated configuration.
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        channel: Arc<dyn Channel>,
        config: &WatchConfig,
    ) -> Result<Self> {
        Ok(Self::from_parts(
            source,
            NotificationRenderer::new(&config.notify),
            Dispatcher::new(channel, Duration::from_millis(config.notify.pacing_ms)),
            DailySchedule::from_config(&config.schedule)?,
            config.discord.channel_id.clone(),
        ))
    }

    pub fn from_parts(
        source: Arc<dyn SnapshotSource>,
        renderer: NotificationRenderer,
        dispatcher: Dispatcher,
        schedule: DailySchedule,
        destination: impl Into<String>,
    ) -> Self {
        let (status, _) = watch::channel(EngineStatus {
            state: SchedulerState::Idle,
            known_keys: 0,
            next_run: None,
            cycles: 0,
            last_cycle: None,
        });
        Self {
            source,
            renderer,
            dispatcher,
            schedule,
            destination: destination.into(),
            detector: Mutex::new(ChangeDetector::new()),
            looping: AtomicBool::new(false),
            status,
        }
    }

    pub fn schedule(&self) -> &DailySchedule {
        &self.schedule
    }

    /// Configured destination for scheduled cycles.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.subscribe()
    }

    /// Run a cycle right away, delivering to `destination`. Waits for any
    /// cycle already in flight to finish first.
    pub async fn trigger_now(&self, destination: &str) -> Result<CycleReport> {
        self.run_cycle(Trigger::Manual, destination).await
    }

    /// Forget every known key. Serialized against running cycles.
    pub async fn reset(&self) {
        let mut detector = self.detector.lock().await;
        detector.reset();
        self.status.send_modify(|s| s.known_keys = 0);
    }

    /// One fetch → diff → render → dispatch pass. Failures are logged and
    /// returned; they never leave the engine in the Running state.
    pub async fn run_cycle(&self, trigger: Trigger, destination: &str) -> Result<CycleReport> {
        let mut detector = self.detector.lock().await;
        self.status.send_modify(|s| s.state = SchedulerState::Running);
        tracing::info!("Starting {trigger} check");

        let result = self.cycle(&mut detector, trigger, destination).await;

        match &result {
            Ok(report) => tracing::info!("{trigger} check finished: {}", report.summary()),
            Err(e) => tracing::error!("{trigger} check failed: {e}"),
        }

        let idle_state = if self.looping.load(Ordering::SeqCst) {
            SchedulerState::Waiting
        } else {
            SchedulerState::Idle
        };
        let known = detector.known_count();
        self.status.send_modify(|s| {
            s.state = idle_state;
            s.known_keys = known;
            s.cycles += 1;
            s.last_cycle = Some(LastCycle {
                trigger,
                at: Utc::now(),
                ok: result.is_ok(),
                outcome: match &result {
                    Ok(report) => report.summary(),
                    Err(e) => e.to_string(),
                },
            });
        });
        result
    }

    async fn cycle(
        &self,
        detector: &mut ChangeDetector,
        trigger: Trigger,
        destination: &str,
    ) -> Result<CycleReport> {
        let snapshot = self.source.fetch().await?;
        if snapshot.is_empty() {
            return Err(WatchError::EmptySnapshot);
        }

        let delta = detector.diff(snapshot);
        let new_records = delta.len();

        let mut batch = Vec::with_capacity(new_records);
        let mut render_skipped = Vec::new();
        for (key, record) in delta {
            match self.renderer.render(&key, &record) {
                Ok(notification) => batch.push((key, notification)),
                Err(e) => {
                    tracing::warn!("Skipping record: {e}");
                    render_skipped.push(key);
                }
            }
        }

        let dispatch = self.dispatcher.dispatch(destination, &batch).await?;

        Ok(CycleReport {
            trigger,
            destination: destination.to_string(),
            new_records,
            render_skipped,
            dispatch,
            finished_at: Utc::now(),
        })
    }

    /// Wait for `ready` once, then run a cycle at every scheduled instant
    /// until `shutdown` resolves. Cycle failures are logged and the loop
    /// carries on to the next instant.
    pub async fn run(&self, ready: impl Future<Output = ()>, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        tokio::select! {
            _ = ready => {}
            _ = &mut shutdown => return,
        }

        self.looping.store(true, Ordering::SeqCst);
        tracing::info!("Scheduler started: {}", self.schedule.describe());

        let mut previous: Option<DateTime<Utc>> = None;
        loop {
            let now = Utc::now();
            let from = previous.map_or(now, |p| p.max(now));
            let next = self.schedule.next_after(from);
            self.status.send_modify(|s| {
                s.state = SchedulerState::Waiting;
                s.next_run = Some(next);
            });
            tracing::info!(
                "Next check at {} ({})",
                next.with_timezone(&self.schedule.timezone()).format("%Y-%m-%d %H:%M %Z"),
                next.format("%H:%M UTC")
            );

            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => break,
            }

            previous = Some(next);
            let _ = self.run_cycle(Trigger::Scheduled, &self.destination).await;
        }

        self.looping.store(false, Ordering::SeqCst);
        self.status.send_modify(|s| {
            s.state = SchedulerState::Idle;
            s.next_run = None;
        });
        tracing::info!("Scheduler stopped");
    }
}
