//! Poll scheduler: one bootstrap sync, then delta passes on a fixed cadence.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──▶ Bootstrapping ──▶ Polling ◀──▶ RunningDelta
//!   │            │              │              │
//!   └────────────┴──────────────┴──────────────┴──▶ Stopped
//! ```
//!
//! Runs execute inline in the scheduler task, so two runs never overlap.
//! Ticks that elapse while a run is executing are skipped (not queued) and
//! counted in the [`SessionSummary`].
//!
//! A stop request is honoured between runs, and between batches of the
//! bootstrap sync. A run in progress is never cut short mid-record.

use std::time::Duration;

use checkpoint::Watermark;
use record_sink::EventSink;
use record_store::RecordStore;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn, Instrument};

use crate::config::SyncConfig;
use crate::sync::{sync_all_safely, sync_new_changes, SyncOutcome};
use crate::SyncError;

/// Capacity of the outcome broadcast; slow subscribers see `Lagged`.
const OUTCOME_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Bootstrapping,
    Polling,
    RunningDelta,
    Stopped,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Bootstrapping => "bootstrapping",
            SchedulerState::Polling => "polling",
            SchedulerState::RunningDelta => "running-delta",
            SchedulerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Totals for a whole sync session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Ticks that started a run (bootstrap attempts and delta passes)
    pub ticks: u64,
    /// Ticks that elapsed while a run was executing
    pub ticks_skipped: u64,
    /// Runs that aborted with an error
    pub failed_runs: u64,
    /// Whether the bootstrap sync ran to completion (or was skipped)
    pub bootstrapped: bool,
    pub records_examined: u64,
    pub records_applied: u64,
    pub records_unchanged: u64,
    pub records_failed: u64,
    pub records_skipped: u64,
    /// Watermark at the time the session ended
    pub watermark: Watermark,
}

impl SessionSummary {
    fn record(&mut self, outcome: &SyncOutcome) {
        self.records_examined += outcome.records_examined;
        self.records_applied += outcome.records_applied;
        self.records_unchanged += outcome.records_unchanged;
        self.records_failed += outcome.records_failed;
        self.records_skipped += outcome.records_skipped;
    }
}

impl std::fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ticks ({} skipped, {} failed), {} examined, {} applied, {} unchanged, {} failed, {} skipped, watermark {}",
            self.ticks,
            self.ticks_skipped,
            self.failed_runs,
            self.records_examined,
            self.records_applied,
            self.records_unchanged,
            self.records_failed,
            self.records_skipped,
            self.watermark
        )
    }
}

/// Observer side of a running session.
struct SessionChannels {
    state: watch::Sender<SchedulerState>,
    watermark: watch::Sender<Watermark>,
    outcomes: broadcast::Sender<SyncOutcome>,
}

impl SessionChannels {
    fn new(start: Watermark) -> Self {
        Self {
            state: watch::channel(SchedulerState::Idle).0,
            watermark: watch::channel(start).0,
            outcomes: broadcast::channel(OUTCOME_CHANNEL_CAPACITY).0,
        }
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }

    fn publish(&self, outcome: &SyncOutcome) {
        self.watermark.send_replace(outcome.new_watermark.clone());
        // No subscribers is fine
        let _ = self.outcomes.send(outcome.clone());
    }
}

/// Run a sync session until `stop` is set to `true` or its sender is dropped.
///
/// Validates `config` first; an invalid configuration is returned before any
/// store is touched. Store outages never end the session: the failed run is
/// logged, the watermark is kept, and the run is retried on the next tick.
pub async fn synchronize<S, K>(
    source: &S,
    sink: &K,
    config: &SyncConfig,
    stop: watch::Receiver<bool>,
) -> Result<SessionSummary, SyncError>
where
    S: RecordStore + ?Sized,
    K: EventSink + ?Sized,
{
    config.validate()?;
    let channels = SessionChannels::new(config.start_from.clone().unwrap_or_default());
    run_session(source, sink, config, stop, &channels).await
}

async fn run_session<S, K>(
    source: &S,
    sink: &K,
    config: &SyncConfig,
    mut stop: watch::Receiver<bool>,
    channels: &SessionChannels,
) -> Result<SessionSummary, SyncError>
where
    S: RecordStore + ?Sized,
    K: EventSink + ?Sized,
{
    let span = tracing::info_span!("synchronize");

    async move {
        // Only react to changes made after the session started
        let already_stopped = *stop.borrow_and_update();

        let mut summary = SessionSummary {
            bootstrapped: config.start_from.is_some(),
            watermark: config.start_from.clone().unwrap_or_default(),
            ..Default::default()
        };

        info!(
            "Starting sync session (page size: {}, poll interval: {:?}, watermark: {})",
            config.page_size, config.poll_interval, summary.watermark
        );
        if summary.bootstrapped {
            info!("Seed watermark given, skipping bootstrap sync");
        }

        let mut timer = tokio::time::interval(config.poll_interval);
        // Skip missed ticks instead of bursting to catch up
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick: Option<Instant> = None;

        if !already_stopped {
            loop {
                channels.set_state(SchedulerState::Polling);

                let scheduled = tokio::select! {
                    biased;

                    result = stop.changed() => {
                        if result.is_err() || *stop.borrow() {
                            info!("Stop signal received");
                            break;
                        }
                        continue;
                    }

                    scheduled = timer.tick() => scheduled,
                };

                if let Some(previous) = last_tick {
                    summary.ticks_skipped += missed_ticks(previous, scheduled, config.poll_interval);
                }
                last_tick = Some(scheduled);
                summary.ticks += 1;

                let result = if summary.bootstrapped {
                    channels.set_state(SchedulerState::RunningDelta);
                    debug!("Tick {}: delta pass from {}", summary.ticks, summary.watermark);
                    sync_new_changes(
                        source,
                        sink,
                        &config.change_predicate,
                        summary.watermark.clone(),
                    )
                    .await
                } else {
                    channels.set_state(SchedulerState::Bootstrapping);
                    debug!("Tick {}: bootstrap sync", summary.ticks);
                    sync_all_safely(
                        source,
                        sink,
                        &config.change_predicate,
                        config.page_size,
                        None,
                        summary.watermark.clone(),
                        Some(&stop),
                    )
                    .await
                    .map(|(outcome, cursor)| {
                        if cursor.exhausted {
                            summary.bootstrapped = true;
                        } else {
                            info!("Bootstrap sync paused at offset {}", cursor.offset);
                        }
                        outcome
                    })
                };

                match result {
                    Ok(outcome) => {
                        summary.record(&outcome);
                        summary.watermark = outcome.new_watermark.clone();
                        channels.publish(&outcome);
                    }
                    Err(e) => {
                        summary.failed_runs += 1;
                        if e.is_retryable() {
                            warn!("Sync run failed, retrying on next tick: {e}");
                        } else {
                            channels.set_state(SchedulerState::Stopped);
                            return Err(e);
                        }
                    }
                }
            }
        }

        channels.set_state(SchedulerState::Stopped);
        info!("Sync session stopped: {summary}");
        Ok(summary)
    }
    .instrument(span)
    .await
}

/// Ticks between `previous` and `current` that never fired.
fn missed_ticks(previous: Instant, current: Instant, period: Duration) -> u64 {
    let elapsed = current.saturating_duration_since(previous).as_nanos();
    let periods = elapsed / period.as_nanos().max(1);
    (periods as u64).saturating_sub(1)
}

/// Owns a source and sink and runs a sync session on a tokio task.
pub struct Synchronizer<S, K> {
    source: S,
    sink: K,
    config: SyncConfig,
}

impl<S, K> Synchronizer<S, K>
where
    S: RecordStore + 'static,
    K: EventSink + 'static,
{
    pub fn new(source: S, sink: K, config: SyncConfig) -> Self {
        Self {
            source,
            sink,
            config,
        }
    }

    /// Spawn the session. Must be called from within a tokio runtime.
    pub fn start(self) -> Result<SyncHandle, SyncError> {
        self.config.validate()?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let channels = SessionChannels::new(self.config.start_from.clone().unwrap_or_default());
        let state = channels.state.subscribe();
        let watermark = channels.watermark.subscribe();
        let outcomes = channels.outcomes.clone();

        let task = tokio::spawn(async move {
            let Synchronizer {
                source,
                sink,
                config,
            } = self;
            run_session(&source, &sink, &config, stop_rx, &channels).await
        });

        Ok(SyncHandle {
            stop: stop_tx,
            state,
            watermark,
            outcomes,
            task,
        })
    }
}

/// Handle to a running session. Dropping it stops the session.
pub struct SyncHandle {
    stop: watch::Sender<bool>,
    state: watch::Receiver<SchedulerState>,
    watermark: watch::Receiver<Watermark>,
    outcomes: broadcast::Sender<SyncOutcome>,
    task: JoinHandle<Result<SessionSummary, SyncError>>,
}

impl SyncHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Latest published watermark.
    pub fn watermark(&self) -> Watermark {
        self.watermark.borrow().clone()
    }

    /// Receiver notified whenever the watermark is published.
    pub fn watch_watermark(&self) -> watch::Receiver<Watermark> {
        self.watermark.clone()
    }

    /// Every outcome produced after this call.
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<SyncOutcome> {
        self.outcomes.subscribe()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal stop and wait for the session to wind down.
    pub async fn stop(self) -> Result<SessionSummary, SyncError> {
        let _ = self.stop.send(true);
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Sync session task failed: {e}");
                Err(SyncError::Shutdown)
            }
        }
    }
}
