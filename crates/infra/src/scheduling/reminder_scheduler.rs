//! Poll scheduler driving the calendar sync loop.
//!
//! Interval-based scheduler with explicit lifecycle management: start/stop,
//! a join handle for the spawned task, cancellation token support and a
//! timeout wrapping every tick. The first tick is aligned to the next
//! poll-interval boundary of the wall clock; when a tick overruns the
//! interval, missed ticks are skipped, never bursted.

use std::sync::Arc;
use std::time::Duration;

use chime_core::SyncService;
use chime_domain::constants::DEFAULT_POLL_INTERVAL_SECS;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for the reminder poll scheduler
#[derive(Debug, Clone)]
pub struct ReminderSchedulerConfig {
    /// Interval between sync ticks
    pub interval: Duration,
    /// Ceiling on one tick's execution; an overrunning tick is abandoned
    /// for this cycle
    pub tick_timeout: Duration,
}

impl Default for ReminderSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            tick_timeout: Duration::from_secs(300),
        }
    }
}

/// Interval scheduler that drives [`SyncService::run_tick`]
pub struct ReminderScheduler {
    sync: Arc<SyncService>,
    config: ReminderSchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl ReminderScheduler {
    /// Create a new reminder scheduler
    pub fn new(sync: Arc<SyncService>, config: ReminderSchedulerConfig) -> Self {
        Self {
            sync,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the scheduler
    ///
    /// Spawns a background task that runs the sync tick periodically.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is already running
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(interval = ?self.config.interval, "Starting reminder scheduler");

        // Create a new cancellation token (supports restart after stop)
        self.cancellation_token = CancellationToken::new();

        let sync = Arc::clone(&self.sync);
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::poll_loop(sync, config, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Reminder scheduler started");

        Ok(())
    }

    /// Stop the scheduler gracefully
    ///
    /// Cancels the background task and awaits completion.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is not running
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping reminder scheduler");

        // Cancel background task
        self.cancellation_token.cancel();

        // Await handle with timeout
        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = Duration::from_secs(5);
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })?
                .map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }

        info!("Reminder scheduler stopped");

        Ok(())
    }

    /// Check if scheduler is running
    ///
    /// A scheduler is considered running if it has an active task handle
    /// that hasn't finished.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Delay until the next wall-clock multiple of `interval`
    fn delay_to_boundary(interval: Duration) -> Duration {
        let interval_secs = interval.as_secs().max(1);
        let now = Utc::now().timestamp().max(0) as u64;
        Duration::from_secs(interval_secs - now % interval_secs)
    }

    /// Background poll loop
    async fn poll_loop(
        sync: Arc<SyncService>,
        config: ReminderSchedulerConfig,
        cancel: CancellationToken,
    ) {
        let first_tick = Instant::now() + Self::delay_to_boundary(config.interval);
        let mut ticker = interval_at(first_tick, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Poll loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    Self::run_one_tick(&sync, config.tick_timeout).await;
                }
            }
        }
    }

    async fn run_one_tick(sync: &Arc<SyncService>, tick_timeout: Duration) {
        let started = Instant::now();
        match tokio::time::timeout(tick_timeout, sync.run_tick()).await {
            Ok(Ok(summary)) => {
                info!(
                    synced = summary.users_synced,
                    deferred = summary.users_deferred,
                    degraded = summary.users_degraded,
                    skipped = summary.users_skipped,
                    failed = summary.users_failed,
                    reminders_created = summary.reminders_created,
                    reminders_sent = summary.reminders_sent,
                    reminders_purged = summary.reminders_purged,
                    events_purged = summary.events_purged,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Sync tick completed"
                );
            }
            Ok(Err(err)) => {
                warn!(error = %err, "Sync tick failed");
            }
            Err(_) => {
                warn!(timeout = ?tick_timeout, "Sync tick overran its timeout; abandoned for this cycle");
            }
        }
    }
}

/// Ensure scheduler is stopped when dropped
impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        // Note: Can't check task_handle (async), so check if token is not cancelled
        // This is best-effort cleanup in Drop
        if !self.cancellation_token.is_cancelled() {
            warn!("ReminderScheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
