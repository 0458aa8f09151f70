//! Refresh-run orchestration
//!
//! This module provides:
//! - The run loop: a full ascending sweep over the collection,
//!   followed by a retry pass over everything that failed
//! - Leaky-bucket pacing shared across both phases
//! - The consecutive-failure breaker and its recovery bookkeeping
//! - The watchdog that bounds run duration
//! - The single-flight guard that coalesces concurrent triggers
//!
//! All network specifics live behind the client traits, so the whole
//! run loop is deterministic given scripted clients. That is exactly
//! what the tests at the bottom exploit.

pub mod breaker;
pub mod pacing;
pub mod queue;
pub mod watchdog;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::clients::metadata::MetadataApi;
use crate::clients::supply::SupplySource;
use crate::config::Config;
use crate::metrics::METRICS;
use crate::report::RunReporter;
use crate::schema::{RunStatus, RunSummary, Token};

use breaker::{BreakerTransition, FailureBreaker};
use pacing::LeakyBucket;
use queue::RetryQueue;
use watchdog::RunWatchdog;

// ------------------------------------------------------------
// Settings
// ------------------------------------------------------------

/// Everything one run needs to know, detached from the full `Config`
/// so tests can construct it directly.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub contract: String,
    pub first_token_id: u64,
    pub bucket_size: u64,
    pub leak: Duration,
    pub retry_leak: Duration,
    pub fail_limit: u32,
    pub recovery_period: u32,
    pub max_runtime: Duration,
}

impl RefreshSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            contract: cfg.collection.contract.clone(),
            first_token_id: cfg.collection.first_token_id,
            bucket_size: cfg.pacing.bucket_size,
            leak: cfg.pacing.leak(),
            retry_leak: cfg.pacing.retry_leak(),
            fail_limit: cfg.breaker.fail_limit,
            recovery_period: cfg.breaker.recovery_period,
            max_runtime: cfg.run.max_runtime(),
        }
    }
}

// ------------------------------------------------------------
// Run state
// ------------------------------------------------------------

/// Mutable state of one run. Built fresh when a run starts and owned
/// exclusively by the run loop; nothing here outlives the run.
struct RunState {
    bucket: LeakyBucket,
    breaker: FailureBreaker,
    queue: RetryQueue,
    items_fetched: u64,
}

impl RunState {
    fn new(settings: &RefreshSettings) -> Self {
        Self {
            bucket: LeakyBucket::new(settings.bucket_size),
            breaker: FailureBreaker::new(settings.fail_limit, settings.recovery_period),
            queue: RetryQueue::new(),
            items_fetched: 0,
        }
    }
}

/// RAII release of the single-flight flag.
///
/// Held for the whole run and dropped only after the summary has been
/// emitted, so a trigger arriving during emission is still coalesced.
struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ------------------------------------------------------------
// Orchestrator
// ------------------------------------------------------------

/// Drives metadata refresh runs end to end.
///
/// DESIGN:
/// - At most one run at a time; concurrent triggers are no-ops that
///   report "already in progress"
/// - A run is a strictly sequential chain of suspending steps (one
///   request, one optional delay, repeat), never per-item parallelism,
///   so the pacing contract holds by construction
/// - The watchdog cancels through a token raced against the run loop,
///   which abandons the loop at whatever suspension point it is in
/// - Exactly one summary is emitted per run, whichever way it ends
///
/// THREADING:
/// - Shared across the HTTP trigger and the timer via `Arc`
/// - The single-flight flag is the only cross-task state
pub struct Refresher {
    settings: RefreshSettings,
    api: Arc<dyn MetadataApi>,
    supply: Arc<dyn SupplySource>,
    reporter: Arc<dyn RunReporter>,
    in_flight: Arc<AtomicBool>,
}

impl Refresher {
    pub fn new(
        settings: RefreshSettings,
        api: Arc<dyn MetadataApi>,
        supply: Arc<dyn SupplySource>,
        reporter: Arc<dyn RunReporter>,
    ) -> Self {
        Self {
            settings,
            api,
            supply,
            reporter,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts a run on a fresh task.
    ///
    /// Returns whether this trigger won the single-flight flag;
    /// `false` means a run is already active and nothing was started.
    pub fn spawn_run(self: Arc<Self>) -> bool {
        let Some(guard) = self.try_claim() else {
            METRICS.triggers_rejected.fetch_add(1, Ordering::Relaxed);
            info!("refresh already in progress, trigger ignored");
            return false;
        };

        tokio::spawn(async move {
            self.execute(guard).await;
        });
        true
    }

    /// Runs to completion on the calling task. Returns `None` when a
    /// run is already active.
    pub async fn run(&self) -> Option<RunSummary> {
        let guard = self.try_claim()?;
        Some(self.execute(guard).await)
    }

    /// The single-flight gate: exactly one caller can flip the flag
    /// from idle to active; everyone else backs off.
    fn try_claim(&self) -> Option<FlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then(|| FlightGuard(Arc::clone(&self.in_flight)))
    }

    /// One full run: report start, race the two sweep phases against
    /// the watchdog, emit the summary, release the flag.
    async fn execute(&self, guard: FlightGuard) -> RunSummary {
        METRICS.runs_started.fetch_add(1, Ordering::Relaxed);
        self.reporter.run_started().await;

        let started_at = Utc::now();
        let start = Instant::now();

        let cancel = CancellationToken::new();
        let _watchdog = RunWatchdog::arm(self.settings.max_runtime, cancel.clone());

        let mut state = RunState::new(&self.settings);

        let (status, error_detail) = tokio::select! {
            outcome = self.drive(&mut state) => match outcome {
                Ok(()) => (RunStatus::Completed, None),
                Err(err) => {
                    error!("run failed: {err:#}");
                    (RunStatus::Failed, Some(format!("{err:#}")))
                }
            },
            () = cancel.cancelled() => (RunStatus::TimedOut, None),
        };

        let summary = RunSummary {
            status,
            started_at,
            elapsed_seconds: start.elapsed().as_secs_f64(),
            total_requests: state.bucket.sent(),
            total_recovery_periods: state.breaker.periods_started(),
            total_items_fetched: state.items_fetched,
            error_detail,
        };

        match status {
            RunStatus::Completed => METRICS.runs_completed.fetch_add(1, Ordering::Relaxed),
            RunStatus::TimedOut => METRICS.runs_timed_out.fetch_add(1, Ordering::Relaxed),
            RunStatus::Failed => METRICS.runs_failed.fetch_add(1, Ordering::Relaxed),
        };

        info!("{}", summary.log_line());
        self.reporter.emit(&summary).await;

        // released only after the summary is out
        drop(guard);

        summary
    }

    /// Both run phases in sequence. Per-item failures are absorbed
    /// here; only the range lookup can error the run out.
    async fn drive(&self, state: &mut RunState) -> anyhow::Result<()> {
        let s = &self.settings;

        let last = self
            .supply
            .last_token_id()
            .await
            .context("totalSupply lookup failed")?;

        info!(
            "refreshing {} tokens {}..={}",
            s.contract, s.first_token_id, last
        );

        // --------------------------------------------------
        // Phase 1: sweep every id in ascending order
        // --------------------------------------------------
        for id in s.first_token_id..=last {
            let token = Token {
                id,
                contract: s.contract.clone(),
            };

            self.attempt(&token, state).await;
            state.items_fetched += 1;
            METRICS.items_fetched.fetch_add(1, Ordering::Relaxed);

            state.bucket.pace(s.leak).await;
        }

        // --------------------------------------------------
        // Phase 2: drain the retry queue, most recent first
        // --------------------------------------------------
        //
        // A token that fails again goes back on top and is retried
        // immediately; the watchdog bounds the loop.
        //
        if !state.queue.is_empty() {
            info!("{} failed tokens queued for retry", state.queue.len());
        }

        while let Some(token) = state.queue.pop() {
            info!("retrying token #{}", token.id);
            METRICS.retries_attempted.fetch_add(1, Ordering::Relaxed);

            self.attempt(&token, state).await;

            state.bucket.pace(s.retry_leak).await;
        }

        Ok(())
    }

    /// One request, with the failure bookkeeping shared by both
    /// phases: queue on failure, feed the breaker, log transitions.
    async fn attempt(&self, token: &Token, state: &mut RunState) {
        METRICS.requests_sent.fetch_add(1, Ordering::Relaxed);

        let success = match self.api.refresh(token).await {
            Ok(()) => {
                debug!("token #{} refreshed", token.id);
                true
            }
            Err(err) => {
                warn!("token #{} refresh failed: {err}", token.id);
                METRICS.item_failures.fetch_add(1, Ordering::Relaxed);
                state.queue.push(token.clone());
                false
            }
        };

        match state.breaker.record(success) {
            Some(BreakerTransition::RecoveryStarted) => {
                METRICS.recovery_periods.fetch_add(1, Ordering::Relaxed);
                warn!("consecutive failure limit reached, starting recovery period");
            }
            Some(BreakerTransition::RecoveryEnded) => {
                info!("recovery period complete, returning to full speed");
            }
            None => {}
        }
    }
}
