//! Monitor loop: sample, compare, alert, cool down, repeat until stopped.
//!
//! ```text
//!   RUNNING ──(cycle)──▶ RUNNING
//!      │
//!      │ stop signal (observed at the top of the next cycle)
//!      ▼
//!   STOPPING ──(remove process record, log shutdown)──▶ STOPPED
//! ```
//!
//! A cycle is never interrupted: a stop request that arrives while the
//! sampler is recording or the loop is cooling down is honoured once that
//! cycle finishes, so shutdown latency is bounded by one sample duration plus
//! one cooldown.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Local;

use crate::alert::AlertDispatcher;
use crate::audio::Sampler;
use crate::core::config::MonitorConfig;
use crate::daemon::pidfile::ProcessRecord;

/// Timestamp format used for the start/stop banners.
pub const BANNER_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Shared run flag. Starts `true`; once cleared it cannot be set again.
#[derive(Debug, Clone)]
pub struct RunState {
    running: Arc<AtomicBool>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Async-signal-safe: a single atomic store.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Lifecycle of one loop instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// Threshold breached; dispatch attempted and cooldown served.
    Alerted { amplitude: f64, delivered: bool },
    Quiet { amplitude: f64 },
    /// Sampling failed; handled like a quiet cycle.
    SampleFailed,
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u64,
    pub alerts: u64,
    pub dispatch_failures: u64,
    pub sample_failures: u64,
}

/// Blocking wait used for the post-alert cooldown.
/// Time left in a sample window after a sampler call that took `elapsed`.
/// Zero when the call used the whole window.
#[must_use]
pub fn retry_pause(sample_duration: Duration, elapsed: Duration) -> Duration {
    sample_duration.saturating_sub(elapsed)
}

pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Real wall-clock sleeper.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Strict comparison: a reading equal to the threshold does not alert.
#[must_use]
pub fn exceeds_threshold(amplitude: f64, threshold: f64) -> bool {
    amplitude > threshold
}

/// The monitor loop. Owns its configuration for its whole lifetime.
pub struct MonitorLoop<S, D, W> {
    config: MonitorConfig,
    message: String,
    sampler: S,
    dispatcher: D,
    sleeper: W,
    run_state: RunState,
    record: Option<ProcessRecord>,
    state: LoopState,
    summary: LoopSummary,
}

impl<S, D, W> MonitorLoop<S, D, W>
where
    S: Sampler,
    D: AlertDispatcher,
    W: Sleeper,
{
    pub fn new(
        config: MonitorConfig,
        message: impl Into<String>,
        sampler: S,
        dispatcher: D,
        sleeper: W,
        run_state: RunState,
    ) -> Self {
        Self {
            config,
            message: message.into(),
            sampler,
            dispatcher,
            sleeper,
            run_state,
            record: None,
            state: LoopState::Running,
            summary: LoopSummary::default(),
        }
    }

    /// Process record to delete on graceful shutdown.
    #[must_use]
    pub fn with_process_record(mut self, record: ProcessRecord) -> Self {
        self.record = Some(record);
        self
    }

    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until the run flag is cleared, then shut down.
    pub fn run(&mut self) -> LoopSummary {
        tracing::info!(
            microphone = %self.config.microphone,
            threshold = self.config.threshold,
            sample_secs = self.config.sample_secs(),
            "monitor loop started"
        );
        while self.state == LoopState::Running {
            if !self.run_state.is_running() {
                self.state = LoopState::Stopping;
                break;
            }
            self.cycle();
        }
        self.shutdown();
        self.summary
    }

    /// One sample/compare/alert pass.
    pub fn cycle(&mut self) -> CycleOutcome {
        self.summary.cycles += 1;
        let started = Instant::now();
        let amplitude = match self.sampler.sample() {
            Ok(amplitude) => amplitude,
            Err(e) => {
                self.summary.sample_failures += 1;
                tracing::warn!(
                    code = e.code(),
                    error = %e,
                    "sampling failed; treating cycle as quiet"
                );
                // Keep the normal cadence when a tool fails early.
                let pause = retry_pause(self.config.sample_duration, started.elapsed());
                if !pause.is_zero() {
                    self.sleeper.sleep(pause);
                }
                return CycleOutcome::SampleFailed;
            }
        };
        if self.config.verbose {
            tracing::debug!(amplitude, "detected amplitude");
        }

        if !exceeds_threshold(amplitude, self.config.threshold) {
            tracing::debug!(amplitude, "no sound detected");
            return CycleOutcome::Quiet { amplitude };
        }

        self.summary.alerts += 1;
        tracing::info!(amplitude, threshold = self.config.threshold, "excessive noise");
        println!("Excessive noise detected");

        let delivered = match self.dispatcher.dispatch(&self.message, &self.config.destination) {
            Ok(ack) => {
                tracing::info!(status = ack.status, request = ?ack.request_id, "alert dispatched");
                true
            }
            Err(e) => {
                self.summary.dispatch_failures += 1;
                tracing::error!(code = e.code(), error = %e, "alert dispatch failed");
                false
            }
        };

        tracing::debug!(cooldown_secs = self.config.cooldown.as_secs(), "cooling down");
        self.sleeper.sleep(self.config.cooldown);
        CycleOutcome::Alerted {
            amplitude,
            delivered,
        }
    }

    fn shutdown(&mut self) {
        self.state = LoopState::Stopping;
        if let Some(record) = self.record.take() {
            if let Err(e) = record.remove() {
                tracing::error!(error = %e, "failed to remove process record");
            }
        }
        self.state = LoopState::Stopped;
        let stamp = Local::now().format(BANNER_TIME_FORMAT);
        tracing::info!(
            cycles = self.summary.cycles,
            alerts = self.summary.alerts,
            "noise monitor stopped at {stamp}"
        );
    }
}
