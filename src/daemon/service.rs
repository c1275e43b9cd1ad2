//! Service entrypoint: build the real sampler and dispatcher, publish the
//! process record, and run the monitor loop in the current process.
//!
//! The caller installs the [`SignalGuard`](crate::daemon::signals::SignalGuard)
//! for `run_state` before anything else, so the record only ever names a
//! process that survives a stop or probe signal. The record is written after
//! every fallible startup step; a failed startup leaves nothing behind.

use crate::alert::PushoverDispatcher;
use crate::audio::CommandSampler;
use crate::core::config::{Config, MonitorConfig};
use crate::core::errors::Result;
use crate::core::preflight;
use crate::daemon::loop_main::{LoopSummary, MonitorLoop, RunState, ThreadSleeper};
use crate::daemon::pidfile::ProcessRecord;

/// Run the monitor loop until `run_state` is cleared.
pub fn run_monitor(
    config: &Config,
    monitor: MonitorConfig,
    run_state: RunState,
) -> Result<LoopSummary> {
    preflight::check(&config.tools)?;
    let dispatcher = PushoverDispatcher::from_config(config)?;
    let sampler = CommandSampler::new(&monitor, &config.tools, &config.paths);

    if monitor.verbose {
        log_parameters(config, &monitor);
    }

    let record = ProcessRecord::write(&config.paths.pid_file, std::process::id())?;
    let mut monitor_loop = MonitorLoop::new(
        monitor,
        config.alert.message.clone(),
        sampler,
        dispatcher,
        ThreadSleeper,
        run_state,
    )
    .with_process_record(record);
    Ok(monitor_loop.run())
}

fn log_parameters(config: &Config, monitor: &MonitorConfig) {
    tracing::debug!("script parameters configuration:");
    tracing::debug!("sound card id: {}", monitor.microphone);
    tracing::debug!("sample duration: {}", monitor.sample_secs());
    tracing::debug!("output format: {}", monitor.format);
    tracing::debug!("noise threshold: {}", monitor.threshold);
    tracing::debug!(
        "record filename (overwritten): {}",
        config.paths.recording_file.display()
    );
    tracing::debug!("destination: {}", monitor.destination);
}
