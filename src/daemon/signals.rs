//! Signal handling for the running daemon.
//!
//! Handlers run on a dedicated signal-hook iterator thread and only ever log
//! or clear the [`RunState`] flag. They never touch the recording file or the
//! process record; the loop removes the record itself on exit.

use std::thread::JoinHandle;

use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGUSR1};
use signal_hook::iterator::{Handle, Signals};

use crate::core::errors::{NoisedError, Result};
use crate::daemon::loop_main::RunState;

const HANDLED: [i32; 3] = [SIGTERM, SIGINT, SIGUSR1];

/// What a delivered signal means to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Stop,
    Probe,
    Ignore,
}

/// Map a raw signal number onto the daemon's reaction.
#[must_use]
pub fn classify(signal: i32) -> SignalAction {
    match signal {
        SIGTERM | SIGINT => SignalAction::Stop,
        SIGUSR1 => SignalAction::Probe,
        _ => SignalAction::Ignore,
    }
}

/// Keeps the signal thread alive; closing it on drop.
pub struct SignalGuard {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalGuard {
    /// Install stop and probe handlers for `run_state`.
    pub fn install(run_state: RunState) -> Result<Self> {
        let mut signals = Signals::new(HANDLED).map_err(|e| NoisedError::Runtime {
            details: format!("cannot install signal handlers: {e}"),
        })?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("noised-signals".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    match classify(signal) {
                        SignalAction::Probe => tracing::debug!("listening"),
                        SignalAction::Stop => {
                            tracing::info!(signal, "stopping");
                            run_state.request_stop();
                        }
                        SignalAction::Ignore => {}
                    }
                }
            })
            .map_err(|e| NoisedError::Runtime {
                details: format!("cannot spawn signal thread: {e}"),
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn signals_map_to_actions() {
        assert_eq!(classify(SIGTERM), SignalAction::Stop);
        assert_eq!(classify(SIGINT), SignalAction::Stop);
        assert_eq!(classify(SIGUSR1), SignalAction::Probe);
        assert_eq!(classify(signal_hook::consts::signal::SIGHUP), SignalAction::Ignore);
    }

    #[test]
    fn probe_then_stop_only_stop_clears_flag() {
        let run_state = RunState::new();
        let guard = SignalGuard::install(run_state.clone()).unwrap();

        signal_hook::low_level::raise(SIGUSR1).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert!(run_state.is_running(), "probe must not change state");

        signal_hook::low_level::raise(SIGTERM).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while run_state.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!run_state.is_running());
        drop(guard);
    }
}
