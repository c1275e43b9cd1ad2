//! Start/stop/probe for the background monitor process.
//!
//! `start` spawns a detached child (own process group, stdio on
//! /dev/null) and returns once the child has published its own pid, which
//! it does only after its signal handlers are installed. `stop` and
//! `probe` read the record and signal whatever pid it names; they do not
//! check that the pid still belongs to a monitor, and a record left behind by
//! a killed process stays until the next graceful stop or manual cleanup.

#![allow(missing_docs)]

use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::core::config::MonitorConfig;
use crate::core::errors::{NoisedError, Result};
use crate::daemon::pidfile::ProcessRecord;

/// Program and arguments for the detached child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl LaunchSpec {
    /// Re-invoke the current executable in hidden `daemon` mode with every
    /// resolved monitor setting passed explicitly.
    pub fn for_current_exe(config_path: Option<&Path>, monitor: &MonitorConfig) -> Result<Self> {
        let program = std::env::current_exe().map_err(|e| NoisedError::Runtime {
            details: format!("cannot locate own executable: {e}"),
        })?;
        Ok(Self {
            program,
            args: daemon_args(config_path, monitor),
        })
    }
}

/// Arguments reproducing `monitor` for the `daemon` subcommand.
#[must_use]
pub fn daemon_args(config_path: Option<&Path>, monitor: &MonitorConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if let Some(path) = config_path {
        args.push("--config".into());
        args.push(path.as_os_str().to_owned());
    }
    args.push("daemon".into());
    args.push("--microphone".into());
    args.push(monitor.microphone.clone().into());
    args.push("--sample".into());
    args.push(monitor.sample_secs().to_string().into());
    args.push("--threshold".into());
    args.push(monitor.threshold.to_string().into());
    args.push("--destination".into());
    args.push(monitor.destination.clone().into());
    if monitor.verbose {
        args.push("--verbose".into());
    }
    args
}

const READY_POLL: Duration = Duration::from_millis(50);

/// Controls the monitor through its process record.
#[derive(Debug, Clone)]
pub struct Supervisor {
    pid_file: PathBuf,
    ready_timeout: Duration,
}

impl Supervisor {
    #[must_use]
    pub fn new(pid_file: impl Into<PathBuf>) -> Self {
        Self {
            pid_file: pid_file.into(),
            ready_timeout: Duration::from_secs(10),
        }
    }

    /// How long `start` waits for the child to publish its pid.
    #[must_use]
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    #[must_use]
    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Spawn the child and wait until the record names it.
    ///
    /// A child that exits first, or stays silent past the ready timeout, is
    /// reported as a startup failure; the latter is sent the stop signal.
    pub fn start(&self, launch: &LaunchSpec) -> Result<ProcessRecord> {
        let mut child = Command::new(&launch.program)
            .args(&launch.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|e| NoisedError::Runtime {
                details: format!("cannot spawn {}: {e}", launch.program.display()),
            })?;
        let pid = child.id();
        tracing::debug!(pid, "started... ({pid})");

        let deadline = Instant::now() + self.ready_timeout;
        loop {
            if let Ok(record) = ProcessRecord::read(&self.pid_file) {
                if record.pid == pid {
                    return Ok(record);
                }
            }
            let exited = child.try_wait().map_err(|e| NoisedError::Runtime {
                details: format!("cannot poll monitor process {pid}: {e}"),
            })?;
            if let Some(status) = exited {
                return Err(NoisedError::Runtime {
                    details: format!("monitor exited during startup ({status}); see the log file"),
                });
            }
            if Instant::now() >= deadline {
                let _ = send_signal(pid, Signal::SIGTERM);
                return Err(NoisedError::Runtime {
                    details: format!(
                        "monitor {pid} did not publish {} within {:?}",
                        self.pid_file.display(),
                        self.ready_timeout
                    ),
                });
            }
            std::thread::sleep(READY_POLL);
        }
    }

    /// Ask the recorded process to stop. Returns as soon as the signal is sent.
    pub fn stop(&self) -> Result<ProcessRecord> {
        tracing::info!("terminating monitor");
        tracing::debug!(path = %self.pid_file.display(), "looking for pid file");
        self.signal_recorded(Signal::SIGTERM)
    }

    /// Ask the recorded process to log a liveness line.
    pub fn probe(&self) -> Result<ProcessRecord> {
        self.signal_recorded(Signal::SIGUSR1)
    }

    fn signal_recorded(&self, sig: Signal) -> Result<ProcessRecord> {
        let record = ProcessRecord::read(&self.pid_file).inspect_err(|e| {
            tracing::error!(error = %e, "cannot read pid file");
        })?;
        send_signal(record.pid, sig)?;
        tracing::debug!(pid = record.pid, signal = sig.as_str(), "signal sent");
        Ok(record)
    }
}

fn send_signal(pid: u32, sig: Signal) -> Result<()> {
    let raw = i32::try_from(pid).map_err(|_| NoisedError::SignalDelivery {
        signal: sig.as_str(),
        pid,
        details: "pid out of range".to_string(),
    })?;
    signal::kill(Pid::from_raw(raw), sig).map_err(|errno| NoisedError::SignalDelivery {
        signal: sig.as_str(),
        pid,
        details: errno.desc().to_string(),
    })
}
