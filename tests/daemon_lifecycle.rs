//! End-to-end start/probe/stop against fake capture and analysis tools.

#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    condition()
}

fn log_count(path: &Path, needle: &str) -> usize {
    std::fs::read_to_string(path).map_or(0, |log| log.matches(needle).count())
}

fn log_contains(path: &Path, needle: &str) -> bool {
    log_count(path, needle) > 0
}

/// Scratch install: quiet fake tools, config, pid and log locations.
struct Installation {
    _tmp: tempfile::TempDir,
    config: PathBuf,
    pid_file: PathBuf,
    log_file: PathBuf,
}

impl Installation {
    fn new() -> Self {
        let tmp = tempfile::TempDir::new().unwrap();
        let capture = script(
            tmp.path(),
            "arecord",
            "sleep 1\nfor last; do :; done\n: > \"$last\"",
        );
        let analysis = script(
            tmp.path(),
            "sox",
            "echo 'Maximum amplitude:     0.010000' >&2",
        );
        let cards = tmp.path().join("cards");
        std::fs::write(&cards, " 1 [Device]: USB-Audio\n").unwrap();
        let pid_file = tmp.path().join("run").join("noised.pid");
        let log_file = tmp.path().join("noised.log");
        let config = tmp.path().join("config.toml");
        std::fs::write(
            &config,
            format!(
                "[monitor]\nmicrophone = \"1\"\ndestination = \"user\"\nsample_secs = 1\n\n\
                 [alert]\ntoken = \"test-token\"\n\n\
                 [tools]\ncapture = \"{}\"\nanalysis = \"{}\"\ncards = \"{}\"\n\n\
                 [paths]\npid_file = \"{}\"\nrecording_file = \"{}\"\nlog_file = \"{}\"\n",
                capture.display(),
                analysis.display(),
                cards.display(),
                pid_file.display(),
                tmp.path().join("noise.wav").display(),
                log_file.display(),
            ),
        )
        .unwrap();
        Self {
            _tmp: tmp,
            config,
            pid_file,
            log_file,
        }
    }

    fn cli(&self, case: &str, command: &str) -> common::CaseResult {
        common::run_cli_in(
            case,
            &["--config", self.config.to_str().unwrap(), command],
            &[],
        )
    }

    fn cli_ok(&self, case: &str, command: &str) -> common::CaseResult {
        let result = self.cli(case, command);
        assert!(
            result.status.success(),
            "{command} failed; log: {}",
            result.log_path.display()
        );
        result
    }

    fn recorded_pid(&self) -> u32 {
        let raw = std::fs::read_to_string(&self.pid_file).unwrap();
        raw.trim().parse().expect("record holds a decimal pid")
    }

    fn stop_and_wait(&self, case: &str) {
        self.cli_ok(case, "stop");
        assert!(
            wait_for(Duration::from_secs(15), || !self.pid_file.exists()),
            "process record still present after graceful stop"
        );
        assert!(log_contains(&self.log_file, "noise monitor stopped at"));
    }
}

#[test]
fn start_probe_stop_round_trip() {
    let install = Installation::new();

    let started = install.cli_ok("lifecycle_start", "start");
    assert!(started.stdout.contains("Audio sensing started on"));
    let pid = install.recorded_pid();
    assert!(started.stdout.contains(&pid.to_string()));

    assert!(
        wait_for(Duration::from_secs(15), || log_contains(
            &install.log_file,
            "monitor loop started"
        )),
        "daemon never reached the loop"
    );
    assert!(
        wait_for(Duration::from_secs(15), || log_contains(
            &install.log_file,
            "no sound detected"
        )),
        "daemon never completed a quiet cycle"
    );

    install.cli_ok("lifecycle_probe", "probe");
    assert!(
        wait_for(Duration::from_secs(5), || log_contains(
            &install.log_file,
            "listening"
        )),
        "probe was not logged"
    );
    assert!(install.pid_file.exists(), "probe must not stop the daemon");

    install.stop_and_wait("lifecycle_stop");

    let again = install.cli("lifecycle_stop_again", "stop");
    assert_eq!(again.status.code(), Some(1));
    assert!(again.stderr.contains("no running instance found"));
}

#[test]
fn probe_right_after_start_leaves_daemon_running() {
    let install = Installation::new();

    install.cli_ok("early_probe_start", "start");
    let pid = install.recorded_pid();
    install.cli_ok("early_probe_probe", "probe");

    assert!(
        wait_for(Duration::from_secs(5), || log_contains(
            &install.log_file,
            "listening"
        )),
        "probe was not handled by the daemon"
    );
    // Still sampling after the probe.
    let quiet = log_count(&install.log_file, "no sound detected");
    assert!(
        wait_for(Duration::from_secs(15), || log_count(
            &install.log_file,
            "no sound detected"
        ) > quiet),
        "daemon stopped cycling after the probe"
    );
    assert_eq!(install.recorded_pid(), pid);

    install.stop_and_wait("early_probe_stop");
}

#[test]
fn stop_right_after_start_is_graceful() {
    let install = Installation::new();

    install.cli_ok("early_stop_start", "start");
    install.stop_and_wait("early_stop_stop");
}
