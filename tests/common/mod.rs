//! Shared harness for driving the `noised` binary in integration tests.
//!
//! Every case writes its argv, exit status, stdout and stderr to a log file
//! so a failing assertion can point at the full transcript.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

/// Captured result of one CLI invocation.
pub struct CaseResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

const NOISED_VARS: [&str; 6] = [
    "NOISED_PUSHOVER_TOKEN",
    "NOISED_DESTINATION",
    "NOISED_MICROPHONE",
    "NOISED_PID_FILE",
    "NOISED_LOG_FILE",
    "RUST_LOG",
];

fn case_dir() -> PathBuf {
    let dir = std::env::temp_dir().join("noised-cli-tests");
    std::fs::create_dir_all(&dir).expect("create case dir");
    dir
}

/// Run with pid and log files redirected into a per-case scratch location.
pub fn run_cli_case(case: &str, args: &[&str]) -> CaseResult {
    let dir = case_dir();
    let pid = dir.join(format!("{case}.pid"));
    let log = dir.join(format!("{case}.daemon.log"));
    let _ = std::fs::remove_file(&pid);
    run_cli_in(
        case,
        args,
        &[
            ("NOISED_PID_FILE", pid.to_string_lossy().as_ref()),
            ("NOISED_LOG_FILE", log.to_string_lossy().as_ref()),
        ],
    )
}

/// Run with a clean `NOISED_*` environment plus `envs`.
pub fn run_cli_in(case: &str, args: &[&str], envs: &[(&str, &str)]) -> CaseResult {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_noised"));
    cmd.args(args);
    for var in NOISED_VARS {
        cmd.env_remove(var);
    }
    for (key, value) in envs {
        cmd.env(key, value);
    }
    let output = cmd.output().expect("spawn noised");
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    let log_path = case_dir().join(format!("{case}.log"));
    let mut transcript = String::new();
    let _ = writeln!(transcript, "args: {args:?}");
    let _ = writeln!(transcript, "env: {envs:?}");
    let _ = writeln!(transcript, "status: {}", output.status);
    let _ = writeln!(transcript, "--- stdout ---\n{stdout}");
    let _ = writeln!(transcript, "--- stderr ---\n{stderr}");
    let _ = std::fs::write(&log_path, transcript);

    CaseResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
