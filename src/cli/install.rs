//! `noised install` / `noised uninstall`.
//!
//! Install writes the config file (keeping one that already exists),
//! prepares the process-record directory, and drops a systemd unit that
//! runs `noised run` in the foreground. Enabling the unit is left to the
//! operator. Uninstall removes the unit and, unless kept, the config.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::config::{Config, DEFAULT_CONFIG_PATH};

/// File name of the generated unit.
pub const UNIT_NAME: &str = "noised.service";

const DEFAULT_UNIT_DIR: &str = "/etc/systemd/system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Planned,
    Done,
    Failed,
}

impl StepStatus {
    fn tag(self) -> &'static str {
        match self {
            Self::Planned => "PLAN",
            Self::Done => "DONE",
            Self::Failed => "FAIL",
        }
    }
}

/// One filesystem action and how it went.
#[derive(Debug, Clone, Serialize)]
pub struct InstallStep {
    pub action: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ordered actions of an install or uninstall run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepLog {
    pub dry_run: bool,
    pub steps: Vec<InstallStep>,
}

impl StepLog {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            steps: Vec::new(),
        }
    }

    /// Record `action`, executing it unless this is a dry run. Returns
    /// false only when the action ran and failed.
    fn apply(&mut self, action: String, op: impl FnOnce() -> io::Result<()>) -> bool {
        let (status, error) = if self.dry_run {
            (StepStatus::Planned, None)
        } else {
            match op() {
                Ok(()) => (StepStatus::Done, None),
                Err(e) => (StepStatus::Failed, Some(e.to_string())),
            }
        };
        self.steps.push(InstallStep {
            action,
            status,
            error,
        });
        status != StepStatus::Failed
    }

    fn note(&mut self, action: String) {
        self.steps.push(InstallStep {
            action,
            status: StepStatus::Done,
            error: None,
        });
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.status != StepStatus::Failed)
    }

    fn render(&self, out: &mut String) {
        for step in &self.steps {
            let _ = writeln!(out, "  [{}] {}", step.status.tag(), step.action);
            if let Some(err) = &step.error {
                let _ = writeln!(out, "         error: {err}");
            }
        }
    }
}

/// Outcome of `noised install`.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub log: StepLog,
    /// Config file in effect after the run (written or kept).
    pub config_path: Option<PathBuf>,
    pub unit_path: Option<PathBuf>,
}

impl InstallReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.log.succeeded()
    }
}

/// Outcome of `noised uninstall`.
pub type UninstallReport = StepLog;

#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Written only when `config_path` does not exist yet.
    pub config: Config,
    pub config_path: PathBuf,
    pub unit_dir: PathBuf,
    /// Binary named in `ExecStart`.
    pub binary: PathBuf,
    pub dry_run: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            config: Config::default(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            unit_dir: PathBuf::from(DEFAULT_UNIT_DIR),
            binary: PathBuf::from("/usr/local/bin/noised"),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UninstallOptions {
    pub keep_config: bool,
    pub dry_run: bool,
    pub config_path: PathBuf,
    pub unit_dir: PathBuf,
}

impl Default for UninstallOptions {
    fn default() -> Self {
        Self {
            keep_config: false,
            dry_run: false,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            unit_dir: PathBuf::from(DEFAULT_UNIT_DIR),
        }
    }
}

/// systemd unit running the monitor in the foreground.
#[must_use]
pub fn render_unit(binary: &Path, config_path: &Path, pid_file: &Path) -> String {
    format!(
        "[Unit]\n\
         Description=Noise detection and alert daemon\n\
         After=sound.target network-online.target\n\
         Wants=network-online.target\n\
         \n\
         [Service]\n\
         Type=simple\n\
         ExecStart={} --config {} run\n\
         PIDFile={}\n\
         KillSignal=SIGTERM\n\
         Restart=on-failure\n\
         RestartSec=5\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        binary.display(),
        config_path.display(),
        pid_file.display(),
    )
}

/// Config, pid directory, unit file, in that order. Stops at the first
/// failure.
pub fn run_install_sequence(opts: &InstallOptions) -> InstallReport {
    let mut report = InstallReport {
        log: StepLog::new(opts.dry_run),
        config_path: None,
        unit_path: None,
    };
    let config_path = &opts.config_path;

    if !opts.dry_run && config_path.exists() {
        report
            .log
            .note(format!("keep existing config {}", config_path.display()));
    } else if !report.log.apply(
        format!("write config {}", config_path.display()),
        || persist_config(&opts.config, config_path),
    ) {
        return report;
    }
    if !opts.dry_run {
        report.config_path = Some(config_path.clone());
    }

    let pid_dir = opts
        .config
        .paths
        .pid_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("/run"));
    if !report.log.apply(
        format!("create pid directory {}", pid_dir.display()),
        || std::fs::create_dir_all(pid_dir),
    ) {
        return report;
    }

    let unit_path = opts.unit_dir.join(UNIT_NAME);
    let unit = render_unit(&opts.binary, config_path, &opts.config.paths.pid_file);
    let written = report
        .log
        .apply(format!("write unit {}", unit_path.display()), || {
            std::fs::create_dir_all(&opts.unit_dir)?;
            std::fs::write(&unit_path, unit)
        });
    if written && !opts.dry_run {
        report.unit_path = Some(unit_path);
    }
    report
}

fn persist_config(config: &Config, path: &Path) -> io::Result<()> {
    let body = config
        .to_toml()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, body)
}

/// Remove the unit and, unless kept, the config. Missing files are not an
/// error. Stopping the running unit is left to the operator.
pub fn run_uninstall_cleanup(opts: &UninstallOptions) -> UninstallReport {
    let mut log = StepLog::new(opts.dry_run);
    remove_artifact(&mut log, "unit", &opts.unit_dir.join(UNIT_NAME));
    if !opts.keep_config {
        remove_artifact(&mut log, "config", &opts.config_path);
    }
    log
}

fn remove_artifact(log: &mut StepLog, label: &str, path: &Path) {
    if !log.dry_run && !path.is_file() {
        log.note(format!("{label} already absent: {}", path.display()));
        return;
    }
    log.apply(format!("remove {label} {}", path.display()), || {
        std::fs::remove_file(path)
    });
}

#[must_use]
pub fn format_install_report(report: &InstallReport) -> String {
    let mut out = String::new();
    let heading = if report.log.dry_run {
        "install plan (dry run)"
    } else {
        "install"
    };
    let _ = writeln!(out, "noised {heading}:");
    report.log.render(&mut out);

    if report.log.dry_run || !report.succeeded() {
        return out;
    }
    if let Some(config) = &report.config_path {
        let _ = writeln!(out, "\n  config: {}", config.display());
    }
    if let Some(unit) = &report.unit_path {
        let _ = writeln!(out, "  unit:   {}", unit.display());
        let _ = writeln!(
            out,
            "\n  Set monitor.microphone, monitor.destination and alert.token, then:\n    \
             systemctl daemon-reload && systemctl enable --now {UNIT_NAME}"
        );
    }
    out
}

#[must_use]
pub fn format_uninstall_report(report: &UninstallReport) -> String {
    let mut out = String::new();
    let heading = if report.dry_run {
        "uninstall plan (dry run)"
    } else {
        "uninstall"
    };
    let _ = writeln!(out, "noised {heading}:");
    report.render(&mut out);
    out
}
