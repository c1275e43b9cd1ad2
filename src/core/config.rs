//! TOML configuration, environment overrides, and the validated
//! [`MonitorConfig`] handed to the monitor loop.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{NoisedError, Result};

/// Location consulted when no `--config` flag is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/noised/config.toml";

/// Fixed alert payload sent on every threshold breach.
pub const DEFAULT_ALERT_MESSAGE: &str = "Excessive noise detected.";

/// Full on-disk configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorSection,
    pub alert: AlertConfig,
    pub tools: ToolsConfig,
    pub paths: PathsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// ALSA card index or name, expanded to `plughw:<card>,0`.
    pub microphone: Option<String>,
    /// Pushover user/group key that receives alerts.
    pub destination: Option<String>,
    pub sample_secs: u32,
    pub threshold: f64,
    /// arecord sample format.
    pub format: String,
    pub cooldown_secs: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            microphone: None,
            destination: None,
            sample_secs: 10,
            threshold: 0.20,
            format: "S16_LE".to_string(),
            cooldown_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub endpoint: String,
    /// Application token. Left empty here; supplied via file or
    /// `NOISED_PUSHOVER_TOKEN`.
    pub token: String,
    pub message: String,
    pub timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.pushover.net/1/messages.json".to_string(),
            token: String::new(),
            message: DEFAULT_ALERT_MESSAGE.to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub capture: PathBuf,
    pub analysis: PathBuf,
    /// Hardware enumeration interface.
    pub cards: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            capture: PathBuf::from("/usr/bin/arecord"),
            analysis: PathBuf::from("/usr/bin/sox"),
            cards: PathBuf::from("/proc/asound/cards"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub pid_file: PathBuf,
    /// Overwritten on every sampling cycle.
    pub recording_file: PathBuf,
    pub log_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            pid_file: PathBuf::from("/etc/noised/noised.pid"),
            recording_file: PathBuf::from("/tmp/noise.wav"),
            log_file: PathBuf::from("/var/log/noise_detector.log"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
        }
    }
}

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorOverrides {
    pub microphone: Option<String>,
    pub sample_secs: Option<u32>,
    pub threshold: Option<f64>,
    pub destination: Option<String>,
    pub verbose: bool,
}

/// Immutable per-instance monitor settings. Built once at startup and
/// moved into the monitor loop.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub microphone: String,
    pub sample_duration: Duration,
    pub threshold: f64,
    pub destination: String,
    pub verbose: bool,
    pub format: String,
    pub cooldown: Duration,
}

impl MonitorConfig {
    /// Whole seconds passed to the capture tool.
    #[must_use]
    pub fn sample_secs(&self) -> u64 {
        self.sample_duration.as_secs()
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_PATH`] is
    /// read if present and built-in defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(NoisedError::MissingConfig {
                        path: path.to_path_buf(),
                    });
                }
                Self::from_file(path)?
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.is_file() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| NoisedError::io(path, e))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `NOISED_*` variables using the supplied lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = non_empty("NOISED_PUSHOVER_TOKEN") {
            self.alert.token = token;
        }
        if let Some(destination) = non_empty("NOISED_DESTINATION") {
            self.monitor.destination = Some(destination);
        }
        if let Some(microphone) = non_empty("NOISED_MICROPHONE") {
            self.monitor.microphone = Some(microphone);
        }
        if let Some(pid_file) = non_empty("NOISED_PID_FILE") {
            self.paths.pid_file = PathBuf::from(pid_file);
        }
        if let Some(log_file) = non_empty("NOISED_LOG_FILE") {
            self.paths.log_file = PathBuf::from(log_file);
        }
    }

    /// Validate the alert section on its own; the daemon refuses to start
    /// with an alert path that could never succeed.
    pub fn validate_alert(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.alert.endpoint).map_err(|e| {
            NoisedError::invalid_config(format!(
                "alert.endpoint {:?} is not a URL: {e}",
                self.alert.endpoint
            ))
        })?;
        if url.scheme() != "https" {
            return Err(NoisedError::invalid_config(format!(
                "alert.endpoint must use https, got {:?}",
                url.scheme()
            )));
        }
        if self.alert.token.trim().is_empty() {
            return Err(NoisedError::invalid_config(
                "alert.token is empty (set it in the config file or NOISED_PUSHOVER_TOKEN)",
            ));
        }
        if self.alert.timeout_secs == 0 {
            return Err(NoisedError::invalid_config(
                "alert.timeout_secs must be at least 1",
            ));
        }
        Ok(())
    }

    /// Merge `overrides` over this configuration and produce a validated
    /// [`MonitorConfig`].
    pub fn monitor_config(&self, overrides: &MonitorOverrides) -> Result<MonitorConfig> {
        let microphone = overrides
            .microphone
            .clone()
            .or_else(|| self.monitor.microphone.clone())
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| NoisedError::invalid_config("microphone id is required (-m)"))?;

        let destination = overrides
            .destination
            .clone()
            .or_else(|| self.monitor.destination.clone())
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| NoisedError::invalid_config("alert destination is required (-e)"))?;

        let sample_secs = overrides.sample_secs.unwrap_or(self.monitor.sample_secs);
        if sample_secs == 0 {
            return Err(NoisedError::invalid_config(
                "sample duration must be at least 1 second",
            ));
        }

        let threshold = overrides.threshold.unwrap_or(self.monitor.threshold);
        validate_threshold(threshold)?;

        if self.monitor.format.trim().is_empty() {
            return Err(NoisedError::invalid_config("monitor.format is empty"));
        }

        Ok(MonitorConfig {
            microphone,
            sample_duration: Duration::from_secs(u64::from(sample_secs)),
            threshold,
            destination,
            verbose: overrides.verbose,
            format: self.monitor.format.clone(),
            cooldown: Duration::from_secs(self.monitor.cooldown_secs),
        })
    }
}

/// Threshold must be a finite value in (0, 1].
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if threshold.is_finite() && threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(NoisedError::invalid_config(format!(
            "noise threshold {threshold} is outside (0, 1]"
        )))
    }
}
