//! One sampling cycle: record a clip with the capture tool, run the analysis
//! tool over it, and pull the peak amplitude out of its text report.

#![allow(missing_docs)]

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::LazyLock;

use regex::Regex;

use crate::core::config::{MonitorConfig, PathsConfig, ToolsConfig};
use crate::core::errors::{NoisedError, Result};

static MAX_AMPLITUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*Maximum amplitude:\s+(\S+)").expect("static regex compiles")
});

/// Source of peak amplitude readings.
pub trait Sampler {
    /// Block for one sample duration and return the clip's peak amplitude.
    fn sample(&mut self) -> Result<f64>;
}

/// Extract the `Maximum amplitude:` field from an analysis report.
pub fn parse_max_amplitude(report: &str) -> Result<f64> {
    let captures = MAX_AMPLITUDE
        .captures(report)
        .ok_or(NoisedError::AmplitudeMissing)?;
    let raw = &captures[1];
    let value: f64 = raw.parse().map_err(|_| NoisedError::AmplitudeUnparsable {
        raw: raw.to_string(),
    })?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NoisedError::AmplitudeUnparsable {
            raw: raw.to_string(),
        })
    }
}

/// ALSA device string for a card id.
#[must_use]
pub fn device_name(card: &str) -> String {
    format!("plughw:{card},0")
}

/// Sampler backed by external arecord/sox style binaries.
#[derive(Debug, Clone)]
pub struct CommandSampler {
    capture: PathBuf,
    analysis: PathBuf,
    device: String,
    duration_secs: u64,
    format: String,
    recording: PathBuf,
}

impl CommandSampler {
    #[must_use]
    pub fn new(monitor: &MonitorConfig, tools: &ToolsConfig, paths: &PathsConfig) -> Self {
        Self {
            capture: tools.capture.clone(),
            analysis: tools.analysis.clone(),
            device: device_name(&monitor.microphone),
            duration_secs: monitor.sample_secs(),
            format: monitor.format.clone(),
            recording: paths.recording_file.clone(),
        }
    }

    /// Same pipeline pointed at an arbitrary card, used by `noised test`.
    #[must_use]
    pub fn for_card(
        card: &str,
        duration_secs: u64,
        format: &str,
        tools: &ToolsConfig,
        paths: &PathsConfig,
    ) -> Self {
        Self {
            capture: tools.capture.clone(),
            analysis: tools.analysis.clone(),
            device: device_name(card),
            duration_secs,
            format: format.to_string(),
            recording: paths.recording_file.clone(),
        }
    }

    fn capture_args(&self) -> Vec<OsString> {
        vec![
            "-D".into(),
            self.device.clone().into(),
            "-d".into(),
            self.duration_secs.to_string().into(),
            "-f".into(),
            self.format.clone().into(),
            "-t".into(),
            "wav".into(),
            self.recording.clone().into_os_string(),
        ]
    }

    fn analysis_args(&self) -> Vec<OsString> {
        vec![
            "-t".into(),
            ".wav".into(),
            self.recording.clone().into_os_string(),
            "-n".into(),
            "stat".into(),
        ]
    }

    /// Record one clip into the shared recording file.
    pub fn capture(&self) -> Result<()> {
        let output = run_tool(&self.capture, &self.capture_args(), "capture")?;
        tracing::trace!(bytes = output.stdout.len(), "capture finished");
        Ok(())
    }

    /// Run the analysis tool and return its full report. The stat report is
    /// written to stderr, so both streams are joined.
    pub fn analyze(&self) -> Result<String> {
        let output = run_tool(&self.analysis, &self.analysis_args(), "analysis")?;
        let mut report = String::from_utf8_lossy(&output.stdout).into_owned();
        report.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(report)
    }
}

impl Sampler for CommandSampler {
    fn sample(&mut self) -> Result<f64> {
        self.capture()?;
        let report = self.analyze()?;
        parse_max_amplitude(&report)
    }
}

fn run_tool(program: &Path, args: &[OsString], stage: &'static str) -> Result<Output> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| NoisedError::Sampling {
            stage,
            details: format!("cannot run {}: {e}", program.display()),
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(NoisedError::Sampling {
            stage,
            details: format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                stderr.trim()
            ),
        });
    }
    Ok(output)
}
