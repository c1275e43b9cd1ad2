//! ND-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, NoisedError>;

/// Coarse failure classes. The monitor loop only ever survives the
/// sampling and dispatch classes; control failures belong to whoever
/// invoked `stop`/`probe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EnvironmentMissing,
    Configuration,
    SamplingFailure,
    DispatchFailure,
    ControlFailure,
    Runtime,
}

/// Top-level error type for the noise daemon.
#[derive(Debug, Error)]
pub enum NoisedError {
    #[error("[ND-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ND-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ND-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ND-1101] required {what} not found at {path}{hint}")]
    EnvironmentMissing {
        what: &'static str,
        path: PathBuf,
        hint: String,
    },

    #[error("[ND-2001] {stage} failed: {details}")]
    Sampling {
        stage: &'static str,
        details: String,
    },

    #[error("[ND-2002] analysis report has no maximum amplitude field")]
    AmplitudeMissing,

    #[error("[ND-2003] maximum amplitude {raw:?} is not a number")]
    AmplitudeUnparsable { raw: String },

    #[error("[ND-2101] alert dispatch failed: {details}")]
    Dispatch { details: String },

    #[error("[ND-2102] alert endpoint rejected request with status {status}")]
    DispatchRejected { status: u16 },

    #[error("[ND-3001] no running instance found (no process record at {path})")]
    NoRunningInstance { path: PathBuf },

    #[error("[ND-3002] cannot read process record {path}: {details}")]
    ProcessRecordUnreadable { path: PathBuf, details: String },

    #[error("[ND-3003] failed to deliver {signal} to pid {pid}: {details}")]
    SignalDelivery {
        signal: &'static str,
        pid: u32,
        details: String,
    },

    #[error("[ND-3101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ND-3102] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ND-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl NoisedError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ND-1001",
            Self::MissingConfig { .. } => "ND-1002",
            Self::ConfigParse { .. } => "ND-1003",
            Self::EnvironmentMissing { .. } => "ND-1101",
            Self::Sampling { .. } => "ND-2001",
            Self::AmplitudeMissing => "ND-2002",
            Self::AmplitudeUnparsable { .. } => "ND-2003",
            Self::Dispatch { .. } => "ND-2101",
            Self::DispatchRejected { .. } => "ND-2102",
            Self::NoRunningInstance { .. } => "ND-3001",
            Self::ProcessRecordUnreadable { .. } => "ND-3002",
            Self::SignalDelivery { .. } => "ND-3003",
            Self::Serialization { .. } => "ND-3101",
            Self::Io { .. } => "ND-3102",
            Self::Runtime { .. } => "ND-3900",
        }
    }

    /// Failure class used by the loop and the CLI to decide what is fatal.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EnvironmentMissing { .. } => ErrorKind::EnvironmentMissing,
            Self::InvalidConfig { .. } | Self::MissingConfig { .. } | Self::ConfigParse { .. } => {
                ErrorKind::Configuration
            }
            Self::Sampling { .. } | Self::AmplitudeMissing | Self::AmplitudeUnparsable { .. } => {
                ErrorKind::SamplingFailure
            }
            Self::Dispatch { .. } | Self::DispatchRejected { .. } => ErrorKind::DispatchFailure,
            Self::NoRunningInstance { .. }
            | Self::ProcessRecordUnreadable { .. }
            | Self::SignalDelivery { .. } => ErrorKind::ControlFailure,
            Self::Serialization { .. } | Self::Io { .. } | Self::Runtime { .. } => {
                ErrorKind::Runtime
            }
        }
    }

    /// Process exit status for the binary. Always non-zero.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::EnvironmentMissing => 3,
            ErrorKind::ControlFailure
            | ErrorKind::SamplingFailure
            | ErrorKind::DispatchFailure
            | ErrorKind::Runtime => 1,
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for configuration validation failures.
    #[must_use]
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for NoisedError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for NoisedError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for NoisedError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<reqwest::Error> for NoisedError {
    fn from(value: reqwest::Error) -> Self {
        if let Some(status) = value.status() {
            return Self::DispatchRejected {
                status: status.as_u16(),
            };
        }
        Self::Dispatch {
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_embedded_in_messages() {
        let err = NoisedError::NoRunningInstance {
            path: PathBuf::from("/etc/noised/noised.pid"),
        };
        assert!(err.to_string().starts_with(&format!("[{}]", err.code())));
        assert!(err.to_string().contains("no running instance found"));
    }

    #[test]
    fn kinds_follow_failure_class() {
        assert_eq!(
            NoisedError::AmplitudeMissing.kind(),
            ErrorKind::SamplingFailure
        );
        assert_eq!(
            NoisedError::DispatchRejected { status: 500 }.kind(),
            ErrorKind::DispatchFailure
        );
        assert_eq!(
            NoisedError::SignalDelivery {
                signal: "SIGTERM",
                pid: 1,
                details: "ESRCH".into()
            }
            .kind(),
            ErrorKind::ControlFailure
        );
        assert_eq!(
            NoisedError::EnvironmentMissing {
                what: "capture tool",
                path: PathBuf::from("/usr/bin/arecord"),
                hint: String::new(),
            }
            .kind(),
            ErrorKind::EnvironmentMissing
        );
    }

    #[test]
    fn every_error_exits_non_zero() {
        let errors = [
            NoisedError::invalid_config("x"),
            NoisedError::AmplitudeMissing,
            NoisedError::Runtime {
                details: "x".into(),
            },
            NoisedError::NoRunningInstance {
                path: PathBuf::from("/x"),
            },
        ];
        for err in errors {
            assert_ne!(err.exit_code(), 0, "{err}");
        }
    }
}
