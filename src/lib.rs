//! Noise detection daemon.
//!
//! Periodically records a clip from one microphone through an external
//! capture tool, reads the clip's peak amplitude from an external analysis
//! tool, and pushes a notification when the peak exceeds a threshold. The
//! running monitor is controlled from outside through a pid file and signals.

pub mod alert;
pub mod audio;
pub mod core;
pub mod logger;

#[cfg(feature = "daemon")]
pub mod daemon;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod cli_app;
