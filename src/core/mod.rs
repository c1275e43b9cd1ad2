//! Core types: configuration, errors, environment preflight.

pub mod config;
pub mod errors;
pub mod preflight;
