//! CLI support modules.

pub mod install;
