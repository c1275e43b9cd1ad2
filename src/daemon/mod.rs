//! Daemon subsystem: monitor loop, signal handling, process record,
//! supervisor, and the service entrypoint that wires them together.

pub mod loop_main;
pub mod pidfile;
pub mod service;
pub mod signals;
pub mod supervisor;
