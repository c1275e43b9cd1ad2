//! Outbound alert delivery.

pub mod pushover;

pub use pushover::{Ack, AlertDispatcher, PushoverDispatcher};
