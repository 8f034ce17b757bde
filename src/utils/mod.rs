//! Shared helpers: logging setup and deadline-bounded polling.

pub mod logger;
pub mod wait;

pub use wait::{Probe, wait_until};
