//! Process-level helpers for the server binary.
//!
//! - [`sig_down`] - Graceful shutdown on SIGTERM/SIGINT
//! - [`telemetry`] - Logging and OpenTelemetry setup

pub mod sig_down;
pub mod telemetry;

pub use sig_down::*;
pub use telemetry::*;
