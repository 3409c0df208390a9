//! Pay-per-view video gateway built on the [x402 protocol](https://www.x402.org).
//!
//! Public pages are served as static files. Access to the video goes through
//! `GET /authenticate`, which answers `402 Payment Required` until the client attaches a
//! valid `X-PAYMENT` header. Verified payments are settled through a remote facilitator and
//! the client is redirected to the video content.
//!
//! # Modules
//!
//! - [`config`] - CLI/environment configuration and the recipient fallback policy.
//! - [`router`] - Routes, the gated route table and shared application state.
//! - [`payment_tracker`] - Operator-facing log blocks about payments.
//! - [`access_log`] - Per-request receipt and completion logging.
//! - [`explorer`] - Block explorer links for wallets and transactions.
//! - [`util`] - Telemetry setup and graceful shutdown.

pub mod access_log;
pub mod config;
pub mod explorer;
pub mod payment_tracker;
pub mod router;
pub mod util;
