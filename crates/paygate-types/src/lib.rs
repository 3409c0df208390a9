//! Core types for the video paygate.
//!
//! The paygate speaks version 1 of the [x402 protocol](https://www.x402.org): a client
//! asks for a paid resource, receives `402 Payment Required` with the accepted payment
//! terms, signs a USDC transfer authorization and retries with an `X-PAYMENT` header.
//! Verification and settlement of that authorization are the job of a remote
//! facilitator, modelled here by the [`Facilitator`](facilitator::Facilitator) trait.
//!
//! # Modules
//!
//! - [`facilitator`] - The verify/settle capability the payment gate depends on
//! - [`network`] - Known Base networks, their chain ids, explorers and USDC deployments
//! - [`proto`] - x402 v1 wire types (requirements, payloads, verify/settle messages)
//! - [`util`] - Base64 header helper and human-readable price parsing

pub mod facilitator;
pub mod network;
pub mod proto;
pub mod util;
