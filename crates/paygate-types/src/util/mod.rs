//! Helpers shared by the paygate crates.
//!
//! - [`b64`] - Base64 encoding/decoding of header payloads
//! - [`money_amount`] - Human-readable price parsing and conversion to token units

pub mod b64;
pub mod money_amount;

pub use b64::*;
pub use money_amount::*;
