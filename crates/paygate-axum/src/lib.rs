//! Axum middleware that gates routes behind [x402](https://www.x402.org) v1 payments.
//!
//! A protected route answers `402 Payment Required` with the accepted payment terms until
//! the client retries with a valid `X-PAYMENT` header. Verification and settlement are
//! delegated to a [`Facilitator`](paygate_types::facilitator::Facilitator), usually the
//! remote [`FacilitatorClient`].
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use paygate_axum::{PriceTag, X402Middleware};
//! use paygate_types::network::Network;
//!
//! let x402 = X402Middleware::try_from("https://x402.org/facilitator").unwrap();
//! let price = PriceTag::usdc(
//!     Network::BaseSepolia,
//!     Some("0x60e7daf8b14fe9eb379837ea13522ef7dac6e233".to_string()),
//!     "$0.10",
//! )
//! .unwrap();
//!
//! let app: Router = Router::new().route(
//!     "/premium",
//!     get(|| async { "paid content" }).layer(x402.with_price_tag(price)),
//! );
//! ```

pub mod facilitator_client;
pub mod layer;
pub mod paygate;
pub mod price;

pub use facilitator_client::FacilitatorClient;
pub use layer::X402Middleware;
pub use paygate::{PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER};
pub use price::PriceTag;
