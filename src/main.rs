//! Video paygate HTTP entrypoint.
//!
//! Endpoints:
//! - `GET /` - Landing page
//! - `GET /payment-info` - Payment instructions page
//! - `GET /api/payment-info` - Recipient, network and price as JSON
//! - `GET /authenticate` - Payment-gated, redirects to the video once paid
//! - `GET /video-content` - The video page
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `WALLET_ADDRESS`, `NETWORK`, `PRICE`, `FACILITATOR_URL` set the payment terms
//! - `HOST`, `PORT` control binding address
//! - `OTEL_*` variables enable trace export

use axum::http::Method;
use dotenvy::dotenv;
use paygate_axum::X402Middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors;

use video_paygate::config::Config;
use video_paygate::payment_tracker::PaymentTracker;
use video_paygate::router::{AppState, build_router};
use video_paygate::util::{SigDown, Telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env variables
    dotenv().ok();

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let config = Config::load()?;
    let payment = config.payment();
    let tracker = PaymentTracker::default();

    let network = payment.network.to_string();
    tracker.log_payment_info(payment.recipient_address.as_deref(), &network);
    match &payment.recipient_address {
        Some(_) if payment.is_default_address => {
            tracker.warn("WALLET_ADDRESS is not set, using the built-in default address")
        }
        Some(_) => tracker.info("Using WALLET_ADDRESS from environment"),
        None => {}
    }

    let x402 = X402Middleware::try_from(payment.facilitator_url.as_str())?
        .with_base_url(config.public_url()?);
    tracing::info!("Using facilitator at {}", x402.facilitator_url());

    let state = Arc::new(AppState::new(&config, payment, tracker.clone()));
    let http_endpoints = build_router(state, &x402)?
        .layer(telemetry.http_tracing())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET])
                .allow_headers(cors::Any)
                .expose_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host(), config.port());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        });
    tracker.info(format!("Server is running on http://{addr}"));

    let sig_down = SigDown::try_new()?;
    let axum_cancellation_token = sig_down.cancellation_token();
    let axum_graceful_shutdown = async move { axum_cancellation_token.cancelled().await };
    axum::serve(
        listener,
        http_endpoints.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(axum_graceful_shutdown)
    .await?;

    Ok(())
}
