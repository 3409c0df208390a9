//! HTTP surface: public documents, the info API and the payment-gated routes.
//!
//! Gated routes come from a [`RouteRule`] table. Each rule is mounted behind the x402 layer;
//! once the payment is verified its handler logs the payment and redirects to the content.
//! Only the rule's method is gated. Every routing miss, wrong methods included, answers
//! `404 {"error":"Route not found"}`.

use axum::extract::State;
use axum::handler::HandlerWithoutStateExt;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, get, get_service, on};
use axum::{Json, Router, middleware};
use paygate_axum::{PriceTag, X402Middleware};
use paygate_types::facilitator::Facilitator;
use paygate_types::network::Network;
use paygate_types::util::MoneyAmountParseError;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

use crate::access_log::{ClientIp, access_log};
use crate::config::{Config, PaymentConfig};
use crate::explorer::explorer_url;
use crate::payment_tracker::{PaymentRequestLog, PaymentTracker};

/// Read-only state shared by all handlers.
#[derive(Debug)]
pub struct AppState {
    pub payment: PaymentConfig,
    pub tracker: PaymentTracker,
    pub public_dir: PathBuf,
    pub video_file: PathBuf,
}

impl AppState {
    pub fn new(config: &Config, payment: PaymentConfig, tracker: PaymentTracker) -> Self {
        Self {
            payment,
            tracker,
            public_dir: config.public_dir().clone(),
            video_file: config.video_file(),
        }
    }
}

/// Payment terms guarding one route, and where a paid request goes next.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRule {
    pub method: Method,
    pub path: String,
    pub price: String,
    pub network: Network,
    pub redirect_to: String,
    /// Shown to the payer in the 402 challenge.
    pub description: String,
}

impl RouteRule {
    pub fn price_tag(&self, pay_to: Option<String>) -> Result<PriceTag, MoneyAmountParseError> {
        PriceTag::usdc(self.network, pay_to, &self.price)
    }
}

/// The protected routes. Anything not listed here is public.
pub fn route_table(payment: &PaymentConfig) -> Vec<RouteRule> {
    vec![RouteRule {
        method: Method::GET,
        path: "/authenticate".to_string(),
        price: payment.price.clone(),
        network: payment.network,
        redirect_to: "/video-content".to_string(),
        description: format!("Video access for {} on {}", payment.price, payment.network),
    }]
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("Invalid price for {path}: {source}")]
    InvalidPrice {
        path: String,
        #[source]
        source: MoneyAmountParseError,
    },
    #[error("Unsupported method {method} for {path}")]
    UnsupportedMethod { method: Method, path: String },
}

/// Builds the application router, access log included.
pub fn build_router<F>(state: Arc<AppState>, x402: &X402Middleware<F>) -> Result<Router, RouterError>
where
    F: Facilitator + Clone + Send + Sync + 'static,
{
    let mut router = Router::new()
        .route(
            "/",
            get_service(ServeFile::new(state.public_dir.join("index.html"))),
        )
        .route(
            "/payment-info",
            get_service(ServeFile::new(state.public_dir.join("payment-info.html"))),
        )
        .route("/video-content", get_service(ServeFile::new(&state.video_file)))
        .route("/api/payment-info", get(payment_info));

    for rule in route_table(&state.payment) {
        router = mount_rule(router, rule, state.payment.recipient_address.clone(), x402)?;
    }

    let static_files = ServeDir::new(&state.public_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(route_not_found.into_service());

    Ok(router
        .method_not_allowed_fallback(route_not_found)
        .fallback_service(static_files)
        .layer(middleware::from_fn_with_state(
            state.tracker.clone(),
            access_log,
        ))
        .with_state(state))
}

fn mount_rule<F>(
    router: Router<Arc<AppState>>,
    rule: RouteRule,
    pay_to: Option<String>,
    x402: &X402Middleware<F>,
) -> Result<Router<Arc<AppState>>, RouterError>
where
    F: Facilitator + Clone + Send + Sync + 'static,
{
    let price_tag = rule
        .price_tag(pay_to)
        .map_err(|source| RouterError::InvalidPrice {
            path: rule.path.clone(),
            source,
        })?;
    let filter =
        MethodFilter::try_from(rule.method.clone()).map_err(|_| RouterError::UnsupportedMethod {
            method: rule.method.clone(),
            path: rule.path.clone(),
        })?;
    let gate = x402
        .with_price_tag(price_tag)
        .with_description(rule.description.clone())
        .with_mime_type("text/html".to_string());

    let path = rule.path.clone();
    let rule = Arc::new(rule);
    let handler = move |State(state): State<Arc<AppState>>,
                        ClientIp(client_ip): ClientIp,
                        method: Method,
                        uri: Uri| {
        let rule = rule.clone();
        async move { grant_access(&state, &rule, &client_ip, &method, &uri) }
    };
    Ok(router.route(&path, on(filter, handler).route_layer(gate)))
}

/// Runs only after the payment was verified.
fn grant_access(
    state: &AppState,
    rule: &RouteRule,
    client_ip: &str,
    method: &Method,
    uri: &Uri,
) -> Response {
    let recipient = state.payment.recipient_address.as_deref().unwrap_or_default();
    state.tracker.log_payment_request(&PaymentRequestLog {
        client_ip,
        method: method.as_str(),
        path: uri.path(),
        recipient,
        price: &rule.price,
        network: rule.network.as_str(),
    });
    state
        .tracker
        .log_payment_success(recipient, rule.network.as_str());
    (
        StatusCode::FOUND,
        [(header::LOCATION, rule.redirect_to.as_str())],
    )
        .into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentInfo {
    wallet_address: Option<String>,
    network: Network,
    price: String,
    explorer_url: Option<String>,
    facilitator_url: String,
    is_default_address: bool,
}

async fn payment_info(State(state): State<Arc<AppState>>) -> Json<PaymentInfo> {
    let payment = &state.payment;
    Json(PaymentInfo {
        wallet_address: payment.recipient_address.clone(),
        network: payment.network,
        price: payment.price.clone(),
        explorer_url: payment
            .recipient_address
            .as_deref()
            .map(|address| explorer_url(address, payment.network.as_str())),
        facilitator_url: payment.facilitator_url.to_string(),
        is_default_address: payment.is_default_address,
    })
}

async fn route_not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Route not found" })),
    )
}
