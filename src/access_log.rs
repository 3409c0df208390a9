//! Request observer logging every request twice: on receipt and on completion.
//!
//! Installed with [`axum::middleware::from_fn_with_state`] around the whole router, so
//! public routes, gated routes and the fallback are all covered the same way.

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use paygate_axum::PAYMENT_RESPONSE_HEADER;
use paygate_types::proto::SettleResponse;
use paygate_types::util::Base64Bytes;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Instant;

use crate::payment_tracker::PaymentTracker;

const FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_IP: &str = "unknown";

/// Facts about one request, completed when the response is ready.
#[derive(Debug, Clone)]
pub struct RequestLogEntry {
    pub method: Method,
    pub path: String,
    pub started_at: Instant,
    pub status: Option<StatusCode>,
    pub duration_ms: Option<u128>,
    pub client_ip: String,
}

impl RequestLogEntry {
    pub fn start(method: Method, path: String, client_ip: String) -> Self {
        Self {
            method,
            path,
            started_at: Instant::now(),
            status: None,
            duration_ms: None,
            client_ip,
        }
    }

    /// Records the final status and the time elapsed since receipt.
    pub fn complete(&mut self, status: StatusCode) {
        self.status = Some(status);
        self.duration_ms = Some(self.started_at.elapsed().as_millis());
    }
}

/// Client address: connection peer, then first `X-Forwarded-For` hop, then `"unknown"`.
pub fn resolve_client_ip(peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if let Some(peer) = peer {
        return peer.ip().to_string();
    }
    headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_IP)
        .to_string()
}

/// Extractor for the resolved client address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(resolve_client_ip(peer, &parts.headers)))
    }
}

/// Middleware function; see the module docs.
pub async fn access_log(
    State(tracker): State<PaymentTracker>,
    ClientIp(client_ip): ClientIp,
    request: Request,
    next: Next,
) -> Response {
    let mut entry = RequestLogEntry::start(
        request.method().clone(),
        request.uri().path().to_string(),
        client_ip,
    );
    tracker.log_request_received(entry.method.as_str(), &entry.path);

    let response = next.run(request).await;

    if let Some(SettleResponse::Success {
        payer,
        transaction,
        network,
    }) = settlement(&response)
    {
        tracker.log_payment_settled(&payer, &transaction, &network);
    }

    entry.complete(response.status());
    tracker.log_request_completed(&entry);
    response
}

/// Settlement reported by the payment gate, if any.
fn settlement(response: &Response) -> Option<SettleResponse> {
    let header = response.headers().get(PAYMENT_RESPONSE_HEADER)?;
    Base64Bytes::from(header.as_bytes()).decode_json().ok()
}
