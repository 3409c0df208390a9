//! The x402 v1 payment gate in front of a protected service.
//!
//! For every request the gate:
//! - reads the base64 JSON `X-PAYMENT` header,
//! - picks the price tag matching the payment's scheme and network,
//! - asks the facilitator to verify the payment,
//! - runs the protected service,
//! - settles the payment if the service succeeded, and attaches `X-PAYMENT-RESPONSE`.
//!
//! Any failure before the service runs turns into `402 Payment Required` listing the
//! accepted payment requirements, so the client knows what to pay.

use axum_core::extract::Request;
use axum_core::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode, Uri, header};
use paygate_types::facilitator::Facilitator;
use paygate_types::proto::{
    PaymentPayload, PaymentRequired, SettleRequest, SettleResponse, VerifyRequest,
    VerifyResponse, X402Version1,
};
use paygate_types::util::Base64Bytes;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tower::{Service, ServiceExt};
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::{Instrument, instrument};

use crate::price::PriceTag;

/// Request header carrying the buyer's payment.
pub const PAYMENT_HEADER: &str = "X-PAYMENT";
/// Response header carrying the settlement result.
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Description of the protected resource as advertised in payment requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub description: String,
    pub mime_type: String,
    pub url: String,
}

/// Builder for [`ResourceInfo`], resolved per request.
#[derive(Debug, Clone)]
pub struct ResourceInfoBuilder {
    pub description: String,
    pub mime_type: String,
    /// Explicit resource URL; derived from the request when unset.
    pub url: Option<String>,
}

impl Default for ResourceInfoBuilder {
    fn default() -> Self {
        Self {
            description: "".to_string(),
            mime_type: "application/json".to_string(),
            url: None,
        }
    }
}

impl ResourceInfoBuilder {
    /// Resolves the resource URL.
    ///
    /// An explicit `url` wins. Otherwise the request path and query are put on `base_url`,
    /// or on `http://localhost` when no base URL is known.
    pub fn as_resource_info(&self, base_url: Option<&Url>, request_uri: &Uri) -> ResourceInfo {
        let url = match (&self.url, base_url) {
            (Some(url), _) => url.clone(),
            (None, Some(base_url)) => {
                let mut url = base_url.clone();
                url.set_path(request_uri.path());
                url.set_query(request_uri.query());
                url.to_string()
            }
            (None, None) => {
                let path_and_query = request_uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                format!("http://localhost{path_and_query}")
            }
        };
        ResourceInfo {
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            url,
        }
    }
}

/// Reasons a request is refused before the protected service runs.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("{0} header is required")]
    PaymentHeaderRequired(&'static str),
    #[error("Invalid or malformed payment header")]
    InvalidPaymentHeader,
    #[error("Unable to find matching payment requirements")]
    NoPaymentMatching,
    #[error("Payment recipient is not configured")]
    RecipientNotConfigured,
    #[error("Verification failed: {0}")]
    VerificationFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PaygateError {
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("Settlement failed: {0}")]
    Settlement(String),
}

/// Payment gate for a single request.
pub struct Paygate<F> {
    pub facilitator: F,
    /// Accepted ways of paying
    pub accepts: Arc<Vec<PriceTag>>,
    pub resource: ResourceInfo,
}

impl<F> Paygate<F>
where
    F: Facilitator,
{
    /// Runs the gate, turning every failure into a `402` response.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.handle_request", skip_all)
    )]
    pub async fn handle_request<S>(self, inner: S, req: Request) -> Result<Response, Infallible>
    where
        S: Service<Request, Response = Response, Error = Infallible>,
        S::Future: Send,
    {
        match self.handle_request_fallible(inner, req).await {
            Ok(response) => Ok(response),
            Err(err) => {
                #[cfg(feature = "telemetry")]
                tracing::debug!(error = %err, "Payment required");
                Ok(self.error_into_response(err))
            }
        }
    }

    /// Runs the gate, returning failures as [`PaygateError`] instead of a `402` response.
    pub async fn handle_request_fallible<S>(
        &self,
        inner: S,
        req: Request,
    ) -> Result<Response, PaygateError>
    where
        S: Service<Request, Response = Response, Error = Infallible>,
        S::Future: Send,
    {
        if !self.accepts.iter().any(PriceTag::has_recipient) {
            return Err(VerificationError::RecipientNotConfigured.into());
        }

        let header = req
            .headers()
            .get(PAYMENT_HEADER)
            .ok_or(VerificationError::PaymentHeaderRequired(PAYMENT_HEADER))?;
        let payment_payload: PaymentPayload = Base64Bytes::from(header.as_bytes())
            .decode_json()
            .map_err(|_| VerificationError::InvalidPaymentHeader)?;

        let verify_request = self.make_verify_request(payment_payload)?;

        let verify_response = self.verify_payment(&verify_request).await?;
        if let VerifyResponse::Invalid { reason, .. } = verify_response {
            return Err(VerificationError::VerificationFailed(reason).into());
        }

        let response = Self::call_inner(inner, req).await;
        if response.status().is_client_error() || response.status().is_server_error() {
            return Ok(response);
        }

        let settlement = self.settle_payment(&verify_request).await?;
        let header_value = settlement_to_header(&settlement)?;

        let mut response = response;
        response
            .headers_mut()
            .insert(PAYMENT_RESPONSE_HEADER, header_value);
        Ok(response)
    }

    /// Pairs the payment with the price tag it claims to satisfy.
    fn make_verify_request(
        &self,
        payment_payload: PaymentPayload,
    ) -> Result<VerifyRequest, VerificationError> {
        let selected = self
            .accepts
            .iter()
            .filter(|price_tag| price_tag.has_recipient())
            .find(|price_tag| {
                price_tag.scheme == payment_payload.scheme
                    && price_tag.network.as_str() == payment_payload.network
            })
            .ok_or(VerificationError::NoPaymentMatching)?;

        Ok(VerifyRequest {
            x402_version: X402Version1,
            payment_payload,
            payment_requirements: selected.to_requirements(&self.resource),
        })
    }

    /// Verifies a payment with the facilitator.
    pub async fn verify_payment(
        &self,
        verify_request: &VerifyRequest,
    ) -> Result<VerifyResponse, VerificationError> {
        self.facilitator
            .verify(verify_request)
            .await
            .map_err(|e| VerificationError::VerificationFailed(format!("{e}")))
    }

    /// Settles a payment with the facilitator. A declined settlement is an error.
    pub async fn settle_payment(
        &self,
        settle_request: &SettleRequest,
    ) -> Result<SettleResponse, PaygateError> {
        let settle_response = self
            .facilitator
            .settle(settle_request)
            .await
            .map_err(|e| PaygateError::Settlement(format!("{e}")))?;
        match settle_response {
            SettleResponse::Error { reason, .. } => Err(PaygateError::Settlement(reason)),
            success => Ok(success),
        }
    }

    async fn call_inner<S>(inner: S, req: Request) -> Response
    where
        S: Service<Request, Response = Response, Error = Infallible>,
        S::Future: Send,
    {
        #[cfg(feature = "telemetry")]
        let result = inner
            .oneshot(req)
            .instrument(tracing::info_span!("inner"))
            .await;
        #[cfg(not(feature = "telemetry"))]
        let result = inner.oneshot(req).await;
        match result {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    fn error_into_response(&self, err: PaygateError) -> Response {
        match err {
            PaygateError::Verification(err) => {
                let payment_required = PaymentRequired {
                    x402_version: X402Version1,
                    accepts: self
                        .accepts
                        .iter()
                        .map(|price_tag| price_tag.to_requirements(&self.resource))
                        .collect(),
                    error: Some(err.to_string()),
                };
                json_response(StatusCode::PAYMENT_REQUIRED, &payment_required)
            }
            PaygateError::Settlement(details) => json_response(
                StatusCode::PAYMENT_REQUIRED,
                &json!({
                    "error": "Settlement failed",
                    "details": details,
                }),
            ),
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (status, [(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Encodes a settlement as the `X-PAYMENT-RESPONSE` header value.
fn settlement_to_header(settlement: &SettleResponse) -> Result<HeaderValue, PaygateError> {
    let payment_header = Base64Bytes::encode_json(settlement)
        .map_err(|err| PaygateError::Settlement(err.to_string()))?;
    HeaderValue::from_bytes(payment_header.as_ref())
        .map_err(|err| PaygateError::Settlement(err.to_string()))
}
