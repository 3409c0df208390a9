//! Axum middleware for enforcing [x402](https://www.x402.org) payments on protected routes.
//!
//! Requests without a valid `X-PAYMENT` header get a `402 Payment Required` JSON response.
//! Valid payments are settled **after** the protected handler succeeds, so a failing handler
//! never charges the buyer.
//!
//! ## Configuration Notes
//!
//! - **[`X402Middleware::with_price_tag`]** sets the asset and amount accepted for payment.
//! - **[`X402Middleware::with_base_url`]** sets the base URL for computing full resource URLs.
//!   If not set, resource URLs point at `http://localhost`.
//! - **[`X402LayerBuilder::with_description`]** tells the payer what is being paid for.
//! - **[`X402LayerBuilder::with_mime_type`]** sets the MIME type of the protected resource (default: `application/json`).

use axum_core::extract::Request;
use axum_core::response::Response;
use paygate_types::facilitator::Facilitator;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};
use url::Url;

use crate::facilitator_client::{FacilitatorClient, FacilitatorClientError};
use crate::paygate::{Paygate, ResourceInfoBuilder};
use crate::price::PriceTag;

/// Entry point for building payment layers.
///
/// Create one per application and derive a layer per protected route.
#[derive(Clone, Debug)]
pub struct X402Middleware<F> {
    facilitator: F,
    base_url: Option<Url>,
}

impl<F> X402Middleware<F> {
    /// Uses any [`Facilitator`], e.g. a stub in tests.
    pub fn new(facilitator: F) -> Self {
        Self {
            facilitator,
            base_url: None,
        }
    }
}

impl X402Middleware<Arc<FacilitatorClient>> {
    /// Creates a middleware backed by the remote facilitator at `url`.
    pub fn try_new(url: &str) -> Result<Self, FacilitatorClientError> {
        let facilitator = FacilitatorClient::try_from(url)?;
        Ok(Self::new(Arc::new(facilitator)))
    }

    /// Returns the configured facilitator URL.
    pub fn facilitator_url(&self) -> &Url {
        self.facilitator.base_url()
    }
}

impl TryFrom<&str> for X402Middleware<Arc<FacilitatorClient>> {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl<F> X402Middleware<F>
where
    F: Clone,
{
    /// Sets the base URL used to construct resource URLs from request paths.
    pub fn with_base_url(&self, base_url: Url) -> X402Middleware<F> {
        let mut this = self.clone();
        this.base_url = Some(base_url);
        this
    }

    /// Starts a layer that accepts `price_tag`.
    pub fn with_price_tag(&self, price_tag: PriceTag) -> X402LayerBuilder<F> {
        X402LayerBuilder {
            facilitator: self.facilitator.clone(),
            accepts: Arc::new(vec![price_tag]),
            base_url: self.base_url.clone().map(Arc::new),
            resource: Arc::new(ResourceInfoBuilder::default()),
        }
    }
}

/// Builder for configuring the X402 middleware layer.
#[derive(Clone)]
pub struct X402LayerBuilder<F> {
    facilitator: F,
    base_url: Option<Arc<Url>>,
    accepts: Arc<Vec<PriceTag>>,
    resource: Arc<ResourceInfoBuilder>,
}

impl<F> X402LayerBuilder<F> {
    /// Adds another accepted payment option, e.g. on a different network.
    pub fn with_price_tag(mut self, price_tag: PriceTag) -> Self {
        let mut new_accepts = (*self.accepts).clone();
        new_accepts.push(price_tag);
        self.accepts = Arc::new(new_accepts);
        self
    }

    /// Sets a description of what the payment grants access to.
    pub fn with_description(mut self, description: String) -> Self {
        let mut new_resource = (*self.resource).clone();
        new_resource.description = description;
        self.resource = Arc::new(new_resource);
        self
    }

    /// Sets the MIME type of the protected resource.
    pub fn with_mime_type(mut self, mime: String) -> Self {
        let mut new_resource = (*self.resource).clone();
        new_resource.mime_type = mime;
        self.resource = Arc::new(new_resource);
        self
    }
}

impl<S, F> Layer<S> for X402LayerBuilder<F>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    F: Facilitator + Clone,
{
    type Service = X402MiddlewareService<F>;

    fn layer(&self, inner: S) -> Self::Service {
        X402MiddlewareService {
            facilitator: self.facilitator.clone(),
            base_url: self.base_url.clone(),
            accepts: self.accepts.clone(),
            resource: self.resource.clone(),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Axum service that enforces x402 payments on incoming requests.
#[derive(Clone)]
pub struct X402MiddlewareService<F> {
    facilitator: F,
    base_url: Option<Arc<Url>>,
    accepts: Arc<Vec<PriceTag>>,
    resource: Arc<ResourceInfoBuilder>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<F> Service<Request> for X402MiddlewareService<F>
where
    F: Facilitator + Clone + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let gate = Paygate {
            facilitator: self.facilitator.clone(),
            accepts: self.accepts.clone(),
            resource: self
                .resource
                .as_resource_info(self.base_url.as_deref(), req.uri()),
        };
        Box::pin(gate.handle_request(self.inner.clone(), req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paygate::{PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER};
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::StatusCode;
    use axum::routing::get;
    use paygate_types::network::Network;
    use paygate_types::proto::{
        PaymentPayload, SettleRequest, SettleResponse, VerifyRequest, VerifyResponse,
        X402Version1,
    };
    use paygate_types::util::Base64Bytes;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use tower::ServiceExt;

    const PAY_TO: &str = "0x60e7daf8b14fe9eb379837ea13522ef7dac6e233";

    /// Facilitator double that answers with canned verdicts and records what it saw.
    #[derive(Clone)]
    struct StubFacilitator {
        verdict: VerifyResponse,
        settlement: SettleResponse,
        verified: Arc<Mutex<Vec<VerifyRequest>>>,
        settled: Arc<Mutex<Vec<SettleRequest>>>,
    }

    impl StubFacilitator {
        fn approving() -> Self {
            Self {
                verdict: VerifyResponse::valid("0xbuyer".to_string()),
                settlement: SettleResponse::Success {
                    payer: "0xbuyer".to_string(),
                    transaction: "0xabc123".to_string(),
                    network: "base-sepolia".to_string(),
                },
                verified: Arc::default(),
                settled: Arc::default(),
            }
        }

        fn rejecting(reason: &str) -> Self {
            Self {
                verdict: VerifyResponse::invalid(None, reason.to_string()),
                ..Self::approving()
            }
        }

        fn verify_calls(&self) -> usize {
            self.verified.lock().unwrap().len()
        }

        fn settle_calls(&self) -> usize {
            self.settled.lock().unwrap().len()
        }
    }

    impl Facilitator for StubFacilitator {
        type Error = String;

        async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, String> {
            self.verified.lock().unwrap().push(request.clone());
            Ok(self.verdict.clone())
        }

        async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, String> {
            self.settled.lock().unwrap().push(request.clone());
            Ok(self.settlement.clone())
        }
    }

    fn app(facilitator: StubFacilitator, pay_to: Option<&str>) -> Router {
        let price =
            PriceTag::usdc(Network::BaseSepolia, pay_to.map(str::to_string), "$0.10").unwrap();
        let x402 = X402Middleware::new(facilitator)
            .with_base_url("http://localhost:4021/".parse().unwrap());
        Router::new()
            .route(
                "/premium",
                get(|| async { "paid content" }).layer(
                    x402.with_price_tag(price)
                        .with_description("Video access for $0.10".to_string()),
                ),
            )
            .route(
                "/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") })
                    .layer(x402.with_price_tag(
                        PriceTag::usdc(Network::BaseSepolia, Some(PAY_TO.into()), "$0.10")
                            .unwrap(),
                    )),
            )
    }

    fn payment_header(network: &str) -> String {
        let payload = PaymentPayload {
            x402_version: X402Version1,
            scheme: "exact".to_string(),
            network: network.to_string(),
            payload: json!({ "signature": "0xsigned" }),
        };
        Base64Bytes::encode_json(&payload).unwrap().to_string()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn request(path: &str, payment: Option<String>) -> Request {
        let mut builder = axum::http::Request::builder().uri(path);
        if let Some(payment) = payment {
            builder = builder.header(PAYMENT_HEADER, payment);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_payment_yields_challenge() {
        let facilitator = StubFacilitator::approving();
        let response = app(facilitator.clone(), Some(PAY_TO))
            .oneshot(request("/premium", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = json_body(response).await;
        assert_eq!(body["x402Version"], 1);
        assert_eq!(body["error"], "X-PAYMENT header is required");
        let accepted = &body["accepts"][0];
        assert_eq!(accepted["scheme"], "exact");
        assert_eq!(accepted["network"], "base-sepolia");
        assert_eq!(accepted["maxAmountRequired"], "100000");
        assert_eq!(accepted["payTo"], PAY_TO);
        assert_eq!(accepted["resource"], "http://localhost:4021/premium");
        assert_eq!(accepted["description"], "Video access for $0.10");
        assert_eq!(facilitator.verify_calls(), 0);
    }

    #[tokio::test]
    async fn test_garbage_payment_header() {
        let facilitator = StubFacilitator::approving();
        let response = app(facilitator.clone(), Some(PAY_TO))
            .oneshot(request("/premium", Some("%%%".to_string())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid or malformed payment header");
        assert_eq!(facilitator.verify_calls(), 0);
    }

    #[tokio::test]
    async fn test_payment_on_wrong_network() {
        let facilitator = StubFacilitator::approving();
        let response = app(facilitator.clone(), Some(PAY_TO))
            .oneshot(request("/premium", Some(payment_header("base"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Unable to find matching payment requirements");
        assert_eq!(facilitator.verify_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_payment_never_reaches_handler() {
        let facilitator = StubFacilitator::rejecting("insufficient_funds");
        let response = app(facilitator.clone(), Some(PAY_TO))
            .oneshot(request("/premium", Some(payment_header("base-sepolia"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Verification failed: insufficient_funds");
        assert_eq!(facilitator.verify_calls(), 1);
        assert_eq!(facilitator.settle_calls(), 0);
    }

    #[tokio::test]
    async fn test_valid_payment_is_settled_and_reported() {
        let facilitator = StubFacilitator::approving();
        let response = app(facilitator.clone(), Some(PAY_TO))
            .oneshot(request("/premium", Some(payment_header("base-sepolia"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let header = response.headers().get(PAYMENT_RESPONSE_HEADER).unwrap();
        let settlement: SettleResponse =
            Base64Bytes::from(header.as_bytes()).decode_json().unwrap();
        assert_eq!(settlement.transaction(), Some("0xabc123"));

        let verified = facilitator.verified.lock().unwrap();
        assert_eq!(verified[0].payment_requirements.pay_to, PAY_TO);
        assert_eq!(verified[0].payment_requirements.max_amount_required, "100000");
        assert_eq!(facilitator.settle_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_handler_is_not_settled() {
        let facilitator = StubFacilitator::approving();
        let response = app(facilitator.clone(), Some(PAY_TO))
            .oneshot(request("/broken", Some(payment_header("base-sepolia"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(PAYMENT_RESPONSE_HEADER).is_none());
        assert_eq!(facilitator.verify_calls(), 1);
        assert_eq!(facilitator.settle_calls(), 0);
    }

    #[tokio::test]
    async fn test_declined_settlement() {
        let facilitator = StubFacilitator {
            settlement: SettleResponse::Error {
                reason: "nonce already used".to_string(),
                network: "base-sepolia".to_string(),
            },
            ..StubFacilitator::approving()
        };
        let response = app(facilitator, Some(PAY_TO))
            .oneshot(request("/premium", Some(payment_header("base-sepolia"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Settlement failed");
        assert_eq!(body["details"], "nonce already used");
    }

    #[tokio::test]
    async fn test_unconfigured_recipient_rejects_everything() {
        let facilitator = StubFacilitator::approving();
        let response = app(facilitator.clone(), None)
            .oneshot(request("/premium", Some(payment_header("base-sepolia"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Payment recipient is not configured");
        assert_eq!(body["accepts"][0]["payTo"], "");
        assert_eq!(facilitator.verify_calls(), 0);
    }

    #[test]
    fn test_remote_middleware_reports_facilitator_url() {
        let x402 = X402Middleware::try_from("https://x402.org/facilitator").unwrap();
        assert_eq!(
            x402.facilitator_url().as_str(),
            "https://x402.org/facilitator/"
        );
        assert!(X402Middleware::try_from("not a url").is_err());
    }
}
