//! A [`Facilitator`] that talks to a _remote_ x402 facilitator over HTTP.
//!
//! [`FacilitatorClient`] posts to the `/verify` and `/settle` endpoints of the facilitator.
//! Both endpoints are resolved relative to the base URL, so
//! `https://x402.org/facilitator` becomes `https://x402.org/facilitator/verify`.
//!
//! ```rust
//! use paygate_axum::facilitator_client::FacilitatorClient;
//!
//! let facilitator = FacilitatorClient::try_from("https://x402.org/facilitator").unwrap();
//! assert_eq!(facilitator.verify_url().as_str(), "https://x402.org/facilitator/verify");
//! ```
//!
//! With the `telemetry` feature each call runs in its own span and failures are logged.

use http::{HeaderMap, StatusCode};
use paygate_types::facilitator::Facilitator;
use paygate_types::proto::{SettleRequest, SettleResponse, VerifyRequest, VerifyResponse};
use reqwest::Client;
use std::fmt::Display;
use std::time::Duration;
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::{Instrument, Span};

/// A client for a remote x402 facilitator.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    /// Base URL of the facilitator, always ending with a slash.
    base_url: Url,
    verify_url: Url,
    settle_url: Url,
    client: Client,
    /// Custom headers sent with each request
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl Facilitator for FacilitatorClient {
    type Error = FacilitatorClientError;

    #[cfg(feature = "telemetry")]
    async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        FacilitatorClient::verify(self, request)
            .instrument(tracing::info_span!(
                "x402.facilitator_client.verify",
                timeout = ?self.timeout,
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty,
            ))
            .await
    }

    #[cfg(not(feature = "telemetry"))]
    async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        FacilitatorClient::verify(self, request).await
    }

    #[cfg(feature = "telemetry")]
    async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        FacilitatorClient::settle(self, request)
            .instrument(tracing::info_span!(
                "x402.facilitator_client.settle",
                timeout = ?self.timeout,
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty,
            ))
            .await
    }

    #[cfg(not(feature = "telemetry"))]
    async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        FacilitatorClient::settle(self, request).await
    }
}

/// Errors that can occur while interacting with a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl FacilitatorClient {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    pub fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Constructs a new [`FacilitatorClient`] from a base URL.
    ///
    /// `./verify` and `./settle` are joined onto the base, so the base should end with `/`.
    /// Prefer [`TryFrom<&str>`] which normalizes the trailing slash.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        let verify_url =
            base_url
                .join("./verify")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./verify URL",
                    source: e,
                })?;
        let settle_url =
            base_url
                .join("./settle")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./settle URL",
                    source: e,
                })?;
        Ok(Self {
            client: Client::new(),
            base_url,
            verify_url,
            settle_url,
            headers: HeaderMap::new(),
            timeout: None,
        })
    }

    /// Attaches custom headers to all future requests.
    pub fn with_headers(&self, headers: HeaderMap) -> Self {
        let mut this = self.clone();
        this.headers = headers;
        this
    }

    /// Sets a timeout for all future requests.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = Some(timeout);
        this
    }

    /// Sends a `POST /verify` request to the facilitator.
    pub async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        self.post_json(&self.verify_url, "POST /verify", request)
            .await
    }

    /// Sends a `POST /settle` request to the facilitator.
    pub async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        self.post_json(&self.settle_url, "POST /settle", request)
            .await
    }

    /// POSTs `payload` as JSON and decodes a `200 OK` JSON answer.
    ///
    /// `context` names the call in errors and spans (e.g. `"POST /verify"`).
    async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, FacilitatorClientError>
    where
        T: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let mut req = self.client.post(url.clone()).json(payload);
        for (key, value) in self.headers.iter() {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| FacilitatorClientError::Http { context, source: e })?;

        let result = if http_response.status() == StatusCode::OK {
            http_response
                .json::<R>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
        } else {
            let status = http_response.status();
            let body = http_response
                .text()
                .await
                .map_err(|e| FacilitatorClientError::ResponseBodyRead { context, source: e })?;
            Err(FacilitatorClientError::HttpStatus {
                context,
                status,
                body,
            })
        };

        record_result_on_span(&result);

        result
    }
}

impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Exactly one trailing slash, so relative joins keep the last path segment
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        FacilitatorClient::try_new(url)
    }
}

impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FacilitatorClient::try_from(value.as_str())
    }
}

#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "Request to facilitator failed");
        }
    }
}

#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use paygate_types::proto::{PaymentPayload, PaymentRequirements, X402Version1};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verify_request() -> VerifyRequest {
        VerifyRequest {
            x402_version: X402Version1,
            payment_payload: PaymentPayload {
                x402_version: X402Version1,
                scheme: "exact".to_string(),
                network: "base-sepolia".to_string(),
                payload: json!({ "signature": "0xdead" }),
            },
            payment_requirements: PaymentRequirements {
                scheme: "exact".to_string(),
                network: "base-sepolia".to_string(),
                max_amount_required: "100000".to_string(),
                resource: "http://localhost:4021/authenticate".to_string(),
                description: "Video access".to_string(),
                mime_type: "text/html".to_string(),
                output_schema: None,
                pay_to: "0x60e7daf8b14fe9eb379837ea13522ef7dac6e233".to_string(),
                max_timeout_seconds: 60,
                asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
                extra: None,
            },
        }
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = FacilitatorClient::try_from("https://x402.org/facilitator//").unwrap();
        assert_eq!(client.base_url().as_str(), "https://x402.org/facilitator/");
        assert_eq!(
            client.settle_url().as_str(),
            "https://x402.org/facilitator/settle"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = FacilitatorClient::try_from("not a url").unwrap_err();
        assert!(matches!(err, FacilitatorClientError::UrlParse { .. }));
    }

    #[tokio::test]
    async fn test_verify_posts_request_and_decodes_verdict() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .and(body_partial_json(json!({
                "x402Version": 1,
                "paymentRequirements": { "maxAmountRequired": "100000" }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({
                    "isValid": true,
                    "payer": "0xbuyer"
                })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = FacilitatorClient::try_from(mock_server.uri()).unwrap();
        let verdict = client.verify(&verify_request()).await.unwrap();
        assert_eq!(verdict, VerifyResponse::valid("0xbuyer".to_string()));
    }

    #[tokio::test]
    async fn test_verify_invalid_payment_is_not_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isValid": false,
                "invalidReason": "insufficient_funds"
            })))
            .mount(&mock_server)
            .await;

        let client = FacilitatorClient::try_from(mock_server.uri()).unwrap();
        let verdict = client.verify(&verify_request()).await.unwrap();
        assert_eq!(
            verdict,
            VerifyResponse::invalid(None, "insufficient_funds".to_string())
        );
    }

    #[tokio::test]
    async fn test_settle_returns_transaction() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "payer": "0xbuyer",
                "transaction": "0xabc123",
                "network": "base-sepolia"
            })))
            .mount(&mock_server)
            .await;

        let client = FacilitatorClient::try_from(mock_server.uri()).unwrap();
        let settlement = client.settle(&verify_request()).await.unwrap();
        assert_eq!(settlement.transaction(), Some("0xabc123"));
    }

    #[tokio::test]
    async fn test_non_ok_status_carries_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let client = FacilitatorClient::try_from(mock_server.uri()).unwrap();
        let err = client.settle(&verify_request()).await.unwrap_err();
        match err {
            FacilitatorClientError::HttpStatus { status, body, .. } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_custom_headers_are_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .and(wiremock::matchers::header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isValid": true,
                "payer": "0xbuyer"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "secret".parse().unwrap());
        let client = FacilitatorClient::try_from(mock_server.uri())
            .unwrap()
            .with_headers(headers)
            .with_timeout(Duration::from_secs(5));
        assert!(client.verify(&verify_request()).await.unwrap().is_valid());
    }
}
