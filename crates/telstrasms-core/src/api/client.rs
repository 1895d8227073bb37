//! API client for the Telstra Messaging API.
//!
//! `ApiClient` performs one HTTP round trip per operation and classifies every
//! failure into an [`ApiError`]. The workflows only see the [`SmsApi`] trait so
//! they can run against scripted providers in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::{ApiError, Operation};
use super::types::{
    Bearer, NewSubscriptionRequest, Poll, PollResponse, SendReceipt, SendRequest,
    SendResponse, SubscriptionResponse, TokenResponse,
};

// ============================================================================
// Constants
// ============================================================================

/// Base URL for the Telstra Messaging API (v2)
pub const DEFAULT_BASE_URL: &str = "https://tapi.telstra.com/v2";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Days a newly provisioned number stays assigned
const SUBSCRIPTION_ACTIVE_DAYS: u32 = 30;

/// OAuth scope for the messaging product
const TOKEN_SCOPE: &str = "NSMS";

/// The remote operations the client needs, one HTTP round trip each.
#[async_trait]
pub trait SmsApi: Send + Sync {
    /// Exchange a key/secret pair for a bearer token
    async fn get_bearer(&self, key: &str, secret: &str) -> Result<Bearer, ApiError>;

    /// The number currently assigned to this bearer, if any
    async fn get_number(&self, bearer: &str) -> Result<Option<String>, ApiError>;

    /// Provision a new number for this bearer
    async fn new_number(&self, bearer: &str) -> Result<String, ApiError>;

    async fn send_message(
        &self,
        bearer: &str,
        destination: &str,
        text: &str,
    ) -> Result<SendReceipt, ApiError>;

    /// Fetch the next queued inbound message, or [`Poll::Empty`]
    async fn poll_message(&self, bearer: &str) -> Result<Poll, ApiError>;
}

/// API client for the Telstra Messaging API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client against `base_url` (no trailing slash needed)
    pub fn new(base_url: impl Into<String>) -> reqwest::Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Fails only if the HTTP client itself cannot be built (e.g. TLS backend setup)
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(operation: Operation, request: RequestBuilder) -> Result<Response, ApiError> {
        debug!(%operation, "Sending request");
        request
            .send()
            .await
            .map_err(|e| ApiError::from_transport(operation, e))
    }

    /// Check the response carries the status this operation expects,
    /// logging the status and body if not.
    async fn expect_status(
        operation: Operation,
        response: Response,
        expected: StatusCode,
    ) -> Result<Response, ApiError> {
        let status = response.status();
        if status == expected {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_status(operation, status, &body);
        if let ApiError::UnexpectedStatus { body, .. } = &err {
            warn!(caller = %operation, status = status.as_u16(), body = %body, "Unexpected response status");
        }
        Err(err)
    }

    async fn parse<T: DeserializeOwned>(operation: Operation, response: Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::from_transport(operation, e))
    }
}

#[async_trait]
impl SmsApi for ApiClient {
    async fn get_bearer(&self, key: &str, secret: &str) -> Result<Bearer, ApiError> {
        let op = Operation::GetBearer;
        let request = self.client.post(self.url("/oauth/token")).form(&[
            ("grant_type", "client_credentials"),
            ("client_id", key),
            ("client_secret", secret),
            ("scope", TOKEN_SCOPE),
        ]);

        let response = Self::send(op, request).await?;
        let response = Self::expect_status(op, response, StatusCode::OK).await?;
        let token: TokenResponse = Self::parse(op, response).await?;
        Ok(token.into_bearer())
    }

    async fn get_number(&self, bearer: &str) -> Result<Option<String>, ApiError> {
        let op = Operation::GetNumber;
        let request = self
            .client
            .get(self.url("/messages/provisioning/subscriptions"))
            .bearer_auth(bearer);

        let response = Self::send(op, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("No subscription for this bearer");
            return Ok(None);
        }
        let response = Self::expect_status(op, response, StatusCode::OK).await?;
        let subscription: SubscriptionResponse = Self::parse(op, response).await?;
        Ok(subscription.number())
    }

    async fn new_number(&self, bearer: &str) -> Result<String, ApiError> {
        let op = Operation::NewNumber;
        let request = self
            .client
            .post(self.url("/messages/provisioning/subscriptions"))
            .bearer_auth(bearer)
            .json(&NewSubscriptionRequest {
                active_days: SUBSCRIPTION_ACTIVE_DAYS,
            });

        let response = Self::send(op, request).await?;
        let response = Self::expect_status(op, response, StatusCode::CREATED).await?;
        let subscription: SubscriptionResponse = Self::parse(op, response).await?;
        subscription
            .number()
            .ok_or_else(|| ApiError::unexpected(op, "response missing destinationAddress"))
    }

    async fn send_message(
        &self,
        bearer: &str,
        destination: &str,
        text: &str,
    ) -> Result<SendReceipt, ApiError> {
        let op = Operation::SendMessage;
        let request = self
            .client
            .post(self.url("/messages/sms"))
            .bearer_auth(bearer)
            .json(&SendRequest {
                to: destination,
                body: text,
            });

        let response = Self::send(op, request).await?;
        let response = Self::expect_status(op, response, StatusCode::CREATED).await?;
        // The acknowledgment body is informational; an unreadable one does not undo the send
        let sent = Self::parse::<SendResponse>(op, response)
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, "Could not read send acknowledgment");
                SendResponse::default()
            });
        Ok(sent.into_receipt())
    }

    async fn poll_message(&self, bearer: &str) -> Result<Poll, ApiError> {
        let op = Operation::PollMessage;
        let request = self
            .client
            .get(self.url("/messages/sms"))
            .bearer_auth(bearer);

        let response = Self::send(op, request).await?;
        let response = Self::expect_status(op, response, StatusCode::OK).await?;
        let poll: PollResponse = Self::parse(op, response).await?;
        poll.into_poll().map_err(|detail| ApiError::unexpected(op, detail))
    }
}
