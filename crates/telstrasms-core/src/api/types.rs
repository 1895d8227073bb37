//! Request and response shapes for the Telstra Messaging API.
//!
//! Only the fields the client consumes are modelled; anything else the
//! provider returns is ignored.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Token lifetime assumed when the provider does not state one
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Longest token lifetime taken from the provider; larger values are capped
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 7 * 24 * 3600;

/// Poll status the provider uses when no inbound messages are queued
const EMPTY_MARKER: &str = "EMPTY";

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    /// Sent as a string ("3599") by the provider, accepted as a number too
    #[serde(default)]
    pub expires_in: Option<serde_json::Value>,
}

impl TokenResponse {
    pub fn into_bearer(self) -> Bearer {
        let secs = match &self.expires_in {
            Some(serde_json::Value::Number(n)) => n.as_i64(),
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .filter(|s| *s > 0)
        .map(|s| s.min(MAX_TOKEN_LIFETIME_SECS))
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        Bearer {
            token: self.access_token,
            lifetime: Duration::seconds(secs),
        }
    }
}

/// Short-lived credential required on every call after `get_bearer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bearer {
    pub token: String,
    pub lifetime: Duration,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionResponse {
    #[serde(rename = "destinationAddress", default)]
    pub destination_address: Option<String>,
}

impl SubscriptionResponse {
    /// The assigned number, treating a blank value as none
    pub fn number(self) -> Option<String> {
        self.destination_address
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NewSubscriptionRequest {
    #[serde(rename = "activeDays")]
    pub active_days: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendRequest<'a> {
    pub to: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct SendResponse {
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SentMessage {
    #[serde(rename = "messageId", default)]
    pub message_id: Option<String>,
    #[serde(rename = "deliveryStatus", default)]
    pub delivery_status: Option<String>,
}

impl SendResponse {
    pub fn into_receipt(self) -> SendReceipt {
        let delivery_status = self
            .messages
            .iter()
            .find_map(|m| m.delivery_status.clone());
        SendReceipt {
            message_ids: self
                .messages
                .into_iter()
                .filter_map(|m| m.message_id)
                .collect(),
            delivery_status,
        }
    }
}

/// Delivery acknowledgment for a sent message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_ids: Vec<String>,
    pub delivery_status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PollResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "destinationAddress", default)]
    pub destination_address: Option<String>,
    #[serde(rename = "senderAddress", default)]
    pub sender_address: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "messageId", default)]
    pub message_id: Option<String>,
    #[serde(rename = "sentTimestamp", default)]
    pub sent_timestamp: Option<String>,
}

impl PollResponse {
    /// Interpret a poll response, returning a description of what is missing on error
    pub fn into_poll(self) -> Result<Poll, String> {
        if self.status.as_deref() == Some(EMPTY_MARKER) {
            return Ok(Poll::Empty);
        }
        let sender_address = self
            .sender_address
            .ok_or_else(|| "response missing senderAddress".to_string())?;
        let message = self
            .message
            .ok_or_else(|| "response missing message".to_string())?;

        Ok(Poll::Received(InboundMessage {
            sender_address,
            destination_address: self.destination_address,
            message,
            message_id: self.message_id,
            sent_timestamp: self.sent_timestamp,
        }))
    }
}

/// Result of a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// No further inbound messages are queued
    Empty,
    Received(InboundMessage),
}

/// An inbound message as delivered by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender_address: String,
    pub destination_address: Option<String>,
    pub message: String,
    pub message_id: Option<String>,
    pub sent_timestamp: Option<String>,
}
