//! REST API client module for the Telstra Messaging API.
//!
//! This module provides the `ApiClient` for obtaining bearer tokens,
//! resolving the assigned number, sending SMS and polling for replies.
//!
//! Every operation returns `Result<_, ApiError>`; transport failures are
//! classified as timeout, connection or unexpected, and responses with an
//! unexpected status carry the caller, status code and body.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ApiClient, SmsApi, DEFAULT_BASE_URL};
pub use error::{ApiError, Operation};
pub use types::{Bearer, InboundMessage, Poll, SendReceipt};
