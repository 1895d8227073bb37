//! Credential and session management.
//!
//! This module provides:
//! - `CredentialStore`: key/secret pairs and last known numbers in a local JSON file
//! - `Session`: the bearer token and number in use for this run
//!
//! Sessions are never written to disk; tokens are valid for about an hour.

pub mod credentials;
pub mod session;

pub use credentials::{CredentialStore, LoadOutcome, StoreError};
pub use session::Session;
