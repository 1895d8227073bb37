//! Data models for the SMS client.
//!
//! - `CredentialEntry`, `KeyPair`: stored and validated API credentials
//! - `Message`, `Direction`, `Inbox`, `MessageRow`: sent and received messages

pub mod credential;
pub mod message;

pub use credential::{CredentialEntry, KeyPair, ValidationError, KEY_LENGTH, SECRET_LENGTH};
pub use message::{Direction, Inbox, Message, MessageRow};
