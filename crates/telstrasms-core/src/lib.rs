//! Core library for telstrasms.
//!
//! Provides the pieces behind the terminal client:
//!
//! - `api`: REST client for the Telstra Messaging API and its failure classification
//! - `auth`: the local key file store and the in-memory session
//! - `models`: credential entries, key pairs and messages
//! - `workflow`: key selection, sending and inbox draining
//! - `config`: application configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod notice;
pub mod utils;
pub mod workflow;

pub use notice::{Notice, Severity};
