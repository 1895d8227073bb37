use chrono::{DateTime, Duration, Utc};

use crate::api::Bearer;

/// A resolved bearer token and the number it sends from.
///
/// Only exists once both the token and the number have been obtained.
/// Never persisted. The token lifetime is kept for display only; nothing
/// here refuses to use a token past it, the provider rejects stale tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    bearer: String,
    phone_number: String,
    entry_index: usize,
    issued_at: DateTime<Utc>,
    lifetime: Duration,
}

impl Session {
    pub fn new(bearer: Bearer, phone_number: impl Into<String>, entry_index: usize) -> Self {
        Self {
            bearer: bearer.token,
            phone_number: phone_number.into(),
            entry_index,
            issued_at: Utc::now(),
            lifetime: bearer.lifetime,
        }
    }

    /// The bearer token sent on every call
    pub fn token(&self) -> &str {
        &self.bearer
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    /// Position of the key file entry this session was resolved from
    pub fn entry_index(&self) -> usize {
        self.entry_index
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        match self.issued_at.checked_add_signed(self.lifetime) {
            Some(expires_at) => expires_at - Utc::now(),
            None => self.lifetime,
        }
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}
