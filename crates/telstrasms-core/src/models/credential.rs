use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Required length of an API key
pub const KEY_LENGTH: usize = 32;

/// Required length of an API secret
pub const SECRET_LENGTH: usize = 16;

/// Placeholder shown for entries that have never resolved a number
const UNKNOWN_NUMBER: &str = "[unknown number]";

/// Input rejected locally, before any request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Key must be of length 32 & secret of length 16 (key has {0})")]
    KeyLength(usize),

    #[error("Key must be of length 32 & secret of length 16 (secret has {0})")]
    SecretLength(usize),

    #[error("Number cannot be blank")]
    BlankDestination,

    #[error("Message cannot be blank")]
    BlankText,

    #[error("Cannot message the number this key sends from")]
    OwnNumber,

    #[error("No stored key numbered {0}")]
    UnknownEntry(usize),

    #[error("Nothing chosen")]
    EmptySelection,

    #[error("Expected an entry number or a key pair (format: [key] [secret]), got {0:?}")]
    MalformedSelection(String),
}

/// A stored key/secret pair plus the last number resolved from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub key: String,
    pub secret: String,
    #[serde(
        default,
        deserialize_with = "number_from_string_or_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub number: Option<String>,
}

/// Hand-edited key files sometimes hold the number as a JSON integer
fn number_from_string_or_integer<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

impl CredentialEntry {
    pub fn new(pair: KeyPair) -> Self {
        Self {
            key: pair.key,
            secret: pair.secret,
            number: None,
        }
    }

    /// Validate the stored pair before it is used for a request.
    pub fn key_pair(&self) -> Result<KeyPair, ValidationError> {
        KeyPair::new(&self.key, &self.secret)
    }

    /// Whether this entry was created from the given pair.
    pub fn matches(&self, pair: &KeyPair) -> bool {
        self.key == pair.key && self.secret == pair.secret
    }

    pub fn number_display(&self) -> &str {
        self.number
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_NUMBER)
    }

    /// Label used when listing keys to choose from. `position` is 1-based.
    pub fn choice_label(&self, position: usize) -> String {
        format!("{}. {} {}", position, self.number_display(), self.key)
    }
}

/// An API key/secret pair whose lengths have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    key: String,
    secret: String,
}

impl KeyPair {
    pub fn new(key: &str, secret: &str) -> Result<Self, ValidationError> {
        let key_len = key.chars().count();
        if key_len != KEY_LENGTH {
            return Err(ValidationError::KeyLength(key_len));
        }
        let secret_len = secret.chars().count();
        if secret_len != SECRET_LENGTH {
            return Err(ValidationError::SecretLength(secret_len));
        }
        Ok(Self {
            key: key.to_string(),
            secret: secret.to_string(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}
