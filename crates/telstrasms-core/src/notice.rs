//! User-facing status notices.
//!
//! Every recoverable problem (and a few successes) is reported to the
//! front end as a `Notice`: a severity, a short title, and optional detail.

use crate::api::ApiError;
use crate::auth::StoreError;
use crate::models::ValidationError;

/// Shared hint for transport failures
const CHECK_CONNECTION: &str = "Check connection and try again";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub title: String,
    pub detail: Option<String>,
}

impl Notice {
    pub fn new(severity: Severity, title: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            detail: None,
        }
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(Severity::Info, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(Severity::Error, title)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}. {}", self.title, detail),
            None => write!(f, "{}", self.title),
        }
    }
}

impl From<&ApiError> for Notice {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::Timeout { .. } => {
                Notice::error("Request timed out").with_detail(CHECK_CONNECTION)
            }
            ApiError::Connection { .. } => {
                Notice::error("Network problem").with_detail(CHECK_CONNECTION)
            }
            ApiError::Unexpected { operation, detail } => {
                Notice::error(format!("Error calling {}, report bug", operation)).with_detail(detail)
            }
            ApiError::UnexpectedStatus { operation, status, .. } => Notice::error(format!(
                "Request method {} failed with code {}, check logs",
                operation, status
            )),
        }
    }
}

impl From<&StoreError> for Notice {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::Missing { path } => Notice::warning(format!(
                "No existing key file found at {}",
                path.display()
            ))
            .with_detail("Manually add keys and the program will create a new config file"),
            StoreError::Corrupt { source, .. } => Notice::error("Error parsing key file")
                .with_detail(format!(
                    "Check that the file is a list of {{\"key\", \"secret\", \"number\"}} objects ({})",
                    source
                )),
            StoreError::Read { source, .. } => {
                Notice::error("Could not read key file").with_detail(source.to_string())
            }
            StoreError::Write { source, .. } => {
                Notice::error("Could not write to key file").with_detail(source.to_string())
            }
        }
    }
}

impl From<&ValidationError> for Notice {
    fn from(err: &ValidationError) -> Self {
        match err {
            ValidationError::KeyLength(_) | ValidationError::SecretLength(_) => {
                Notice::error("Invalid key").with_detail(err.to_string())
            }
            _ => Notice::warning(err.to_string()),
        }
    }
}
