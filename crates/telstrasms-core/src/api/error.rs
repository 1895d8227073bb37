use thiserror::Error;

/// Remote operation that produced a failure, for caller identity in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetBearer,
    GetNumber,
    NewNumber,
    SendMessage,
    PollMessage,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::GetBearer => "get_bearer",
            Operation::GetNumber => "get_number",
            Operation::NewNumber => "new_number",
            Operation::SendMessage => "send_message",
            Operation::PollMessage => "poll_message",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request timed out calling {operation}")]
    Timeout { operation: Operation },

    #[error("Network problem calling {operation}")]
    Connection { operation: Operation },

    #[error("Error calling {operation}: {detail}")]
    Unexpected { operation: Operation, detail: String },

    #[error("Request method {operation} failed with code {status}")]
    UnexpectedStatus {
        operation: Operation,
        status: u16,
        body: String,
    },
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Classify a transport-level failure.
    pub fn from_transport(operation: Operation, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout { operation }
        } else if err.is_connect() {
            ApiError::Connection { operation }
        } else {
            ApiError::Unexpected {
                operation,
                detail: err.to_string(),
            }
        }
    }

    pub fn from_status(operation: Operation, status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::UnexpectedStatus {
            operation,
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    pub fn unexpected(operation: Operation, detail: impl Into<String>) -> Self {
        ApiError::Unexpected {
            operation,
            detail: detail.into(),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            ApiError::Timeout { operation }
            | ApiError::Connection { operation }
            | ApiError::Unexpected { operation, .. }
            | ApiError::UnexpectedStatus { operation, .. } => *operation,
        }
    }
}
