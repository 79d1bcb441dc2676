use reqwest::StatusCode;
use thiserror::Error;

use crate::api::{ErrorBody, ErrorCode};

/// Failure of a client cart operation.
///
/// Business rejections carry the server's message verbatim.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    OutOfStock(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("{0}")]
    Payment(String),

    #[error("{0}")]
    Stock(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Server error ({status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("Could not save session state: {0}")]
    Storage(String),
}

impl CartError {
    /// Text suitable for showing to a shopper.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) | Self::Timeout => "Could not reach the store, please retry".to_string(),
            Self::MalformedResponse(_) | Self::Server { .. } => "Operation failed, please retry".to_string(),
            Self::Storage(_) => "Could not save your sign-in on this device".to_string(),
            other => other.to_string(),
        }
    }

    /// Transient failures; business rejections are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout | Self::Server { .. })
    }

    pub fn from_error_body(body: ErrorBody) -> Self {
        let ErrorBody { detail, code } = body;
        match code {
            ErrorCode::Validation => Self::Validation(detail),
            ErrorCode::NotFound => Self::NotFound(detail),
            ErrorCode::OutOfStock => Self::OutOfStock(detail),
            ErrorCode::EmptyCart => Self::EmptyCart,
            ErrorCode::Stock => Self::Stock(detail),
            ErrorCode::Payment => Self::Payment(detail),
            ErrorCode::Unauthorized => Self::Unauthorized(detail),
            ErrorCode::Conflict => Self::Conflict(detail),
            ErrorCode::Internal => Self::Server { status: 500, detail },
        }
    }

    /// Maps a status whose body could not be decoded as an error body.
    pub fn from_status(status: StatusCode, detail: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Self::Validation(detail),
            StatusCode::NOT_FOUND => Self::NotFound(detail),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(detail),
            StatusCode::PAYMENT_REQUIRED => Self::Payment(detail),
            StatusCode::CONFLICT => Self::Conflict(detail),
            s => Self::Server { status: s.as_u16(), detail },
        }
    }
}

impl From<reqwest::Error> for CartError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            tracing::error!(%error, "could not decode storefront response");
            Self::MalformedResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<super::storage::StorageError> for CartError {
    fn from(error: super::storage::StorageError) -> Self {
        tracing::warn!(%error, "session storage failed");
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for CartError {
    fn from(error: serde_json::Error) -> Self {
        tracing::error!(%error, "could not decode storefront response");
        Self::MalformedResponse(error.to_string())
    }
}
