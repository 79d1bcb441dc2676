//! Business error taxonomy of the storefront service.

use thiserror::Error;
use validator::ValidationErrors;

use crate::api::ErrorCode;
use crate::domain::aggregates::CartError;
use crate::domain::value_objects::{ProductIdError, QuantityError, SessionIdError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    OutOfStock(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("{0}")]
    Stock(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage failure")]
    Store(#[source] StoreError),
}

impl ServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::OutOfStock(_) => ErrorCode::OutOfStock,
            Self::EmptyCart => ErrorCode::EmptyCart,
            Self::Stock(_) => ErrorCode::Stock,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::Store(_) => ErrorCode::Internal,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Cart(CartError::ItemNotFound(_)) => Self::NotFound("Item not found in cart".into()),
            StoreError::Cart(e @ CartError::LineLimitExceeded { .. }) => Self::Validation(e.to_string()),
            StoreError::Cart(e @ CartError::StockExceeded { .. }) => Self::OutOfStock(e.to_string()),
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::Stock(message) => Self::Stock(message),
            other => Self::Store(other),
        }
    }
}

impl From<QuantityError> for ServiceError {
    fn from(error: QuantityError) -> Self { Self::Validation(error.to_string()) }
}

impl From<ProductIdError> for ServiceError {
    fn from(error: ProductIdError) -> Self { Self::Validation(error.to_string()) }
}

impl From<SessionIdError> for ServiceError {
    fn from(error: SessionIdError) -> Self { Self::Validation(error.to_string()) }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect();
        messages.sort();
        Self::Validation(messages.join("; "))
    }
}
