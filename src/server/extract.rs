//! Request identity extractors.
//!
//! A bearer token always wins over the anonymous session header, and an
//! invalid token is rejected rather than downgraded to the anonymous scope.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use super::error::ApiError;
use super::AppState;
use crate::api::SESSION_HEADER;
use crate::domain::value_objects::{CartIdentity, SessionId};
use crate::service::ServiceError;

fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, ServiceError> {
    let Some(value) = headers.get(AUTHORIZATION) else { return Ok(None) };
    let value = value.to_str().map_err(|_| ServiceError::Unauthorized("Malformed authorization header".into()))?;
    match value.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(Some(token.to_string())),
        _ => Err(ServiceError::Unauthorized("Malformed authorization header".into())),
    }
}

fn session_id(headers: &HeaderMap) -> Result<Option<SessionId>, ServiceError> {
    let Some(value) = headers.get(SESSION_HEADER) else { return Ok(None) };
    let value = value.to_str().map_err(|_| ServiceError::Validation("Malformed session header".into()))?;
    Ok(Some(SessionId::parse(value)?))
}

/// The identity whose cart a request operates on.
pub struct CartOwner(pub CartIdentity);

#[async_trait]
impl FromRequestParts<AppState> for CartOwner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(&parts.headers)? {
            let user = state.storefront.authenticate(&token).await?;
            return Ok(Self(CartIdentity::User(user)));
        }
        match session_id(&parts.headers)? {
            Some(session) => Ok(Self(CartIdentity::Session(session))),
            None => Err(ServiceError::Unauthorized(format!("Send a bearer token or an {SESSION_HEADER} header")).into()),
        }
    }
}

/// A required bearer token, not yet resolved.
pub struct Bearer(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Bearer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(&parts.headers)?
            .map(Self)
            .ok_or_else(|| ServiceError::Unauthorized("Not authenticated".into()).into())
    }
}

/// The anonymous session id, when the client sent one.
pub struct AnonymousSession(pub Option<SessionId>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AnonymousSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_id(&parts.headers)?))
    }
}
