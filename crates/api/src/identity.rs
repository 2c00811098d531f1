//! Caller identity resolved by the upstream authentication layer.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{CorrelationId, CustomerId};

use crate::error::ApiError;

/// Header carrying the authenticated customer's id.
pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

/// Header carrying the caller-supplied correlation id.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// The authenticated customer making the request.
///
/// The id is trusted as given; verifying credentials happens before requests
/// reach this service.
#[derive(Debug, Clone, Copy)]
pub struct CustomerIdentity(pub CustomerId);

impl<S: Send + Sync> FromRequestParts<S> for CustomerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CUSTOMER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing customer identity".to_string()))?;

        let customer_id = value
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<CustomerId>().ok())
            .ok_or_else(|| ApiError::Unauthorized("Invalid customer identity".to_string()))?;

        Ok(Self(customer_id))
    }
}

/// Correlation id for outbound calls: the caller's, or a fresh one.
#[derive(Debug, Clone)]
pub struct Correlation(pub CorrelationId);

impl<S: Send + Sync> FromRequestParts<S> for Correlation {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let supplied = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        Ok(Self(match supplied {
            Some(id) => CorrelationId::from(id),
            None => CorrelationId::generate(),
        }))
    }
}
