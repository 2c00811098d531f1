//! HTTP handlers and the state they share.

pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod warranties;

use std::str::FromStr;

use domain::{CartService, Repository, WarrantyService};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<R: Repository> {
    pub carts: CartService<R>,
    pub warranties: WarrantyService<R>,
    pub repository: R,
}

/// Parses a path segment into a typed id.
pub(crate) fn parse_id<T>(kind: &str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {kind} id '{raw}': {e}")))
}
