//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, InventoryError, OrderError, RepositoryError, WarrantyError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The caller's identity header is missing or malformed.
    Unauthorized(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::OrderNotFound(_) | DomainError::WarrantyNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::OrderInProgress { .. } => StatusCode::CONFLICT,
        DomainError::Order(order_err) => match order_err {
            OrderError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            OrderError::LineNotFound { .. } => StatusCode::NOT_FOUND,
            OrderError::InvalidQuantity { .. }
            | OrderError::EmptyOrder { .. }
            | OrderError::TotalOverflow { .. } => StatusCode::BAD_REQUEST,
        },
        DomainError::Inventory(inventory_err) => match inventory_err {
            InventoryError::InsufficientStock { .. } => StatusCode::CONFLICT,
            InventoryError::ProductNotFound { .. } => StatusCode::NOT_FOUND,
        },
        DomainError::Warranty(WarrantyError::InconsistentWarranty { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        DomainError::Repository(repository_err) => match repository_err {
            RepositoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RepositoryError::CartConflict { .. } => StatusCode::CONFLICT,
            RepositoryError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (status, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

#[cfg(test)]
mod tests {
    use common::{CustomerId, OrderId, ProductId};

    use super::*;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_not_found_kinds() {
        assert_eq!(status_of(DomainError::OrderNotFound(OrderId::new())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(InventoryError::ProductNotFound { product_id: ProductId::new() }.into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_conflicts() {
        assert_eq!(
            status_of(
                InventoryError::InsufficientStock {
                    product_id: ProductId::new(),
                    available: 0
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::OrderInProgress {
                customer_id: CustomerId::new(),
                existing: OrderId::new()
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_client_errors() {
        assert_eq!(
            status_of(OrderError::EmptyOrder { order_id: OrderId::new() }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrderError::TotalOverflow { order_id: OrderId::new() }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                WarrantyError::InconsistentWarranty {
                    missing: vec!["terms"]
                }
                .into()
            ),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_repository_unavailable_is_503() {
        assert_eq!(
            status_of(RepositoryError::Unavailable("down".to_string()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
