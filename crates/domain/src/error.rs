//! Domain error types.

use common::{CustomerId, OrderId, WarrantyId};
use thiserror::Error;

use crate::inventory::InventoryError;
use crate::order::OrderError;
use crate::repository::RepositoryError;
use crate::warranty::WarrantyError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An order rule was violated.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// The ledger refused a reservation or release.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// A warranty failed validation.
    #[error("Warranty error: {0}")]
    Warranty(#[from] WarrantyError),

    /// No such order, or the order is not in a state the operation accepts.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Warranty not found.
    #[error("Warranty not found: {0}")]
    WarrantyNotFound(WarrantyId),

    /// The customer already has a different open cart.
    #[error("Customer {customer_id} already has an order in progress: {existing}")]
    OrderInProgress {
        customer_id: CustomerId,
        existing: OrderId,
    },

    /// An error occurred in the repository.
    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for DomainError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::CartConflict {
                customer_id,
                existing,
            } => DomainError::OrderInProgress {
                customer_id,
                existing,
            },
            other => DomainError::Repository(other),
        }
    }
}

impl DomainError {
    /// Returns true for errors that mean "no such resource".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::OrderNotFound(_)
                | DomainError::WarrantyNotFound(_)
                | DomainError::Inventory(InventoryError::ProductNotFound { .. })
                | DomainError::Order(OrderError::LineNotFound { .. })
        )
    }
}
