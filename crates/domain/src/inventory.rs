//! Inventory ledger: per-product stock with atomic reserve and release.

use common::ProductId;
use thiserror::Error;

use crate::error::DomainError;
use crate::locks::KeyedLocks;
use crate::product::Product;
use crate::repository::{ProductRepository, StockChange};

/// Errors raised by the inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// Not enough stock to cover the reservation.
    #[error("Insufficient stock for product {product_id}: {available} available")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
    },

    /// Product not found.
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },
}

/// Stock counts for the catalog.
///
/// Stock changes go through the repository's conditional
/// [`take_stock`](ProductRepository::take_stock), which never lets stock go
/// negative even across processes sharing one store. Within a process each
/// change also runs under that product's lock, so reservations against one
/// product queue up while different products proceed in parallel.
pub struct InventoryLedger<R> {
    repository: R,
    locks: KeyedLocks<ProductId>,
}

impl<R: ProductRepository> InventoryLedger<R> {
    /// Creates a ledger backed by the given product repository.
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            locks: KeyedLocks::new(),
        }
    }

    /// Takes `delta` units out of stock.
    ///
    /// Fails with `InsufficientStock` (and changes nothing) if fewer than
    /// `delta` units are available. A zero delta still requires the product
    /// to exist.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, product_id: ProductId, delta: u32) -> Result<(), DomainError> {
        if delta == 0 {
            self.load(product_id).await?;
            return Ok(());
        }

        let _guard = self.locks.lock(&product_id).await;
        match self.repository.take_stock(product_id, delta).await? {
            StockChange::Taken { remaining } => {
                metrics::counter!("inventory_reservations_total").increment(1);
                tracing::debug!(remaining, "stock reserved");
                Ok(())
            }
            StockChange::Insufficient { available } => {
                metrics::counter!("inventory_reservations_rejected_total").increment(1);
                tracing::debug!(available, "reservation rejected");
                Err(InventoryError::InsufficientStock {
                    product_id,
                    available,
                }
                .into())
            }
            StockChange::NotFound => Err(InventoryError::ProductNotFound { product_id }.into()),
        }
    }

    /// Returns `delta` units to stock.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, product_id: ProductId, delta: u32) -> Result<(), DomainError> {
        if delta == 0 {
            self.load(product_id).await?;
            return Ok(());
        }

        let _guard = self.locks.lock(&product_id).await;
        let stock = self
            .repository
            .put_stock(product_id, delta)
            .await?
            .ok_or(InventoryError::ProductNotFound { product_id })?;

        metrics::counter!("inventory_releases_total").increment(1);
        tracing::debug!(stock, "stock released");
        Ok(())
    }

    /// Returns the current stock of a product.
    pub async fn available(&self, product_id: ProductId) -> Result<u32, DomainError> {
        Ok(self.load(product_id).await?.stock())
    }

    async fn load(&self, product_id: ProductId) -> Result<Product, DomainError> {
        self.repository
            .load_product(product_id)
            .await?
            .ok_or_else(|| InventoryError::ProductNotFound { product_id }.into())
    }
}
