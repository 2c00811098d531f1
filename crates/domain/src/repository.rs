//! Storage ports for products, orders and warranties.
//!
//! The domain services are generic over these traits. The crate ships an
//! in-memory implementation ([`InMemoryRepository`](crate::InMemoryRepository));
//! the `store` crate provides the PostgreSQL one.

use async_trait::async_trait;
use common::{CustomerId, OrderId, ProductId, WarrantyId};
use thiserror::Error;

use crate::order::Order;
use crate::product::Product;
use crate::warranty::Warranty;

/// Errors that can occur when talking to a repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Saving a new cart would give the customer a second open cart.
    #[error("Customer {customer_id} already has an open cart: {existing}")]
    CartConflict {
        customer_id: CustomerId,
        existing: OrderId,
    },

    /// The backend is temporarily unavailable.
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("Repository backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RepositoryError {
    /// Wraps a backend error.
    pub fn backend(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        RepositoryError::Backend(Box::new(error))
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Outcome of [`ProductRepository::take_stock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    /// Stock was taken; `remaining` is what is left.
    Taken { remaining: u32 },
    /// Fewer than the requested units are in stock. Nothing changed.
    Insufficient { available: u32 },
    /// No such product.
    NotFound,
}

/// Product storage.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Loads a product by id.
    ///
    /// Returns None if the product doesn't exist.
    async fn load_product(&self, product_id: ProductId) -> RepositoryResult<Option<Product>>;

    /// Inserts or replaces a product.
    async fn save_product(&self, product: &Product) -> RepositoryResult<()>;

    /// Removes `quantity` units from stock if at least that many remain.
    ///
    /// The check and the write are a single atomic step in the backend, so
    /// two processes sharing the store cannot both take the last unit.
    async fn take_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> RepositoryResult<StockChange>;

    /// Adds `quantity` units to stock and returns the new count, or None if
    /// the product doesn't exist.
    async fn put_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> RepositoryResult<Option<u32>>;
}

/// Order storage, lines included.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Loads an order with its lines.
    async fn load_order(&self, order_id: OrderId) -> RepositoryResult<Option<Order>>;

    /// Finds the customer's open cart, if any.
    async fn find_cart(&self, customer_id: CustomerId) -> RepositoryResult<Option<Order>>;

    /// Returns every order of a customer, newest first.
    async fn orders_for_customer(&self, customer_id: CustomerId) -> RepositoryResult<Vec<Order>>;

    /// Inserts or replaces an order and its full set of lines.
    ///
    /// Fails with [`RepositoryError::CartConflict`] when the order is a cart
    /// and the customer already has a different open cart.
    async fn save_order(&self, order: &Order) -> RepositoryResult<()>;

    /// Deletes an order and its lines. Returns false if it didn't exist.
    async fn delete_order(&self, order_id: OrderId) -> RepositoryResult<bool>;
}

/// Warranty storage.
#[async_trait]
pub trait WarrantyRepository: Send + Sync {
    async fn load_warranty(&self, warranty_id: WarrantyId) -> RepositoryResult<Option<Warranty>>;

    async fn save_warranty(&self, warranty: &Warranty) -> RepositoryResult<()>;
}

/// Everything the services need from storage.
///
/// Implemented automatically for any cloneable type implementing the three
/// repository traits. Clones must share the same underlying storage.
pub trait Repository:
    ProductRepository + OrderRepository + WarrantyRepository + Clone + 'static
{
}

impl<T> Repository for T where
    T: ProductRepository + OrderRepository + WarrantyRepository + Clone + 'static
{
}
