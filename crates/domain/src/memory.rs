//! In-memory repository for tests and single-process hosting.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{CustomerId, OrderId, ProductId, WarrantyId};
use tokio::sync::RwLock;

use crate::order::Order;
use crate::product::Product;
use crate::repository::{
    OrderRepository, ProductRepository, RepositoryError, RepositoryResult, StockChange,
    WarrantyRepository,
};
use crate::warranty::Warranty;

/// In-memory implementation of every repository port.
///
/// Clones share the same storage. Enforces the same one-open-cart rule as
/// the PostgreSQL schema.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    warranties: Arc<RwLock<HashMap<WarrantyId, Warranty>>>,
    fail_order_writes: Arc<AtomicBool>,
    fail_stock_writes: Arc<RwLock<HashSet<ProductId>>>,
}

impl InMemoryRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent order save or delete fail with
    /// `RepositoryError::Unavailable` until switched off again.
    pub fn set_fail_order_writes(&self, fail: bool) {
        self.fail_order_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes stock changes for one product fail with
    /// `RepositoryError::Unavailable` until switched off again.
    pub async fn set_fail_stock_writes(&self, product_id: ProductId, fail: bool) {
        let mut failing = self.fail_stock_writes.write().await;
        if fail {
            failing.insert(product_id);
        } else {
            failing.remove(&product_id);
        }
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    fn check_order_writes(&self) -> RepositoryResult<()> {
        if self.fail_order_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::Unavailable(
                "order writes are disabled".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn check_stock_writes(&self, product_id: ProductId) -> RepositoryResult<()> {
        if self.fail_stock_writes.read().await.contains(&product_id) {
            Err(RepositoryError::Unavailable(format!(
                "stock writes for product {product_id} are disabled"
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProductRepository for InMemoryRepository {
    async fn load_product(&self, product_id: ProductId) -> RepositoryResult<Option<Product>> {
        Ok(self.products.read().await.get(&product_id).cloned())
    }

    async fn save_product(&self, product: &Product) -> RepositoryResult<()> {
        self.products
            .write()
            .await
            .insert(product.id(), product.clone());
        Ok(())
    }

    async fn take_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> RepositoryResult<StockChange> {
        self.check_stock_writes(product_id).await?;

        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&product_id) else {
            return Ok(StockChange::NotFound);
        };
        Ok(match product.take_stock(quantity) {
            Some(remaining) => StockChange::Taken { remaining },
            None => StockChange::Insufficient {
                available: product.stock(),
            },
        })
    }

    async fn put_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> RepositoryResult<Option<u32>> {
        self.check_stock_writes(product_id).await?;

        let mut products = self.products.write().await;
        Ok(products
            .get_mut(&product_id)
            .map(|product| product.put_stock(quantity)))
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepository {
    async fn load_order(&self, order_id: OrderId) -> RepositoryResult<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn find_cart(&self, customer_id: CustomerId) -> RepositoryResult<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .find(|o| o.customer_id() == customer_id && o.is_cart())
            .cloned())
    }

    async fn orders_for_customer(&self, customer_id: CustomerId) -> RepositoryResult<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut found: Vec<_> = orders
            .values()
            .filter(|o| o.customer_id() == customer_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(found)
    }

    async fn save_order(&self, order: &Order) -> RepositoryResult<()> {
        self.check_order_writes()?;

        let mut orders = self.orders.write().await;

        // Unique constraint simulation: one cart per customer
        if order.is_cart()
            && let Some(existing) = orders.values().find(|o| {
                o.customer_id() == order.customer_id() && o.is_cart() && o.id() != order.id()
            })
        {
            return Err(RepositoryError::CartConflict {
                customer_id: order.customer_id(),
                existing: existing.id(),
            });
        }

        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn delete_order(&self, order_id: OrderId) -> RepositoryResult<bool> {
        self.check_order_writes()?;
        Ok(self.orders.write().await.remove(&order_id).is_some())
    }
}

#[async_trait]
impl WarrantyRepository for InMemoryRepository {
    async fn load_warranty(&self, warranty_id: WarrantyId) -> RepositoryResult<Option<Warranty>> {
        Ok(self.warranties.read().await.get(&warranty_id).cloned())
    }

    async fn save_warranty(&self, warranty: &Warranty) -> RepositoryResult<()> {
        self.warranties
            .write()
            .await
            .insert(warranty.id, warranty.clone());
        Ok(())
    }
}
