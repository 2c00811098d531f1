//! Cart service coordinating orders, the inventory ledger and discounts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::{CorrelationId, CustomerId, OrderId, ProductId};
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;

use crate::discount::DiscountLookup;
use crate::error::DomainError;
use crate::inventory::{InventoryError, InventoryLedger};
use crate::locks::KeyedLocks;
use crate::repository::Repository;

use super::{Order, OrderError};

/// Service for managing carts and checking them out.
///
/// All mutations of a customer's orders run under that customer's lock, so
/// operations on the same cart are serialized while different customers
/// proceed independently. Product locks are taken by the ledger while a
/// customer lock is held, never the other way round.
///
/// Every quantity held by a cart line is backed by a ledger reservation.
/// Increases reserve before persisting and release again if the write fails.
/// Decreases persist first and release afterwards; if the release fails the
/// cart is written back as it was, so the line keeps matching its stock.
pub struct CartService<R: Repository> {
    repository: R,
    ledger: Arc<InventoryLedger<R>>,
    discounts: Arc<dyn DiscountLookup>,
    customer_locks: KeyedLocks<CustomerId>,
}

impl<R: Repository> CartService<R> {
    /// Creates a cart service with its own inventory ledger.
    pub fn new(repository: R, discounts: Arc<dyn DiscountLookup>) -> Self {
        let ledger = Arc::new(InventoryLedger::new(repository.clone()));
        Self::with_ledger(repository, ledger, discounts)
    }

    /// Creates a cart service sharing an existing ledger.
    ///
    /// Everything that reserves stock in a process must go through the same
    /// ledger for per-product serialization to hold.
    pub fn with_ledger(
        repository: R,
        ledger: Arc<InventoryLedger<R>>,
        discounts: Arc<dyn DiscountLookup>,
    ) -> Self {
        Self {
            repository,
            ledger,
            discounts,
            customer_locks: KeyedLocks::new(),
        }
    }

    /// Returns the inventory ledger used by this service.
    pub fn ledger(&self) -> &Arc<InventoryLedger<R>> {
        &self.ledger
    }

    /// Returns the customer's open cart, creating an empty one if needed.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create_cart(&self, customer_id: CustomerId) -> Result<Order, DomainError> {
        let _guard = self.customer_locks.lock(&customer_id).await;

        if let Some(cart) = self.repository.find_cart(customer_id).await? {
            return Ok(cart);
        }

        let cart = Order::new_cart(customer_id);
        self.repository.save_order(&cart).await?;

        metrics::counter!("carts_created_total").increment(1);
        tracing::info!(order_id = %cart.id(), "cart created");
        Ok(cart)
    }

    /// Adds `quantity` units of a product to the customer's cart.
    ///
    /// Reserves exactly `quantity` units. A customer without a cart gets one,
    /// but only once the line has been admitted.
    #[tracing::instrument(skip(self))]
    pub async fn add_line(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Order, DomainError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity }.into());
        }

        let _guard = self.customer_locks.lock(&customer_id).await;

        let (mut order, is_new) = match self.repository.find_cart(customer_id).await? {
            Some(cart) => (cart, false),
            None => (Order::new_cart(customer_id), true),
        };

        let product = self
            .repository
            .load_product(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound { product_id })?;

        let new_quantity = order.add_line(product_id, quantity, product.unit_price())?;

        self.ledger.reserve(product_id, quantity).await?;
        if let Err(e) = self.repository.save_order(&order).await {
            self.roll_back_reservation(product_id, quantity).await;
            return Err(e.into());
        }

        if is_new {
            metrics::counter!("carts_created_total").increment(1);
            tracing::info!(order_id = %order.id(), "cart created");
        }
        tracing::debug!(order_id = %order.id(), new_quantity, "line added");
        Ok(order)
    }

    /// Changes the quantity of an existing line.
    ///
    /// Only the difference is reserved or released. A quantity of zero
    /// removes the line (see [`remove_line`](Self::remove_line)); the return
    /// value is `None` when that deleted the order.
    #[tracing::instrument(skip(self))]
    pub async fn update_line_quantity(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        new_quantity: u32,
    ) -> Result<Option<Order>, DomainError> {
        if new_quantity == 0 {
            return self.remove_line(order_id, product_id).await;
        }

        let (_guard, mut order) = self.lock_order(order_id).await?;
        let before = order.clone();
        let previous = order.set_line_quantity(product_id, new_quantity)?;

        if new_quantity > previous {
            let delta = new_quantity - previous;
            self.ledger.reserve(product_id, delta).await?;
            if let Err(e) = self.repository.save_order(&order).await {
                self.roll_back_reservation(product_id, delta).await;
                return Err(e.into());
            }
        } else if new_quantity < previous {
            self.repository.save_order(&order).await?;
            if let Err(e) = self.ledger.release(product_id, previous - new_quantity).await {
                self.restore_cart(&before).await;
                return Err(e);
            }
        }

        tracing::debug!(previous, new_quantity, "line quantity updated");
        Ok(Some(order))
    }

    /// Removes a line and releases its full quantity.
    ///
    /// Removing the last line deletes the order, in which case `None` is
    /// returned.
    #[tracing::instrument(skip(self))]
    pub async fn remove_line(
        &self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<Option<Order>, DomainError> {
        let (_guard, mut order) = self.lock_order(order_id).await?;
        let before = order.clone();
        let removed = order.remove_line(product_id)?;

        let remaining = if order.has_lines() {
            self.repository.save_order(&order).await?;
            Some(order)
        } else {
            self.repository.delete_order(order_id).await?;
            None
        };

        if let Err(e) = self.ledger.release(product_id, removed.quantity).await {
            self.restore_cart(&before).await;
            return Err(e);
        }
        if remaining.is_none() {
            tracing::info!("last line removed, cart deleted");
        }
        Ok(remaining)
    }

    /// Checks out a cart under a freshly generated correlation id.
    pub async fn checkout(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.checkout_with_correlation(order_id, CorrelationId::generate())
            .await
    }

    /// Checks out a cart: applies per-category discounts, freezes the lines
    /// and moves the order to `Completed`.
    ///
    /// Stock is untouched; the lines' reservations become the sale. A failed
    /// discount lookup checks the affected lines out at full price.
    #[tracing::instrument(skip(self))]
    pub async fn checkout_with_correlation(
        &self,
        order_id: OrderId,
        correlation_id: CorrelationId,
    ) -> Result<Order, DomainError> {
        let (_guard, mut order) = self.lock_order(order_id).await?;

        if !order.status().can_checkout() {
            return Err(DomainError::OrderNotFound(order_id));
        }
        if !order.has_lines() {
            return Err(OrderError::EmptyOrder { order_id }.into());
        }

        let product_ids: Vec<ProductId> = order.lines().iter().map(|l| l.product_id).collect();
        let mut categories = HashMap::with_capacity(product_ids.len());
        for product_id in &product_ids {
            if let Some(product) = self.repository.load_product(*product_id).await? {
                categories.insert(*product_id, product.category().to_string());
            }
        }

        let mut percentages: HashMap<&str, Decimal> = HashMap::new();
        for category in categories.values() {
            if !percentages.contains_key(category.as_str()) {
                let percentage = self.discount_for(category, &correlation_id).await;
                percentages.insert(category.as_str(), percentage);
            }
        }

        for product_id in product_ids {
            let percentage = categories
                .get(&product_id)
                .and_then(|category| percentages.get(category.as_str()))
                .copied()
                .unwrap_or(Decimal::ZERO);
            if percentage > Decimal::ZERO {
                order.apply_discount(product_id, percentage)?;
            }
        }

        order.complete(Utc::now())?;
        self.repository.save_order(&order).await?;

        metrics::counter!("orders_checked_out_total").increment(1);
        tracing::info!(total = %order.total(), lines = order.line_count(), "order checked out");
        Ok(order)
    }

    /// Deletes a cart and releases every line's quantity.
    ///
    /// If a release fails the cart comes back: lines already released are
    /// reserved again and the order is saved, and the error is returned.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_cart(&self, order_id: OrderId) -> Result<(), DomainError> {
        let (_guard, order) = self.lock_order(order_id).await?;

        if !order.status().can_cancel() {
            return Err(DomainError::OrderNotFound(order_id));
        }

        self.repository.delete_order(order_id).await?;

        let held: Vec<(ProductId, u32)> = order
            .lines()
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect();
        for (index, &(product_id, quantity)) in held.iter().enumerate() {
            if let Err(e) = self.ledger.release(product_id, quantity).await {
                tracing::error!(%product_id, error = %e, "failed to release stock of cancelled cart");
                self.reinstate_cancelled_cart(order, &held[..index]).await;
                return Err(e);
            }
        }

        tracing::info!("cart cancelled");
        Ok(())
    }

    /// Loads an order by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.repository
            .load_order(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))
    }

    /// Returns all orders of a customer, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn order_history(&self, customer_id: CustomerId) -> Result<Vec<Order>, DomainError> {
        Ok(self.repository.orders_for_customer(customer_id).await?)
    }

    /// Takes the owning customer's lock for an order, then loads the order.
    ///
    /// The owner never changes, so the first read only finds the lock; the
    /// second read is the one that counts.
    async fn lock_order(
        &self,
        order_id: OrderId,
    ) -> Result<(OwnedMutexGuard<()>, Order), DomainError> {
        let owner = self.get_order(order_id).await?.customer_id();
        let guard = self.customer_locks.lock(&owner).await;
        let order = self.get_order(order_id).await?;
        Ok((guard, order))
    }

    async fn discount_for(&self, category: &str, correlation_id: &CorrelationId) -> Decimal {
        match self.discounts.lookup(category, correlation_id).await {
            Ok(Some(discount)) => {
                tracing::debug!(category, percentage = %discount.percentage, version_id = %discount.version_id, "discount found");
                discount
                    .percentage
                    .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
            }
            Ok(None) => Decimal::ZERO,
            Err(e) => {
                tracing::warn!(category, error = %e, "discount lookup failed, using no discount");
                Decimal::ZERO
            }
        }
    }

    /// Writes a cart back after the stock step of a decrease failed.
    async fn restore_cart(&self, previous: &Order) {
        metrics::counter!("cart_rollbacks_total").increment(1);
        if let Err(e) = self.repository.save_order(previous).await {
            tracing::error!(order_id = %previous.id(), error = %e, "failed to restore cart");
        }
    }

    /// Re-reserves the lines a failed cancellation already released and
    /// saves the cart again. A line whose stock was taken in the meantime is
    /// dropped from the cart.
    async fn reinstate_cancelled_cart(&self, mut order: Order, released: &[(ProductId, u32)]) {
        metrics::counter!("cart_rollbacks_total").increment(1);
        for &(product_id, quantity) in released {
            if let Err(e) = self.ledger.reserve(product_id, quantity).await {
                tracing::error!(%product_id, quantity, error = %e, "released stock is gone, dropping line");
                order.remove_line(product_id).ok();
            }
        }
        if let Err(e) = self.repository.save_order(&order).await {
            tracing::error!(order_id = %order.id(), error = %e, "failed to restore cancelled cart");
        }
    }

    async fn roll_back_reservation(&self, product_id: ProductId, quantity: u32) {
        metrics::counter!("cart_rollbacks_total").increment(1);
        if let Err(e) = self.ledger.release(product_id, quantity).await {
            tracing::error!(%product_id, quantity, error = %e, "failed to roll back reservation");
        }
    }
}
