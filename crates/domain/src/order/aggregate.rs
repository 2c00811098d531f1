//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, ProductId};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{OrderError, OrderLine, OrderStatus};

/// Order aggregate root.
///
/// Holds only identity references (customer, products); lookups go through
/// the repositories. All methods here are pure: inventory and persistence are
/// coordinated by [`CartService`](super::CartService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    total: Money,
    created_at: DateTime<Utc>,
    ordered_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Opens an empty cart for a customer.
    ///
    /// Crate-private: `CartService::get_or_create_cart` is the only path that
    /// creates carts, which keeps the one-cart-per-customer rule in one place.
    pub(crate) fn new_cart(customer_id: CustomerId) -> Self {
        Self {
            id: OrderId::new(),
            customer_id,
            status: OrderStatus::Cart,
            lines: Vec::new(),
            total: Money::zero(),
            created_at: Utc::now(),
            ordered_at: None,
        }
    }

    /// Rebuilds an order loaded from storage. The total is recomputed from
    /// the lines.
    ///
    /// For repository adapters hydrating stored rows only. Carts are opened
    /// through `CartService::get_or_create_cart`; a cart built here and saved
    /// next to an existing one is rejected by the repository.
    pub fn restore(
        id: OrderId,
        customer_id: CustomerId,
        status: OrderStatus,
        lines: Vec<OrderLine>,
        created_at: DateTime<Utc>,
        ordered_at: Option<DateTime<Utc>>,
    ) -> Result<Self, OrderError> {
        let total = total_of(id, &lines)?;
        Ok(Self {
            id,
            customer_id,
            status,
            lines,
            total,
            created_at,
            ordered_at,
        })
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns all lines in insertion order.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Returns the line for a product, if any.
    pub fn line(&self, product_id: ProductId) -> Option<&OrderLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the total quantity across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the order was checked out, if it has been.
    pub fn ordered_at(&self) -> Option<DateTime<Utc>> {
        self.ordered_at
    }

    pub fn has_lines(&self) -> bool {
        !self.lines.is_empty()
    }

    pub fn is_cart(&self) -> bool {
        self.status == OrderStatus::Cart
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Line rules
impl Order {
    /// Adds `quantity` units of a product, merging with an existing line.
    ///
    /// The whole line is (re)priced at `unit_price`. Returns the line's new
    /// quantity.
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<u32, OrderError> {
        self.ensure_modifiable("add line")?;

        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity });
        }

        let order_id = self.id;
        let before = self.lines.clone();
        let new_quantity = match self.line_mut(product_id) {
            Some(line) => {
                let new_quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or(OrderError::InvalidQuantity { quantity })?;
                line.quantity = new_quantity;
                line.unit_price = unit_price;
                new_quantity
            }
            None => {
                self.lines
                    .push(OrderLine::new(order_id, product_id, quantity, unit_price));
                quantity
            }
        };

        self.commit_lines(before)?;
        Ok(new_quantity)
    }

    /// Sets the quantity of an existing line. Returns the previous quantity.
    pub fn set_line_quantity(
        &mut self,
        product_id: ProductId,
        new_quantity: u32,
    ) -> Result<u32, OrderError> {
        self.ensure_modifiable("update line quantity")?;

        if new_quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                quantity: new_quantity,
            });
        }

        let order_id = self.id;
        let before = self.lines.clone();
        let line = self
            .line_mut(product_id)
            .ok_or(OrderError::LineNotFound {
                order_id,
                product_id,
            })?;
        let previous = std::mem::replace(&mut line.quantity, new_quantity);

        self.commit_lines(before)?;
        Ok(previous)
    }

    /// Removes a line and returns it.
    pub fn remove_line(&mut self, product_id: ProductId) -> Result<OrderLine, OrderError> {
        self.ensure_modifiable("remove line")?;

        let index = self
            .lines
            .iter()
            .position(|line| line.product_id == product_id)
            .ok_or(OrderError::LineNotFound {
                order_id: self.id,
                product_id,
            })?;
        let removed = self.lines.remove(index);

        self.recompute_total();
        Ok(removed)
    }

    /// Re-prices a line with a percentage discount off its current unit price.
    pub fn apply_discount(
        &mut self,
        product_id: ProductId,
        percentage: Decimal,
    ) -> Result<(), OrderError> {
        self.ensure_modifiable("apply discount")?;

        let order_id = self.id;
        let line = self
            .line_mut(product_id)
            .ok_or(OrderError::LineNotFound {
                order_id,
                product_id,
            })?;
        let percentage = percentage.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
        line.unit_price = line.unit_price.discounted(percentage);
        line.discount_percent = percentage;

        self.recompute_total();
        Ok(())
    }

    /// Checks the order out: Cart → Completed.
    ///
    /// Stamps the order time unless one is already set.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_checkout() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action: "checkout",
            });
        }

        if !self.has_lines() {
            return Err(OrderError::EmptyOrder { order_id: self.id });
        }

        self.status = OrderStatus::Completed;
        self.ordered_at.get_or_insert(now);
        Ok(())
    }
}

// Helpers
impl Order {
    fn ensure_modifiable(&self, action: &'static str) -> Result<(), OrderError> {
        if self.status.can_modify_lines() {
            Ok(())
        } else {
            Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action,
            })
        }
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut OrderLine> {
        self.lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
    }

    /// Recomputes the total, putting `before` back if it overflows.
    fn commit_lines(&mut self, before: Vec<OrderLine>) -> Result<(), OrderError> {
        match total_of(self.id, &self.lines) {
            Ok(total) => {
                self.total = total;
                Ok(())
            }
            Err(e) => {
                self.lines = before;
                Err(e)
            }
        }
    }

    /// Recomputes the total after a change that can only lower it.
    fn recompute_total(&mut self) {
        if let Ok(total) = total_of(self.id, &self.lines) {
            self.total = total;
        }
    }
}

fn total_of(order_id: OrderId, lines: &[OrderLine]) -> Result<Money, OrderError> {
    lines
        .iter()
        .try_fold(Money::zero(), |total, line| {
            line.total_price().and_then(|price| total.checked_add(price))
        })
        .ok_or(OrderError::TotalOverflow { order_id })
}
