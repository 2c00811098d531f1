//! Order lines.

use common::{Money, OrderId, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One product/quantity/price entry of an order, keyed by (order, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// The owning order.
    pub order_id: OrderId,

    /// The product this line reserves stock from.
    pub product_id: ProductId,

    /// Quantity held by the line, always at least one.
    pub quantity: u32,

    /// Unit price captured when the line was last priced.
    pub unit_price: Money,

    /// Discount percentage applied at checkout, zero when none.
    #[serde(default)]
    pub discount_percent: Decimal,
}

impl OrderLine {
    /// Creates an undiscounted line.
    pub fn new(order_id: OrderId, product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        Self {
            order_id,
            product_id,
            quantity,
            unit_price,
            discount_percent: Decimal::ZERO,
        }
    }

    /// Returns quantity × unit price, or `None` if that overflows.
    pub fn total_price(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total_price() {
        let line = OrderLine::new(OrderId::new(), ProductId::new(), 3, Money::from_cents(1050));
        assert_eq!(line.total_price(), Some(Money::from_cents(3150)));
        assert!(line.discount_percent.is_zero());
    }
}
