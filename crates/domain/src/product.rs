//! Catalog product entity.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// A product that can be placed in a cart.
///
/// The stock count is private: it only changes through the
/// [`InventoryLedger`](crate::InventoryLedger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    unit_price: Money,
    stock: u32,
    category: String,
    brand: String,
    description: Option<String>,
}

impl Product {
    /// Creates a product with its initial stock.
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        unit_price: Money,
        stock: u32,
        category: impl Into<String>,
        brand: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            unit_price,
            stock,
            category: category.into(),
            brand: brand.into(),
            description: None,
        }
    }

    /// Sets the free-text description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Removes `quantity` units, or returns `None` if stock would go negative.
    pub(crate) fn take_stock(&mut self, quantity: u32) -> Option<u32> {
        self.stock = self.stock.checked_sub(quantity)?;
        Some(self.stock)
    }

    /// Returns `quantity` units to stock.
    pub(crate) fn put_stock(&mut self, quantity: u32) -> u32 {
        self.stock = self.stock.saturating_add(quantity);
        self.stock
    }
}
