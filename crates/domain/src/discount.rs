//! Per-category discount lookup consumed at checkout.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use common::CorrelationId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A flat percentage discount for one product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    pub category: String,

    /// Percentage off, expected in `0..=100`.
    #[serde(rename = "discountPercent")]
    pub percentage: Decimal,

    /// Version of the discount configuration that produced this value.
    pub version_id: String,
}

/// Errors reported by a discount source.
#[derive(Debug, Error)]
pub enum DiscountError {
    /// The discount source could not be reached or answered with an error.
    #[error("Discount service unavailable: {0}")]
    Unavailable(String),

    /// The discount source answered with something that isn't a discount.
    #[error("Invalid discount response: {0}")]
    InvalidResponse(String),
}

/// Source of per-category discounts.
#[async_trait]
pub trait DiscountLookup: Send + Sync {
    /// Returns the discount for a category, or None if it has none.
    async fn lookup(
        &self,
        category: &str,
        correlation_id: &CorrelationId,
    ) -> Result<Option<Discount>, DiscountError>;
}

/// Fixed discount table held in memory.
#[derive(Debug, Clone)]
pub struct StaticDiscounts {
    discounts: HashMap<String, Decimal>,
    version_id: String,
}

impl StaticDiscounts {
    /// Creates an empty table: every lookup returns no discount.
    pub fn new() -> Self {
        Self {
            discounts: HashMap::new(),
            version_id: "static".to_string(),
        }
    }

    /// Adds or replaces a category's percentage.
    pub fn with_discount(mut self, category: impl Into<String>, percentage: Decimal) -> Self {
        self.discounts.insert(category.into(), percentage);
        self
    }

    pub fn len(&self) -> usize {
        self.discounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discounts.is_empty()
    }
}

impl Default for StaticDiscounts {
    fn default() -> Self {
        Self::new()
    }
}

/// Returned when a discount table string can't be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid discount entry '{0}': expected category=percent")]
pub struct ParseDiscountsError(pub String);

impl FromStr for StaticDiscounts {
    type Err = ParseDiscountsError;

    /// Parses `category=percent` pairs separated by commas, e.g.
    /// `"books=10,electronics=5.5"`. Blank entries are skipped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut table = StaticDiscounts::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (category, percentage) = entry
                .split_once('=')
                .ok_or_else(|| ParseDiscountsError(entry.to_string()))?;
            let category = category.trim();
            let percentage = Decimal::from_str(percentage.trim())
                .map_err(|_| ParseDiscountsError(entry.to_string()))?;
            if category.is_empty() {
                return Err(ParseDiscountsError(entry.to_string()));
            }
            table = table.with_discount(category, percentage);
        }
        Ok(table)
    }
}

#[async_trait]
impl DiscountLookup for StaticDiscounts {
    async fn lookup(
        &self,
        category: &str,
        _correlation_id: &CorrelationId,
    ) -> Result<Option<Discount>, DiscountError> {
        Ok(self.discounts.get(category).map(|percentage| Discount {
            category: category.to_string(),
            percentage: *percentage,
            version_id: self.version_id.clone(),
        }))
    }
}
