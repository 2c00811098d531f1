//! Warranty records and the all-or-nothing consistency rule.

use common::{OrderId, ProductId, WarrantyId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DomainError;
use crate::repository::WarrantyRepository;

/// Errors raised by warranty validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarrantyError {
    /// Some, but not all, descriptive fields are present.
    #[error("Inconsistent warranty: missing {}", missing.join(", "))]
    InconsistentWarranty { missing: Vec<&'static str> },
}

/// Warranty terms attached to an order or product.
///
/// The four descriptive fields (`duration_months`, `warranty_type`, `terms`,
/// `details`) are either all present or all absent; see [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Warranty {
    pub id: WarrantyId,
    pub order_id: Option<OrderId>,
    pub product_id: Option<ProductId>,
    pub duration_months: Option<u32>,
    pub warranty_type: Option<String>,
    pub terms: Option<String>,
    pub details: Option<String>,
}

impl Warranty {
    /// Creates a warranty with no descriptive fields.
    pub fn new(id: WarrantyId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Fills in all four descriptive fields.
    pub fn with_terms(
        mut self,
        duration_months: u32,
        warranty_type: impl Into<String>,
        terms: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        self.duration_months = Some(duration_months);
        self.warranty_type = Some(warranty_type.into());
        self.terms = Some(terms.into());
        self.details = Some(details.into());
        self
    }

    /// Returns true if every descriptive field is absent.
    pub fn is_blank(&self) -> bool {
        self.present_fields().iter().all(|(_, present)| !present)
    }

    /// Replaces empty or whitespace-only strings with `None`.
    pub fn normalized(mut self) -> Self {
        for field in [&mut self.warranty_type, &mut self.terms, &mut self.details] {
            if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *field = None;
            }
        }
        self
    }

    fn present_fields(&self) -> [(&'static str, bool); 4] {
        [
            ("duration_months", self.duration_months.is_some()),
            ("warranty_type", is_present(&self.warranty_type)),
            ("terms", is_present(&self.terms)),
            ("details", is_present(&self.details)),
        ]
    }
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Checks that the descriptive fields are all present or all absent.
///
/// `None`, empty and whitespace-only strings count as absent. On failure the
/// error lists the absent fields.
pub fn validate(warranty: &Warranty) -> Result<(), WarrantyError> {
    let fields = warranty.present_fields();
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() || missing.len() == fields.len() {
        Ok(())
    } else {
        Err(WarrantyError::InconsistentWarranty { missing })
    }
}

/// Validating front for warranty storage.
pub struct WarrantyService<R> {
    repository: R,
}

impl<R: WarrantyRepository> WarrantyService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Validates and persists a warranty. Nothing is written if validation
    /// fails.
    #[tracing::instrument(skip(self, warranty), fields(warranty_id = %warranty.id))]
    pub async fn save_warranty(&self, warranty: Warranty) -> Result<Warranty, DomainError> {
        validate(&warranty)?;
        let warranty = warranty.normalized();
        self.repository.save_warranty(&warranty).await?;
        tracing::debug!(blank = warranty.is_blank(), "warranty saved");
        Ok(warranty)
    }

    /// Loads a warranty.
    #[tracing::instrument(skip(self))]
    pub async fn get_warranty(&self, warranty_id: WarrantyId) -> Result<Warranty, DomainError> {
        self.repository
            .load_warranty(warranty_id)
            .await?
            .ok_or(DomainError::WarrantyNotFound(warranty_id))
    }
}
