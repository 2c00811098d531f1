//! Catalog endpoints used to stock the store.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, ProductId};
use domain::{Product, Repository};
use serde::Deserialize;

use super::{AppState, parse_id};
use crate::error::ApiError;

/// Largest unit price the catalog accepts; matches the `NUMERIC(14,2)` column.
fn max_unit_price() -> Money {
    Money::from_cents(99_999_999_999_999)
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub unit_price: Money,
    pub stock: u32,
    pub category: String,
    #[serde(default)]
    pub brand: String,
    pub description: Option<String>,
}

/// POST /products — register a product with its initial stock.
#[tracing::instrument(skip(state, req), fields(name = %req.name))]
pub async fn create<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    if req.name.trim().is_empty() || req.category.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Product name and category are required".to_string(),
        ));
    }
    if req.unit_price.is_negative() {
        return Err(ApiError::BadRequest(
            "Unit price must not be negative".to_string(),
        ));
    }
    if req.unit_price > max_unit_price() {
        return Err(ApiError::BadRequest(format!(
            "Unit price must not exceed {}",
            max_unit_price()
        )));
    }

    let mut product = Product::new(
        ProductId::new(),
        req.name.trim(),
        Money::new(req.unit_price.amount()),
        req.stock,
        req.category.trim(),
        req.brand.trim(),
    );
    if let Some(description) = req.description {
        product = product.with_description(description);
    }

    state
        .repository
        .save_product(&product)
        .await
        .map_err(domain::DomainError::from)?;

    tracing::info!(product_id = %product.id(), stock = product.stock(), "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/{id} — load a product with its current stock.
#[tracing::instrument(skip(state))]
pub async fn get<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product_id: ProductId = parse_id("product", &id)?;

    let product = state
        .repository
        .load_product(product_id)
        .await
        .map_err(domain::DomainError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;

    Ok(Json(product))
}
