//! The caller's open cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::ProductId;
use domain::Repository;
use serde::Deserialize;

use super::orders::OrderResponse;
use super::{AppState, parse_id};
use crate::error::ApiError;
use crate::identity::CustomerIdentity;

#[derive(Deserialize)]
pub struct AddLineRequest {
    pub product_id: String,
    pub quantity: u32,
}

/// GET /cart — the caller's cart, created empty on first access.
#[tracing::instrument(skip(state))]
pub async fn get<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    CustomerIdentity(customer_id): CustomerIdentity,
) -> Result<Json<OrderResponse>, ApiError> {
    let cart = state.carts.get_or_create_cart(customer_id).await?;
    Ok(Json(OrderResponse::from(&cart)))
}

/// POST /cart/lines — add units of a product, reserving them.
#[tracing::instrument(skip(state, req), fields(product_id = %req.product_id, quantity = req.quantity))]
pub async fn add_line<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    CustomerIdentity(customer_id): CustomerIdentity,
    Json(req): Json<AddLineRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let product_id: ProductId = parse_id("product", &req.product_id)?;

    let cart = state
        .carts
        .add_line(customer_id, product_id, req.quantity)
        .await?;
    Ok(Json(OrderResponse::from(&cart)))
}
