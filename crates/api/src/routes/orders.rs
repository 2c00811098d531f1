//! Order endpoints: line edits, checkout, cancellation and history.
//!
//! Orders are addressed by id but always scoped to the calling customer; an
//! order owned by someone else answers 404 exactly like a missing one.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, ProductId};
use domain::{Order, OrderLine, Repository};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AppState, parse_id};
use crate::error::ApiError;
use crate::identity::{Correlation, CustomerIdentity};

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateLineRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub lines: Vec<OrderLineResponse>,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub ordered_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub discount_percent: Decimal,
    pub total_price: Option<Money>,
}

impl From<&OrderLine> for OrderLineResponse {
    fn from(line: &OrderLine) -> Self {
        Self {
            product_id: line.product_id.to_string(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            discount_percent: line.discount_percent,
            total_price: line.total_price(),
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            customer_id: order.customer_id().to_string(),
            status: order.status().to_string(),
            lines: order.lines().iter().map(OrderLineResponse::from).collect(),
            total: order.total(),
            created_at: order.created_at(),
            ordered_at: order.ordered_at(),
        }
    }
}

/// Turns "the order is gone now" into 204 and anything else into the order.
fn order_or_no_content(order: Option<Order>) -> Response {
    match order {
        Some(order) => Json(OrderResponse::from(&order)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

// -- Handlers --

/// GET /orders — the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    CustomerIdentity(customer_id): CustomerIdentity,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.carts.order_history(customer_id).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id} — a single order owned by the caller.
#[tracing::instrument(skip(state))]
pub async fn get<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    CustomerIdentity(customer_id): CustomerIdentity,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = owned_order(&state, customer_id, &id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PUT /orders/{id}/lines/{product_id} — set a line's quantity.
///
/// Answers 204 when a quantity of zero removed the order's last line.
#[tracing::instrument(skip(state, req), fields(quantity = req.quantity))]
pub async fn update_line<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    CustomerIdentity(customer_id): CustomerIdentity,
    Path((id, product_id)): Path<(String, String)>,
    Json(req): Json<UpdateLineRequest>,
) -> Result<Response, ApiError> {
    let order = owned_order(&state, customer_id, &id).await?;
    let product_id: ProductId = parse_id("product", &product_id)?;

    let updated = state
        .carts
        .update_line_quantity(order.id(), product_id, req.quantity)
        .await?;
    Ok(order_or_no_content(updated))
}

/// DELETE /orders/{id}/lines/{product_id} — remove a line.
///
/// Answers 204 when that deleted the order.
#[tracing::instrument(skip(state))]
pub async fn remove_line<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    CustomerIdentity(customer_id): CustomerIdentity,
    Path((id, product_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let order = owned_order(&state, customer_id, &id).await?;
    let product_id: ProductId = parse_id("product", &product_id)?;

    let remaining = state.carts.remove_line(order.id(), product_id).await?;
    Ok(order_or_no_content(remaining))
}

/// POST /orders/{id}/checkout — apply discounts and complete the order.
#[tracing::instrument(skip(state, correlation), fields(correlation_id = %correlation.0))]
pub async fn checkout<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    CustomerIdentity(customer_id): CustomerIdentity,
    correlation: Correlation,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = owned_order(&state, customer_id, &id).await?;

    let completed = state
        .carts
        .checkout_with_correlation(order.id(), correlation.0)
        .await?;
    Ok(Json(OrderResponse::from(&completed)))
}

/// DELETE /orders/{id} — cancel a cart and return its stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    CustomerIdentity(customer_id): CustomerIdentity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order = owned_order(&state, customer_id, &id).await?;
    state.carts.cancel_cart(order.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn owned_order<R: Repository>(
    state: &AppState<R>,
    customer_id: CustomerId,
    raw_id: &str,
) -> Result<Order, ApiError> {
    let order_id: OrderId = parse_id("order", raw_id)?;
    let order = state.carts.get_order(order_id).await?;

    if order.customer_id() != customer_id {
        tracing::warn!(%order_id, "order requested by another customer");
        return Err(ApiError::NotFound(format!("Order {order_id} not found")));
    }
    Ok(order)
}
