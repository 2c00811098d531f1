//! Warranty endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, ProductId, WarrantyId};
use domain::{Repository, Warranty};
use serde::Deserialize;

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SaveWarrantyRequest {
    pub id: Option<WarrantyId>,
    pub order_id: Option<OrderId>,
    pub product_id: Option<ProductId>,
    pub duration_months: Option<u32>,
    pub warranty_type: Option<String>,
    pub terms: Option<String>,
    pub details: Option<String>,
}

impl From<SaveWarrantyRequest> for Warranty {
    fn from(req: SaveWarrantyRequest) -> Self {
        Warranty {
            id: req.id.unwrap_or_default(),
            order_id: req.order_id,
            product_id: req.product_id,
            duration_months: req.duration_months,
            warranty_type: req.warranty_type,
            terms: req.terms,
            details: req.details,
        }
    }
}

/// POST /warranties — validate and store a warranty record.
#[tracing::instrument(skip(state, req))]
pub async fn create<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<SaveWarrantyRequest>,
) -> Result<(StatusCode, Json<Warranty>), ApiError> {
    let saved = state.warranties.save_warranty(req.into()).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /warranties/{id}
#[tracing::instrument(skip(state))]
pub async fn get<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<Json<Warranty>, ApiError> {
    let warranty_id: WarrantyId = parse_id("warranty", &id)?;
    let warranty = state.warranties.get_warranty(warranty_id).await?;
    Ok(Json(warranty))
}
