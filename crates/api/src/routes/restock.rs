//! Manual restock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::InventoryItemId;
use domain::{RestockRequest, RestockStatus};
use serde::{Deserialize, Serialize};
use state_store::StateStore;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct PlaceRestockRequest {
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct RestockResponse {
    pub item_id: String,
    pub quantity: u32,
    pub status: RestockStatus,
    pub accepted_at: DateTime<Utc>,
}

/// POST /api/restock: starts a restock pipeline for an item.
#[tracing::instrument(skip(state, req), fields(item_id = %req.item_id, quantity = req.quantity))]
pub async fn place<S: StateStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceRestockRequest>,
) -> Result<(StatusCode, Json<RestockResponse>), ApiError> {
    let item_id = parse_id::<InventoryItemId>("item_id", &req.item_id)?;
    let pipelines = state.runtime.pipelines();
    pipelines
        .accept(RestockRequest::new(item_id, req.quantity))
        .await?;

    let pipeline = pipelines
        .get_pipeline(item_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("restock for {item_id} vanished after accept")))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RestockResponse {
            item_id: item_id.to_string(),
            quantity: pipeline.request().quantity,
            status: pipeline.status(),
            accepted_at: pipeline.accepted_at(),
        }),
    ))
}

/// GET /api/restock/{id}: the latest pipeline of an item.
#[tracing::instrument(skip(state))]
pub async fn get<S: StateStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<RestockResponse>, ApiError> {
    let item_id = parse_id::<InventoryItemId>("item id", &id)?;
    let pipeline = state
        .runtime
        .pipelines()
        .get_pipeline(item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No restock pipeline for item {item_id}")))?;

    Ok(Json(RestockResponse {
        item_id: item_id.to_string(),
        quantity: pipeline.request().quantity,
        status: pipeline.status(),
        accepted_at: pipeline.accepted_at(),
    }))
}
