//! Inventory administration and storefront endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::InventoryItemId;
use domain::{DomainError, InventoryItem, Money};
use serde::{Deserialize, Serialize};
use state_store::StateStore;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateItemRequest {
    pub item_id: Option<String>,
    pub description: String,
    pub unit_price_cents: i64,
    pub available_stock: u32,
    pub restock_threshold: u32,
    pub max_stock_threshold: u32,
}

#[derive(Serialize)]
pub struct ItemCreatedResponse {
    pub item_id: String,
}

/// Full item record, for administration.
#[derive(Serialize)]
pub struct ItemResponse {
    pub id: String,
    pub description: String,
    pub unit_price_cents: i64,
    pub available_stock: u32,
    pub restock_threshold: u32,
    pub max_stock_threshold: u32,
    pub on_reorder: bool,
}

impl From<&InventoryItem> for ItemResponse {
    fn from(item: &InventoryItem) -> Self {
        Self {
            id: item.id.to_string(),
            description: item.description.clone(),
            unit_price_cents: item.unit_price.cents(),
            available_stock: item.available_stock(),
            restock_threshold: item.restock_threshold(),
            max_stock_threshold: item.max_stock_threshold(),
            on_reorder: item.is_on_reorder(),
        }
    }
}

/// What a customer sees of an item.
#[derive(Serialize)]
pub struct StoreItemResponse {
    pub id: String,
    pub description: String,
    pub unit_price_cents: i64,
    pub available: u32,
}

/// POST /api/inventory: adds a new item to the ledger.
#[tracing::instrument(skip(state, req), fields(description = %req.description))]
pub async fn create<S: StateStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemCreatedResponse>), ApiError> {
    let item_id = match req.item_id.as_deref() {
        Some(raw) => parse_id::<InventoryItemId>("item_id", raw)?,
        None => InventoryItemId::new(),
    };

    let item = InventoryItem::new(
        item_id,
        req.description,
        Money::from_cents(req.unit_price_cents),
        req.available_stock,
        req.restock_threshold,
        req.max_stock_threshold,
    )
    .map_err(DomainError::from)?;
    state.runtime.ledger().create_item(item).await?;

    Ok((
        StatusCode::CREATED,
        Json(ItemCreatedResponse {
            item_id: item_id.to_string(),
        }),
    ))
}

/// GET /api/inventory/{id}: full item record.
#[tracing::instrument(skip(state))]
pub async fn get<S: StateStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item_id = parse_id::<InventoryItemId>("item id", &id)?;
    let item = state
        .runtime
        .ledger()
        .get_item(item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Inventory item not found: {item_id}")))?;

    Ok(Json(ItemResponse::from(&item)))
}

/// DELETE /api/inventory/{id}: removes an item from the ledger.
#[tracing::instrument(skip(state))]
pub async fn delete<S: StateStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let item_id = parse_id::<InventoryItemId>("item id", &id)?;
    state.runtime.ledger().delete_item(item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/store: customer-facing view of every item.
#[tracing::instrument(skip(state))]
pub async fn store<S: StateStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<StoreItemResponse>>, ApiError> {
    let items = state
        .runtime
        .ledger()
        .customer_inventory()
        .await?
        .into_iter()
        .map(|view| StoreItemResponse {
            id: view.id.to_string(),
            description: view.description,
            unit_price_cents: view.unit_price.cents(),
            available: view.customer_available_stock,
        })
        .collect();

    Ok(Json(items))
}
