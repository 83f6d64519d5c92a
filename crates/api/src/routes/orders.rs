//! Order intake and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{InventoryItemId, OrderId};
use domain::{CustomerOrderItem, OrderStatus};
use serde::{Deserialize, Serialize};
use state_store::StateStore;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct SubmitOrderRequest {
    /// Client-chosen id; a fresh one is generated when absent.
    pub order_id: Option<String>,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub item_id: String,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderSubmittedResponse {
    pub order_id: String,
    pub status: OrderStatus,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub status: OrderStatus,
    pub request_sequence: u64,
    pub submitted_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub item_id: String,
    pub quantity: u32,
    pub remaining: u32,
}

// -- Handlers --

/// POST /api/orders: stores the cart and schedules fulfillment.
#[tracing::instrument(skip(state, req), fields(items = req.items.len()))]
pub async fn submit<S: StateStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<SubmitOrderRequest>,
) -> Result<(StatusCode, Json<OrderSubmittedResponse>), ApiError> {
    let order_id = match req.order_id.as_deref() {
        Some(raw) => parse_id::<OrderId>("order_id", raw)?,
        None => OrderId::new(),
    };

    let items = req
        .items
        .iter()
        .map(|item| {
            let item_id = parse_id::<InventoryItemId>("item_id", &item.item_id)?;
            Ok::<_, ApiError>(CustomerOrderItem::new(item_id, item.quantity))
        })
        .collect::<Result<Vec<_>, _>>()?;

    state.runtime.orders().submit_order(order_id, items).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(OrderSubmittedResponse {
            order_id: order_id.to_string(),
            status: OrderStatus::Submitted,
        }),
    ))
}

/// GET /api/orders/{id}: last committed status and per-line progress.
///
/// An id nobody submitted reports `New` with no lines.
#[tracing::instrument(skip(state))]
pub async fn get<S: StateStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_id::<OrderId>("order id", &id)?;

    let response = match state.runtime.orders().get_order(order_id).await? {
        Some(order) => OrderResponse {
            id: order_id.to_string(),
            status: order.status(),
            request_sequence: order.request_sequence(),
            submitted_at: order.submitted_at(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    item_id: item.item_id.to_string(),
                    quantity: item.quantity,
                    remaining: item.fulfillment_remaining(),
                })
                .collect(),
        },
        None => OrderResponse {
            id: order_id.to_string(),
            status: OrderStatus::New,
            request_sequence: 0,
            submitted_at: None,
            items: Vec::new(),
        },
    };

    Ok(Json(response))
}
