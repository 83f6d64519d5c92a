//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, InventoryError, OrderError, RestockError};
use state_store::StoreError;
use workflow::WorkflowError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Workflow error.
    Workflow(WorkflowError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(&err),
            ApiError::Workflow(err) => workflow_error_to_response(&err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %message, "internal server error");
        } else if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(error = %message, "request failed on a transient fault");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn store_error_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
        e if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn domain_error_to_response(err: &DomainError) -> (StatusCode, String) {
    let status = match err {
        DomainError::Store(store_err) => store_error_status(store_err),
        DomainError::Inventory(inventory_err) => match inventory_err {
            InventoryError::AlreadyExists(_) => StatusCode::CONFLICT,
            InventoryError::ItemNotFound(_) => StatusCode::NOT_FOUND,
            InventoryError::InvalidItem(_) => StatusCode::BAD_REQUEST,
            InventoryError::InconsistentRequestHistory { .. } => StatusCode::SERVICE_UNAVAILABLE,
        },
        DomainError::Order(order_err) => match order_err {
            OrderError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            OrderError::InvalidQuantity { .. }
            | OrderError::DuplicateItem(_)
            | OrderError::NoItems => StatusCode::BAD_REQUEST,
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
        },
        DomainError::Restock(restock_err) => match restock_err {
            RestockError::AlreadyInProgress { .. } => StatusCode::CONFLICT,
            RestockError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
            RestockError::NotFound(_) => StatusCode::NOT_FOUND,
            RestockError::UnexpectedWakeup { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        },
    };
    (status, err.to_string())
}

fn workflow_error_to_response(err: &WorkflowError) -> (StatusCode, String) {
    match err {
        WorkflowError::Domain(domain_err) => domain_error_to_response(domain_err),
        WorkflowError::Store(store_err) => (store_error_status(store_err), err.to_string()),
        WorkflowError::InventoryService(_) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        WorkflowError::UnknownReminder(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}
