//! HTTP API server for the order-fulfillment pipeline.
//!
//! Exposes order intake, inventory administration, the customer storefront
//! and manual restocking over REST, with structured logging (tracing) and
//! Prometheus metrics. Background workflows run on the same
//! [`WorkflowRuntime`] the handlers read from.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use state_store::StateStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflow::{WorkflowConfig, WorkflowRuntime};

/// Shared application state accessible from all handlers.
pub struct AppState<S: StateStore + Clone + 'static> {
    pub runtime: Arc<WorkflowRuntime<S>>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: StateStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/api/orders", post(routes::orders::submit::<S>))
        .route("/api/orders/{id}", get(routes::orders::get::<S>))
        .route("/api/inventory", post(routes::inventory::create::<S>))
        .route(
            "/api/inventory/{id}",
            get(routes::inventory::get::<S>).delete(routes::inventory::delete::<S>),
        )
        .route("/api/store", get(routes::inventory::store::<S>))
        .route("/api/restock", post(routes::restock::place::<S>))
        .route("/api/restock/{id}", get(routes::restock::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the workflow runtime over `store` and wraps it for the handlers.
pub fn create_state<S: StateStore + Clone + 'static>(
    store: S,
    config: WorkflowConfig,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        runtime: Arc::new(WorkflowRuntime::new(store, config)),
    })
}
