//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for the metrics the service records.
pub fn describe() {
    describe_counter!("orders_submitted_total", "Orders accepted for fulfillment");
    describe_counter!("orders_shipped_total", "Orders fully supplied");
    describe_counter!("orders_backordered_total", "Wake-ups that left an order short");
    describe_counter!("orders_canceled_total", "Orders canceled for an unknown item");
    describe_histogram!(
        "order_wakeup_duration_seconds",
        Unit::Seconds,
        "Duration of one fulfillment pass"
    );
    describe_counter!(
        "restock_requests_accepted_total",
        "Restock pipelines started"
    );
    describe_counter!(
        "restock_requests_rejected_total",
        "Restock requests refused while one is in progress"
    );
    describe_counter!(
        "restock_unexpected_wakeups_total",
        "Wake-ups delivered to a finished restock pipeline"
    );
    describe_counter!(
        "dispatcher_deliveries_total",
        "Completed restocks added back to inventory"
    );
    describe_counter!(
        "workflow_wakeup_failures_total",
        "Scheduled wake-ups that returned an error"
    );
}

/// GET /metrics: Prometheus text exposition of every recorded metric.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
