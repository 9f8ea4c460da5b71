//! Health and metrics endpoints, following `modules/gl/src/health.rs`'s
//! `{status, service, version}` shape, plus a Prometheus text endpoint since
//! this crate carries a `prometheus` dependency the same way `modules/gl`
//! does.

use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use prometheus::{Encoder, TextEncoder};
use serde_json::Value;

pub async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "orchestrator",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn metrics() -> impl IntoResponse {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
    }
    ([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer)
}
