use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

pub async fn healthz() -> &'static str {
    "OK"
}

/// Prometheus text exposition of the pipeline counters.
pub async fn metrics_text() -> Response {
    match crate::metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            super::error_response(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable")
        }
    }
}
