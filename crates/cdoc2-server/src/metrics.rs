//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics  Prometheus text format
//!   GET /healthz  Liveness check (always 200 if process is running)

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus_client::{encoding::text::encode, metrics::counter::Counter, registry::Registry};
use std::sync::Arc;

/// Capsule lifecycle counters, shared by the API handlers and the sweep.
#[derive(Clone, Default)]
pub struct CapsuleMetrics {
    pub created: Counter,
    pub fetched: Counter,
    pub not_found: Counter,
    pub expired: Counter,
}

impl CapsuleMetrics {
    /// Counters get the `_total` suffix from the text encoder.
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "cdoc2_capsules_created",
            "Key capsules stored",
            metrics.created.clone(),
        );
        registry.register(
            "cdoc2_capsules_fetched",
            "Key capsules released to their recipient",
            metrics.fetched.clone(),
        );
        registry.register(
            "cdoc2_capsules_not_found",
            "Fetches answered with not found (absent id or wrong recipient)",
            metrics.not_found.clone(),
        );
        registry.register(
            "cdoc2_capsules_expired",
            "Key capsules deleted by the expiry sweep",
            metrics.expired.clone(),
        );
        metrics
    }
}

/// Serve Prometheus metrics and the health endpoint on `addr` (e.g. "127.0.0.1:9100")
pub async fn serve(addr: String, registry: Arc<Registry>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("metrics bind {addr}: {e}"))?;

    tracing::info!(addr = %addr, "metrics: listening on /metrics, /healthz");

    axum::serve(listener, router(registry))
        .await
        .map_err(|e| anyhow::anyhow!("metrics server: {e}"))
}

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(registry)
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    let mut body = String::new();
    match encode(&mut body, &registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness check: returns 200 if the process is running.
async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
