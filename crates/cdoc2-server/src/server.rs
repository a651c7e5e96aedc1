//! Server lifecycle: store, routes, sweep, metrics, graceful shutdown

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{any, get, post},
    Router,
};
use cdoc2_capsule::{open_store, ExpiryPolicy, KeyCapsuleService};
use cdoc2_core::config::{Cdoc2Config, ServerMode};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api;
use crate::identity::{forwarded_identity, IdentitySource};
use crate::metrics::CapsuleMetrics;

/// State shared by the capsule handlers
#[derive(Clone)]
pub struct AppState {
    pub service: KeyCapsuleService,
    pub metrics: CapsuleMetrics,
}

/// Capsule routes for one mode, with identity and access-log middleware.
pub fn router(state: AppState, mode: ServerMode, identity: IdentitySource) -> Router {
    let capsules = match mode {
        ServerMode::Put => Router::new()
            .route("/key-capsules", post(api::create_capsule))
            .route("/key-capsules/{id}", any(api::not_served)),
        ServerMode::Get => Router::new()
            .route("/key-capsules", any(api::not_served))
            .route("/key-capsules/{id}", get(api::get_capsule)),
    };

    capsules
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            Arc::new(identity),
            forwarded_identity,
        ))
        .layer(middleware::from_fn(crate::access_log::log_requests))
}

pub async fn run(config: Cdoc2Config) -> Result<()> {
    let policy = ExpiryPolicy::from_config(&config.key_capsule).context("key_capsule config")?;
    let store = open_store(&config.storage).context("opening capsule store")?;
    info!(
        backend = ?config.storage.backend,
        default_expiration = %config.key_capsule.default_expiration_duration,
        max_expiration = %config.key_capsule.max_expiration_duration,
        "capsule store ready"
    );
    let service = KeyCapsuleService::new(store, policy);

    // ── Metrics ──────────────────────────────────────────────────────────
    let mut registry = Registry::default();
    let metrics = CapsuleMetrics::register(&mut registry);
    if let Some(addr) = config.server.metrics_addr.clone() {
        let registry = Arc::new(registry);
        tokio::spawn(async move {
            if let Err(e) = crate::metrics::serve(addr, registry).await {
                error!("metrics server failed: {e}");
            }
        });
    }

    // ── Expiry sweep ─────────────────────────────────────────────────────
    let sweep = if config.key_capsule.cleanup.enabled {
        let period = config
            .key_capsule
            .cleanup
            .interval()?
            .to_std()
            .context("cleanup schedule must be positive")?;
        Some(crate::cleanup::spawn(service.clone(), period, metrics.clone()))
    } else {
        info!("expiry sweep disabled");
        None
    };

    // ── HTTP ─────────────────────────────────────────────────────────────
    let mode = config.server.mode;
    if mode == ServerMode::Get && !config.server.trust_forwarded_identity {
        warn!("get mode without trust_forwarded_identity: every fetch will be rejected with 401");
    }
    let identity = IdentitySource {
        trust_forwarded: config.server.trust_forwarded_identity,
        header: config.server.forwarded_identity_header.clone(),
    };
    let app = router(AppState { service, metrics }, mode, identity);

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("binding {}", config.server.listen))?;
    info!(addr = %config.server.listen, %mode, "key capsule API: listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("key capsule API server")?;

    if let Some(sweep) = sweep {
        sweep.abort();
    }
    info!("cdoc2-capsule-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("registering Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("registering SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining connections");
}
