pub mod admin;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod metrics;
pub mod store;

use crate::circuit_breaker::CircuitBreakerService;
use crate::config::WardenConfig;
use crate::error::{Result, WardenError};
use crate::metrics::{metrics_handler, MetricsService};
use crate::store::{MemoryStateStore, RedisStateStore, StateStore};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Connect the state store named by the configuration.
///
/// Without a Redis section the store is process-local.
pub async fn build_store(config: &WardenConfig) -> Result<Arc<dyn StateStore>> {
    let Some(redis) = &config.redis else {
        warn!("No Redis configured, breaker state will not be shared between processes");
        return Ok(Arc::new(MemoryStateStore::new()));
    };

    let store = RedisStateStore::new(&redis.url).await?;
    if let Err(e) = store.ping().await {
        warn!(error = %e, "Redis ping failed, breaker state falls back to defaults until it recovers");
    }
    Ok(Arc::new(store))
}

/// Build the HTTP application: admin routes, health, and optionally metrics
pub fn build_app(service: CircuitBreakerService, metrics: Option<MetricsService>) -> Router {
    let mut app = admin::router(service);

    if let Some(metrics) = metrics {
        app = app.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(metrics),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Initialize the warden server
pub async fn init_server(config: WardenConfig) -> Result<()> {
    // Validate configuration
    config.validate()?;

    info!("Starting circuit breaker warden");

    let store = build_store(&config).await?;
    let service = CircuitBreakerService::with_registry(store, config.registry());
    info!(
        inbound = config.inbound.len(),
        outbound = config.outbound.len(),
        "Loaded endpoint configurations"
    );

    let metrics = MetricsService::new()?;
    let app = build_app(service, Some(metrics));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(WardenError::Io)?;

    info!("Warden listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| WardenError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden=debug,tower_http=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}
