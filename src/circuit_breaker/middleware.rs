use super::service::CircuitBreakerService;
use super::types::Direction;
use crate::error::WardenError;
use crate::metrics;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

pub use crate::error::UNAVAILABLE_MESSAGE;

/// Axum middleware rejecting requests whose inbound breaker is open.
///
/// The breaker is keyed by the request path. Requests that pass are forwarded
/// unchanged; outcomes are not recorded here, that is left to code wrapping
/// the downstream call with [`CircuitBreaker::handle_request`](super::CircuitBreaker::handle_request).
///
/// ```rust,no_run
/// use axum::{middleware::from_fn_with_state, routing::get, Router};
/// use std::sync::Arc;
/// use warden::circuit_breaker::{circuit_breaker_middleware, CircuitBreakerService};
/// use warden::store::MemoryStateStore;
///
/// let service = CircuitBreakerService::new(Arc::new(MemoryStateStore::new()));
/// let app: Router = Router::new()
///     .route("/orders/:id", get(|| async { "order" }))
///     .layer(from_fn_with_state(service, circuit_breaker_middleware));
/// ```
pub async fn circuit_breaker_middleware(
    State(service): State<CircuitBreakerService>,
    request: Request,
    next: Next,
) -> Response {
    let breaker = service.inbound(request.uri().path()).await;

    if !breaker.admits().await {
        metrics::record_rejection(Direction::Inbound, breaker.endpoint());
        warn!(
            endpoint = %breaker.endpoint(),
            method = %request.method(),
            "Inbound circuit open, rejecting request"
        );
        return unavailable_response(breaker.endpoint());
    }

    next.run(request).await
}

/// 503 response sent for an open inbound circuit
pub fn unavailable_response(endpoint: &str) -> Response {
    WardenError::CircuitOpen {
        endpoint: endpoint.to_string(),
    }
    .into_response()
}
