//! Operator endpoints for inspecting breakers and setting manual overrides
//!
//! Every call addresses a single breaker by direction and endpoint. Because
//! state lives in the shared store, an override set here applies to every
//! process using that store.

use crate::circuit_breaker::{
    BreakerSnapshot, CircuitBreakerService, Direction, EndpointConfig, ManualOverride,
};
use crate::error::{Result, WardenError};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Admin handler state
#[derive(Clone)]
pub struct AdminState {
    pub service: CircuitBreakerService,
}

#[derive(Debug, Deserialize)]
pub struct EndpointQuery {
    pub endpoint: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub endpoint: String,
    #[serde(rename = "override")]
    pub value: ManualOverride,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub version: &'static str,
    pub status: &'static str,
}

/// Build the admin router
pub fn router(service: CircuitBreakerService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/admin/breakers/:direction", get(get_breaker))
        .route(
            "/admin/breakers/:direction/override",
            axum::routing::put(put_override).delete(delete_override),
        )
        .route("/admin/config/:direction", get(get_config))
        .with_state(AdminState { service })
}

fn parse_direction(raw: &str) -> Result<Direction> {
    raw.parse()
        .map_err(|_| WardenError::InvalidDirection(raw.to_string()))
}

fn require_endpoint(endpoint: &str) -> Result<()> {
    if endpoint.trim().is_empty() {
        return Err(WardenError::BadRequest("endpoint cannot be empty".to_string()));
    }
    Ok(())
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

pub async fn get_breaker(
    State(state): State<AdminState>,
    Path(direction): Path<String>,
    Query(query): Query<EndpointQuery>,
) -> Result<Json<BreakerSnapshot>> {
    let direction = parse_direction(&direction)?;
    require_endpoint(&query.endpoint)?;

    Ok(Json(state.service.snapshot(direction, &query.endpoint).await))
}

pub async fn put_override(
    State(state): State<AdminState>,
    Path(direction): Path<String>,
    Json(request): Json<OverrideRequest>,
) -> Result<Json<BreakerSnapshot>> {
    let direction = parse_direction(&direction)?;
    require_endpoint(&request.endpoint)?;

    info!(
        direction = %direction,
        endpoint = %request.endpoint,
        manual_override = %request.value,
        "Admin override requested"
    );
    let snapshot = state
        .service
        .set_manual_override(direction, &request.endpoint, request.value)
        .await?;
    Ok(Json(snapshot))
}

pub async fn delete_override(
    State(state): State<AdminState>,
    Path(direction): Path<String>,
    Query(query): Query<EndpointQuery>,
) -> Result<Json<BreakerSnapshot>> {
    let direction = parse_direction(&direction)?;
    require_endpoint(&query.endpoint)?;

    info!(
        direction = %direction,
        endpoint = %query.endpoint,
        "Admin override reset requested"
    );
    let snapshot = state
        .service
        .reset_manual_override(direction, &query.endpoint)
        .await?;
    Ok(Json(snapshot))
}

pub async fn get_config(
    State(state): State<AdminState>,
    Path(direction): Path<String>,
    Query(query): Query<EndpointQuery>,
) -> Result<Json<EndpointConfig>> {
    let direction = parse_direction(&direction)?;
    require_endpoint(&query.endpoint)?;

    Ok(Json(state.service.configs().get(direction, &query.endpoint)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direction() {
        assert_eq!(parse_direction("inbound").unwrap(), Direction::Inbound);
        assert!(matches!(
            parse_direction("upstream"),
            Err(WardenError::InvalidDirection(_))
        ));
    }

    #[test]
    fn test_override_request_format() {
        let request: OverrideRequest = serde_json::from_str(
            r#"{"endpoint": "https://a.b/orders/1", "override": "FORCE_OPEN"}"#,
        )
        .unwrap();
        assert_eq!(request.value, ManualOverride::ForceOpen);
        assert!(serde_json::from_str::<OverrideRequest>(
            r#"{"endpoint": "/x", "override": "SOMETIMES"}"#
        )
        .is_err());
    }

    #[test]
    fn test_require_endpoint() {
        assert!(require_endpoint("/orders").is_ok());
        assert!(require_endpoint("  ").is_err());
    }
}
