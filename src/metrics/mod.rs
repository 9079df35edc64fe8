use crate::circuit_breaker::{CircuitState, Direction};
use crate::error::{Result, WardenError};
use ::metrics::{counter, describe_counter, describe_gauge, gauge};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tracing::{debug, info};

/// Metrics service exposing breaker metrics in Prometheus format
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Install the global Prometheus recorder.
    ///
    /// Only one recorder can be installed per process.
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            WardenError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    fn register_metrics() {
        describe_gauge!(
            "warden_circuit_breaker_state",
            "Effective circuit breaker state (0 = closed, 1 = open, 2 = half-open)"
        );
        describe_counter!(
            "warden_circuit_breaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_counter!(
            "warden_circuit_breaker_rejections_total",
            "Total number of calls rejected by an open circuit"
        );
        describe_counter!(
            "warden_store_errors_total",
            "Total number of failed state store loads and saves"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(service): State<MetricsService>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service.render(),
    )
}

/// Record a state transition
pub fn record_transition(direction: Direction, endpoint: &str, to: CircuitState) {
    counter!(
        "warden_circuit_breaker_transitions_total",
        "direction" => direction.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    record_state(direction, endpoint, to);
}

/// Record the effective state of a breaker
pub fn record_state(direction: Direction, endpoint: &str, state: CircuitState) {
    gauge!(
        "warden_circuit_breaker_state",
        "direction" => direction.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .set(state.as_gauge());
}

/// Record a call rejected by an open circuit
pub fn record_rejection(direction: Direction, endpoint: &str) {
    counter!(
        "warden_circuit_breaker_rejections_total",
        "direction" => direction.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

/// Record a failed store operation (`load` or `save`)
pub fn record_store_error(operation: &'static str) {
    counter!("warden_store_errors_total", "operation" => operation).increment(1);
}
