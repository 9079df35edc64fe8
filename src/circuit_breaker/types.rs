use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, trial requests are let through
    HalfOpen,
}

impl CircuitState {
    /// Representation used in the shared store
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }

    /// Numeric value reported on the state gauge
    pub fn as_gauge(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLOSED" => Ok(CircuitState::Closed),
            "OPEN" => Ok(CircuitState::Open),
            "HALF_OPEN" => Ok(CircuitState::HalfOpen),
            other => Err(format!("unknown circuit state '{}'", other)),
        }
    }
}

/// Operator-set state that pre-empts automatic transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManualOverride {
    /// No override, the automatic state applies
    #[default]
    Normal,
    /// Reject every call
    ForceOpen,
    /// Let every call through
    ForceClosed,
}

impl ManualOverride {
    /// Representation used in the shared store
    pub fn as_str(&self) -> &'static str {
        match self {
            ManualOverride::Normal => "NORMAL",
            ManualOverride::ForceOpen => "FORCE_OPEN",
            ManualOverride::ForceClosed => "FORCE_CLOSED",
        }
    }
}

impl std::fmt::Display for ManualOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManualOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" => Ok(ManualOverride::Normal),
            "FORCE_OPEN" => Ok(ManualOverride::ForceOpen),
            "FORCE_CLOSED" => Ok(ManualOverride::ForceClosed),
            other => Err(format!("unknown manual override '{}'", other)),
        }
    }
}

/// Which side of the service a breaker protects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Traffic received by this service
    Inbound,
    /// Calls this service makes to its dependencies
    Outbound,
}

impl Direction {
    /// Prefix of the shared store key
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound:",
            Direction::Outbound => "outbound:",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inbound" => Ok(Direction::Inbound),
            "outbound" => Ok(Direction::Outbound),
            other => Err(other.to_string()),
        }
    }
}

/// Per-endpoint circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Number of consecutive failures before opening the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Number of consecutive successes in half-open state before closing
    #[serde(default = "default_half_open_success_threshold")]
    pub half_open_success_threshold: u32,

    /// Base duration the circuit stays open, in milliseconds
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,

    /// Upper bound for the backed-off open duration, in milliseconds
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,

    /// Override applied to a breaker that has no stored state yet
    #[serde(default)]
    pub manual_override: Option<ManualOverride>,
}

fn default_failure_threshold() -> u32 {
    20
}

fn default_half_open_success_threshold() -> u32 {
    10
}

fn default_open_timeout_ms() -> u64 {
    5 * 60 * 1000
}

fn default_max_timeout_ms() -> u64 {
    30 * 60 * 1000
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            half_open_success_threshold: default_half_open_success_threshold(),
            open_timeout_ms: default_open_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            manual_override: None,
        }
    }
}

impl EndpointConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }
}

/// Error returned by [`CircuitBreaker::handle_request`](super::CircuitBreaker::handle_request)
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    /// The breaker fast-failed and the operation was not invoked
    #[error("circuit breaker is open for endpoint {endpoint}")]
    Open { endpoint: String },

    /// The protected operation failed
    #[error("{0}")]
    Operation(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// Unwrap the operation error, if this is one
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            BreakerError::Open { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_state_round_trips_store_format() {
        for state in [CircuitState::Closed, CircuitState::Open, CircuitState::HalfOpen] {
            assert_eq!(state.as_str().parse::<CircuitState>().unwrap(), state);
        }
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
        assert!("half-open".parse::<CircuitState>().is_err());
    }

    #[test]
    fn test_manual_override_parse() {
        assert_eq!(
            "FORCE_OPEN".parse::<ManualOverride>().unwrap(),
            ManualOverride::ForceOpen
        );
        assert_eq!(ManualOverride::default(), ManualOverride::Normal);
        assert!("".parse::<ManualOverride>().is_err());
    }

    #[test]
    fn test_direction() {
        assert_eq!(Direction::Inbound.key_prefix(), "inbound:");
        assert_eq!(Direction::Outbound.key_prefix(), "outbound:");
        assert_eq!("Outbound".parse::<Direction>().unwrap(), Direction::Outbound);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = EndpointConfig::default();
        assert_eq!(config.failure_threshold, 20);
        assert_eq!(config.half_open_success_threshold, 10);
        assert_eq!(config.open_timeout(), Duration::from_secs(300));
        assert_eq!(config.max_timeout(), Duration::from_secs(1800));
        assert!(config.manual_override.is_none());
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: EndpointConfig =
            serde_yaml::from_str("failure_threshold: 3\nmanual_override: FORCE_CLOSED\n").unwrap();
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.half_open_success_threshold, 10);
        assert_eq!(config.manual_override, Some(ManualOverride::ForceClosed));
    }

    #[test]
    fn test_breaker_error_display() {
        let err: BreakerError<std::io::Error> = BreakerError::Open {
            endpoint: "/orders/{param}".to_string(),
        };
        assert!(err.is_open());
        assert_eq!(
            err.to_string(),
            "circuit breaker is open for endpoint /orders/{param}"
        );

        let err: BreakerError<String> = BreakerError::Operation("boom".to_string());
        assert!(!err.is_open());
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.into_operation(), Some("boom".to_string()));
    }
}
