//! Distributed circuit breaker
//!
//! A per-endpoint state machine (Closed → Open → HalfOpen → Closed) whose
//! state lives in a shared [`StateStore`](crate::store::StateStore), so every
//! process protecting the same endpoint agrees on the circuit.
//!
//! - Endpoints are normalized (`/orders/123` → `/orders/{param}`) before
//!   config lookup and state storage
//! - Inbound and outbound breakers live in separate namespaces
//! - The open period backs off exponentially with the failure count, up to a cap
//! - A manual override can force a circuit open or closed without touching
//!   its counters
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden::circuit_breaker::{CircuitBreakerService, EndpointConfig};
//! use warden::store::MemoryStateStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = CircuitBreakerService::new(Arc::new(MemoryStateStore::new()));
//!     service.set_outbound_config(
//!         "https://inventory.internal/items/1",
//!         EndpointConfig {
//!             failure_threshold: 5,
//!             ..Default::default()
//!         },
//!     );
//!
//!     let result = service
//!         .call_outbound("https://inventory.internal/items/42", || async {
//!             Ok::<_, std::io::Error>(b"payload".to_vec())
//!         })
//!         .await;
//!     assert!(result.is_ok());
//! }
//! ```

pub mod backoff;
pub mod breaker;
pub mod endpoint;
pub mod middleware;
pub mod registry;
pub mod service;
pub mod types;

pub use breaker::{BreakerSnapshot, CircuitBreaker};
pub use endpoint::normalize_endpoint;
pub use middleware::circuit_breaker_middleware;
pub use registry::ConfigRegistry;
pub use service::CircuitBreakerService;
pub use types::{BreakerError, CircuitState, Direction, EndpointConfig, ManualOverride};
