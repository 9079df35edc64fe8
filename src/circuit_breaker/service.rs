use super::breaker::{BreakerSnapshot, CircuitBreaker};
use super::registry::ConfigRegistry;
use super::types::{BreakerError, Direction, EndpointConfig, ManualOverride};
use crate::store::{StateStore, StoreError};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Entry point for obtaining breakers
///
/// Holds the shared state store and the configuration registry. Breakers are
/// not cached: each one is hydrated from the store when requested, so the
/// store is the only source of truth across processes. Cloning is cheap.
#[derive(Clone)]
pub struct CircuitBreakerService {
    store: Arc<dyn StateStore>,
    configs: Arc<ConfigRegistry>,
}

impl CircuitBreakerService {
    /// Create a service using the built-in default configuration
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self::with_registry(store, ConfigRegistry::default())
    }

    pub fn with_registry(store: Arc<dyn StateStore>, configs: ConfigRegistry) -> Self {
        Self {
            store,
            configs: Arc::new(configs),
        }
    }

    pub fn configs(&self) -> &ConfigRegistry {
        &self.configs
    }

    pub fn store(&self) -> Arc<dyn StateStore> {
        self.store.clone()
    }

    /// Hydrate the breaker for `endpoint` in the given namespace
    pub async fn breaker(&self, direction: Direction, endpoint: &str) -> CircuitBreaker {
        let config = self.configs.get(direction, endpoint);
        debug!(direction = %direction, endpoint = endpoint, "Materializing circuit breaker");
        CircuitBreaker::load(endpoint, direction, config, self.store.clone()).await
    }

    /// Breaker protecting traffic received on `endpoint`
    pub async fn inbound(&self, endpoint: &str) -> CircuitBreaker {
        self.breaker(Direction::Inbound, endpoint).await
    }

    /// Breaker protecting calls made to `endpoint`
    pub async fn outbound(&self, endpoint: &str) -> CircuitBreaker {
        self.breaker(Direction::Outbound, endpoint).await
    }

    /// Run `operation` under a freshly hydrated breaker for `endpoint`.
    ///
    /// The backed-off open timeout is not stored, so a breaker hydrated here
    /// always waits the base `open_timeout_ms` before a trial call. Hold on to
    /// a [`CircuitBreaker`] from [`breaker`](Self::breaker) to get backoff
    /// across repeated openings.
    pub async fn call<F, Fut, T, E>(
        &self,
        direction: Direction,
        endpoint: &str,
        operation: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let breaker = self.breaker(direction, endpoint).await;
        breaker.handle_request(operation).await
    }

    pub async fn call_inbound<F, Fut, T, E>(
        &self,
        endpoint: &str,
        operation: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call(Direction::Inbound, endpoint, operation).await
    }

    pub async fn call_outbound<F, Fut, T, E>(
        &self,
        endpoint: &str,
        operation: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call(Direction::Outbound, endpoint, operation).await
    }

    /// Set the manual override of one breaker and return its new view
    pub async fn set_manual_override(
        &self,
        direction: Direction,
        endpoint: &str,
        value: ManualOverride,
    ) -> Result<BreakerSnapshot, StoreError> {
        let breaker = self.breaker(direction, endpoint).await;
        breaker.set_manual_override(value).await?;
        Ok(breaker.snapshot().await)
    }

    /// Clear the manual override of one breaker and return its new view
    pub async fn reset_manual_override(
        &self,
        direction: Direction,
        endpoint: &str,
    ) -> Result<BreakerSnapshot, StoreError> {
        let breaker = self.breaker(direction, endpoint).await;
        breaker.reset_manual_override().await?;
        Ok(breaker.snapshot().await)
    }

    pub async fn snapshot(&self, direction: Direction, endpoint: &str) -> BreakerSnapshot {
        let breaker = self.breaker(direction, endpoint).await;
        breaker.snapshot().await
    }

    pub fn set_inbound_config(&self, endpoint: &str, config: EndpointConfig) {
        self.configs.set_inbound_config(endpoint, config);
    }

    pub fn get_inbound_config(&self, endpoint: &str) -> EndpointConfig {
        self.configs.get_inbound_config(endpoint)
    }

    pub fn set_outbound_config(&self, endpoint: &str, config: EndpointConfig) {
        self.configs.set_outbound_config(endpoint, config);
    }

    pub fn get_outbound_config(&self, endpoint: &str) -> EndpointConfig {
        self.configs.get_outbound_config(endpoint)
    }
}

impl std::fmt::Debug for CircuitBreakerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerService")
            .field("configs", &self.configs)
            .finish_non_exhaustive()
    }
}
