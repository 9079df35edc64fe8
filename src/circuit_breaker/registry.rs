use super::endpoint::normalize_endpoint;
use super::types::{Direction, EndpointConfig};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct Namespaces {
    inbound: HashMap<String, EndpointConfig>,
    outbound: HashMap<String, EndpointConfig>,
}

impl Namespaces {
    fn get_mut(&mut self, direction: Direction) -> &mut HashMap<String, EndpointConfig> {
        match direction {
            Direction::Inbound => &mut self.inbound,
            Direction::Outbound => &mut self.outbound,
        }
    }
}

/// Per-endpoint breaker configuration for the inbound and outbound namespaces
///
/// Both namespaces sit behind one lock. Keys are normalized on the way in
/// and on lookup, so `/orders/1` and `/orders/2` share an entry.
#[derive(Debug)]
pub struct ConfigRegistry {
    namespaces: Mutex<Namespaces>,
    default: EndpointConfig,
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new(EndpointConfig::default())
    }
}

impl ConfigRegistry {
    /// Create a registry that answers unknown endpoints with `default`
    pub fn new(default: EndpointConfig) -> Self {
        Self {
            namespaces: Mutex::new(Namespaces::default()),
            default,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Namespaces> {
        self.namespaces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Configuration returned for endpoints without an explicit entry
    pub fn default_config(&self) -> &EndpointConfig {
        &self.default
    }

    pub fn set(&self, direction: Direction, endpoint: &str, config: EndpointConfig) {
        let key = normalize_endpoint(endpoint);
        debug!(
            direction = %direction,
            endpoint = %key,
            failure_threshold = config.failure_threshold,
            "Setting circuit breaker config"
        );
        self.lock().get_mut(direction).insert(key, config);
    }

    /// Configuration for `endpoint`, or the default when none was set
    pub fn get(&self, direction: Direction, endpoint: &str) -> EndpointConfig {
        let key = normalize_endpoint(endpoint);
        self.lock()
            .get_mut(direction)
            .get(&key)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn set_inbound_config(&self, endpoint: &str, config: EndpointConfig) {
        self.set(Direction::Inbound, endpoint, config);
    }

    pub fn get_inbound_config(&self, endpoint: &str) -> EndpointConfig {
        self.get(Direction::Inbound, endpoint)
    }

    pub fn set_outbound_config(&self, endpoint: &str, config: EndpointConfig) {
        self.set(Direction::Outbound, endpoint, config);
    }

    pub fn get_outbound_config(&self, endpoint: &str) -> EndpointConfig {
        self.get(Direction::Outbound, endpoint)
    }

    /// Normalized endpoints with an explicit entry
    pub fn endpoints(&self, direction: Direction) -> Vec<String> {
        let mut endpoints: Vec<String> = self.lock().get_mut(direction).keys().cloned().collect();
        endpoints.sort();
        endpoints
    }
}
