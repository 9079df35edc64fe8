use crate::circuit_breaker::{ConfigRegistry, EndpointConfig};
use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main warden configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Shared state store; breakers stay process-local when absent
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Configuration for endpoints without an explicit rule
    #[serde(default)]
    pub defaults: EndpointConfig,
    /// Rules for breakers protecting received traffic
    #[serde(default)]
    pub inbound: Vec<EndpointRule>,
    /// Rules for breakers protecting calls to dependencies
    #[serde(default)]
    pub outbound: Vec<EndpointRule>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
}

/// Breaker configuration for one endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointRule {
    /// Endpoint URL or path; normalized when registered
    pub endpoint: String,
    #[serde(flatten)]
    pub config: EndpointConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl WardenConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WardenError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| WardenError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_endpoint_config("defaults", &self.defaults)?;

        for (namespace, rules) in [("inbound", &self.inbound), ("outbound", &self.outbound)] {
            for rule in rules {
                if rule.endpoint.trim().is_empty() {
                    return Err(WardenError::Config(format!(
                        "Endpoint cannot be empty in {} rules",
                        namespace
                    )));
                }
                validate_endpoint_config(&rule.endpoint, &rule.config)?;
            }
        }

        if let Some(redis) = &self.redis {
            if !redis.url.starts_with("redis://") && !redis.url.starts_with("rediss://") {
                return Err(WardenError::Config(format!(
                    "Redis URL must start with redis:// or rediss://, got: {}",
                    redis.url
                )));
            }
        }

        Ok(())
    }

    /// Build the configuration registry described by this file
    pub fn registry(&self) -> ConfigRegistry {
        let registry = ConfigRegistry::new(self.defaults.clone());
        for rule in &self.inbound {
            registry.set_inbound_config(&rule.endpoint, rule.config.clone());
        }
        for rule in &self.outbound {
            registry.set_outbound_config(&rule.endpoint, rule.config.clone());
        }
        registry
    }

    /// Create a default configuration for testing
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            redis: None,
            defaults: EndpointConfig::default(),
            inbound: vec![],
            outbound: vec![],
        }
    }
}

fn validate_endpoint_config(name: &str, config: &EndpointConfig) -> Result<()> {
    if config.failure_threshold == 0 {
        return Err(WardenError::Config(format!(
            "failure_threshold must be > 0 for: {}",
            name
        )));
    }
    if config.half_open_success_threshold == 0 {
        return Err(WardenError::Config(format!(
            "half_open_success_threshold must be > 0 for: {}",
            name
        )));
    }
    if config.open_timeout_ms == 0 {
        return Err(WardenError::Config(format!(
            "open_timeout_ms must be > 0 for: {}",
            name
        )));
    }
    if config.max_timeout_ms < config.open_timeout_ms {
        return Err(WardenError::Config(format!(
            "max_timeout_ms must be >= open_timeout_ms for: {}",
            name
        )));
    }
    Ok(())
}
