use super::{StateStore, StoreError};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use tracing::{debug, info};

/// Redis-backed state store
///
/// Each breaker is one Redis hash. The connection manager is multiplexed and
/// reconnects on its own, so a single store is shared by every breaker of the
/// process.
#[derive(Clone)]
pub struct RedisStateStore {
    connection: ConnectionManager,
}

impl RedisStateStore {
    /// Connect to Redis at `redis_url`
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;

        info!("Connected breaker state store to Redis");
        Ok(Self { connection })
    }

    /// Test Redis connection
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, ()>(&mut connection)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn load_fields(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut connection = self.connection.clone();
        let fields: HashMap<String, String> = connection.hgetall(key).await?;

        debug!(key = key, fields = fields.len(), "Loaded breaker fields from Redis");
        Ok(fields)
    }

    async fn save_fields(
        &self,
        key: &str,
        fields: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }

        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut connection = self.connection.clone();
        connection.hset_multiple::<_, _, _, ()>(key, items.as_slice()).await?;

        debug!(key = key, fields = items.len(), "Saved breaker fields to Redis");
        Ok(())
    }
}
