//! Redis cache backend.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, info};

use super::{Cache, Result};

/// Redis-backed cache shared by every server replica.
///
/// Entries are written with a millisecond expiry (`SET ... PX`) so Redis
/// evicts them without any sweep on our side.
pub struct RedisCache {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisCache {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., redis://localhost:6379)
    /// * `key_prefix` - Prefix for all keys (default: "btc")
    pub async fn new(url: &str, key_prefix: Option<&str>) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        info!(url = %url, "Connected to Redis for response cache");

        Ok(Self {
            conn,
            key_prefix: key_prefix.unwrap_or("btc").to_string(),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = self.prefixed(key);
        let mut conn = self.conn.clone();

        let bytes: Option<Vec<u8>> = conn.get(&key).await?;
        Ok(bytes)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let key = self.prefixed(key);
        let mut conn = self.conn.clone();

        // PX rejects zero, so round sub-millisecond TTLs up.
        let millis = (ttl.as_millis() as u64).max(1);
        let _: () = conn.pset_ex(&key, value, millis).await?;

        debug!(key = %key, ttl_ms = millis, "Stored response in Redis");
        Ok(())
    }
}
