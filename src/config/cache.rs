//! Read cache configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Cache type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// Redis shared across server instances.
    #[default]
    Redis,
    /// Per-process in-memory cache.
    Memory,
    /// No caching; every read hits the store.
    #[serde(rename = "none")]
    Disabled,
}

/// Cache configuration (discriminated union).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache type discriminator.
    #[serde(rename = "type")]
    pub cache_type: CacheType,
    /// Entry time-to-live in milliseconds. Bounds read staleness.
    pub ttl_ms: u64,
    /// Redis-specific configuration.
    pub redis: RedisConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::Redis,
            ttl_ms: 1000,
            redis: RedisConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Redis-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub uri: String,
    /// Prefix for all cache keys.
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            uri: "redis://localhost:6379".to_string(),
            key_prefix: "btc".to_string(),
        }
    }
}
