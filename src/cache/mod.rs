//! Cache-aside layer for read responses.
//!
//! This module contains:
//! - `Cache` trait: raw key/value backend with per-entry TTL
//! - `ResponseCache`: the best-effort policy used by the service
//! - Key scheme for balance and transaction-list responses
//! - Implementations: Redis, Memory
//!
//! The cache is never authoritative. Every fault is logged and turned into a
//! miss (on read) or dropped (on write).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, CacheType};
use crate::model::{TransactionWindow, UserId};

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// Raw key/value cache backend.
///
/// Implementations:
/// - `RedisCache`: shared Redis instance
/// - `MemoryCache`: per-process map, also used in tests
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a value. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value that expires after `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
}

/// Cache key scheme.
pub mod keys {
    use super::*;

    /// Key for a user's balance response.
    pub fn balance(user_id: UserId) -> String {
        format!("user:balance:{}", user_id)
    }

    /// Key for a transaction-list response.
    ///
    /// Scoped to the bounds the caller sent so different windows never share
    /// an entry. An open end keys as `open`, not as the resolved request time.
    pub fn transactions(window: &TransactionWindow) -> String {
        let end = if window.open_end {
            "open".to_string()
        } else {
            unix_nanos(&window.end)
        };
        format!(
            "user:transactions:{}:{}:{}",
            window.user_id,
            unix_nanos(&window.start),
            end
        )
    }

    fn unix_nanos(datetime: &chrono::DateTime<chrono::Utc>) -> String {
        // Seconds and nanos keep the key exact for dates past i64 nanos range.
        format!(
            "{}{:09}",
            datetime.timestamp(),
            datetime.timestamp_subsec_nanos()
        )
    }
}

/// Best-effort cache-aside wrapper around a [`Cache`] backend.
///
/// Responses are stored whole as JSON so a hit needs no further work.
#[derive(Clone)]
pub struct ResponseCache {
    backend: Option<Arc<dyn Cache>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(backend: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self {
            backend: Some(backend),
            ttl,
        }
    }

    /// A cache that always misses and never stores.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            ttl: Duration::ZERO,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up and decode a cached response.
    ///
    /// Backend faults and undecodable payloads are logged and reported as a
    /// miss.
    pub async fn fetch<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_ref()?;

        let bytes = match backend.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read from cache");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to decode cached response");
                None
            }
        }
    }

    /// Store a response. Faults are logged and dropped.
    pub async fn populate<T: Serialize>(&self, key: &str, value: &T) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        if self.ttl.is_zero() {
            return;
        }

        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode response for cache");
                return;
            }
        };

        if let Err(e) = backend.set(key, bytes, self.ttl).await {
            warn!(key = %key, error = %e, "Failed to write to cache");
        }
    }
}

/// Initialize the response cache from configuration.
///
/// An unreachable Redis at startup degrades to no caching rather than
/// failing the process.
pub async fn init_cache(config: &CacheConfig) -> ResponseCache {
    match config.cache_type {
        CacheType::Disabled => {
            info!("Cache disabled, all reads go to the store");
            ResponseCache::disabled()
        }
        CacheType::Memory => {
            info!(ttl_ms = config.ttl_ms, "Cache: in-memory");
            ResponseCache::new(Arc::new(MemoryCache::new()), config.ttl())
        }
        #[cfg(feature = "redis")]
        CacheType::Redis => {
            match RedisCache::new(&config.redis.uri, Some(&config.redis.key_prefix)).await {
                Ok(cache) => {
                    info!(ttl_ms = config.ttl_ms, "Cache: redis");
                    ResponseCache::new(Arc::new(cache), config.ttl())
                }
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, continuing without cache");
                    ResponseCache::disabled()
                }
            }
        }
        #[cfg(not(feature = "redis"))]
        CacheType::Redis => {
            warn!("Redis cache requested but 'redis' feature is not enabled, continuing without cache");
            ResponseCache::disabled()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        value: u32,
    }

    /// Backend that fails every call.
    struct BrokenCache;

    #[async_trait]
    impl Cache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(CacheError::Connection("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
            Err(CacheError::Connection("connection refused".to_string()))
        }
    }

    #[test]
    fn test_balance_key() {
        assert_eq!(keys::balance(1988), "user:balance:1988");
    }

    #[test]
    fn test_transactions_key_is_scoped_to_window() {
        let window = TransactionWindow {
            user_id: 1988,
            start: Utc.timestamp_opt(1_676_169_338, 0).unwrap(),
            end: Utc.timestamp_opt(1_676_172_938, 5).unwrap(),
            open_end: false,
        };
        assert_eq!(
            keys::transactions(&window),
            "user:transactions:1988:1676169338000000000:1676172938000000005"
        );

        let wider = TransactionWindow {
            end: Utc.timestamp_opt(1_676_172_939, 5).unwrap(),
            ..window.clone()
        };
        assert_ne!(keys::transactions(&window), keys::transactions(&wider));
    }

    #[test]
    fn test_open_ended_transactions_key_ignores_resolved_end() {
        let first = TransactionWindow {
            user_id: 7,
            start: DateTime::UNIX_EPOCH,
            end: Utc.timestamp_opt(2_000, 1).unwrap(),
            open_end: true,
        };
        let later = TransactionWindow {
            end: Utc.timestamp_opt(2_000, 900).unwrap(),
            ..first.clone()
        };

        assert_eq!(keys::transactions(&first), "user:transactions:7:0000000000:open");
        assert_eq!(keys::transactions(&first), keys::transactions(&later));
    }

    #[tokio::test]
    async fn test_fetch_after_populate_hits() {
        let cache = ResponseCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(1));

        cache.populate("k", &Payload { value: 7 }).await;

        assert_eq!(cache.fetch::<Payload>("k").await, Some(Payload { value: 7 }));
    }

    #[tokio::test]
    async fn test_backend_faults_are_misses() {
        let cache = ResponseCache::new(Arc::new(BrokenCache), Duration::from_secs(1));

        cache.populate("k", &Payload { value: 7 }).await;

        assert_eq!(cache.fetch::<Payload>("k").await, None);
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_a_miss() {
        let backend = Arc::new(MemoryCache::new());
        backend
            .set("k", b"{not json".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        let cache = ResponseCache::new(backend, Duration::from_secs(1));

        assert_eq!(cache.fetch::<Payload>("k").await, None);
    }

    #[tokio::test]
    async fn test_disabled_cache_never_stores() {
        let cache = ResponseCache::disabled();

        cache.populate("k", &Payload { value: 7 }).await;

        assert_eq!(cache.fetch::<Payload>("k").await, None);
    }

    #[tokio::test]
    async fn test_init_disabled_and_memory() {
        let mut config = CacheConfig {
            cache_type: CacheType::Disabled,
            ..Default::default()
        };
        let disabled = init_cache(&config).await;
        disabled.populate("k", &Payload { value: 1 }).await;
        assert_eq!(disabled.fetch::<Payload>("k").await, None);

        config.cache_type = CacheType::Memory;
        let memory = init_cache(&config).await;
        assert_eq!(memory.ttl(), Duration::from_millis(1000));
        memory.populate("k", &Payload { value: 1 }).await;
        assert_eq!(memory.fetch::<Payload>("k").await, Some(Payload { value: 1 }));
    }
}
