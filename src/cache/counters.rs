//! Cached counters with seed-on-miss.
//!
//! The authoritative count lives in the backing store; the cache only
//! shadows it. On a miss the counter is seeded from a caller-supplied
//! closure that reads the store, which must already reflect the write
//! being counted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::warn;

use super::client::ListCacheClient;
use super::config::CacheConfig;

#[derive(Clone)]
pub struct CounterCache {
    client: Arc<dyn ListCacheClient>,
    ttl: Duration,
}

impl CounterCache {
    pub fn new(client: Arc<dyn ListCacheClient>, config: &CacheConfig) -> Self {
        Self {
            client,
            ttl: config.ttl(),
        }
    }

    /// Read the counter, seeding from `seed` on a miss.
    pub async fn get<F, Fut, E>(&self, key: &str, seed: F) -> Result<i64, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<i64, E>>,
    {
        match self.client.counter_get(key) {
            Ok(Some(value)) => {
                counter!("plover_cache_requests_total", "kind" => "counter", "result" => "hit")
                    .increment(1);
                Ok(value)
            }
            Ok(None) => self.seed(key, seed).await,
            Err(error) => {
                warn!(key, %error, "Counter read failed, serving from source");
                counter!("plover_cache_requests_total", "kind" => "counter", "result" => "degraded")
                    .increment(1);
                seed().await
            }
        }
    }

    /// Adjust a warm counter in place, or seed it from `seed` when cold.
    ///
    /// The seed value is returned as-is: the authoritative store has already
    /// absorbed the write this adjustment mirrors, so applying `delta` on
    /// top would double-count it.
    pub async fn incr<F, Fut, E>(&self, key: &str, delta: i64, seed: F) -> Result<i64, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<i64, E>>,
    {
        match self.client.counter_incr(key, delta) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => self.seed(key, seed).await,
            Err(error) => {
                warn!(key, %error, "Counter update failed, serving from source");
                seed().await
            }
        }
    }

    pub async fn decr<F, Fut, E>(&self, key: &str, delta: i64, seed: F) -> Result<i64, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<i64, E>>,
    {
        self.incr(key, -delta, seed).await
    }

    /// Drop the counter so the next read reseeds.
    pub fn invalidate(&self, key: &str) {
        if let Err(error) = self.client.delete(key) {
            warn!(key, %error, "Failed to invalidate counter");
        }
    }

    async fn seed<F, Fut, E>(&self, key: &str, seed: F) -> Result<i64, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<i64, E>>,
    {
        counter!("plover_cache_requests_total", "kind" => "counter", "result" => "miss")
            .increment(1);
        let value = seed().await?;
        if let Err(error) = self.client.counter_set(key, value, self.ttl) {
            warn!(key, %error, "Counter write-through failed");
        }
        Ok(value)
    }
}
