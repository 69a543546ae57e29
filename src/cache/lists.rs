//! Cache-aside bounded lists.
//!
//! Each key holds at most `limit` items, newest first, serialized as one
//! JSON document per entry. A miss reloads the whole window from the
//! authoritative source; a push into a warm entry is an atomic
//! prepend-and-trim that collapses a replayed entry onto one slot; a push
//! into a cold entry falls back to a full reload so the cache never holds
//! a list it cannot prove complete up to `limit`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::client::ListCacheClient;
use super::config::CacheConfig;

#[derive(Clone)]
pub struct BoundedListCache {
    client: Arc<dyn ListCacheClient>,
    limit: usize,
    ttl: Duration,
}

impl BoundedListCache {
    pub fn new(client: Arc<dyn ListCacheClient>, config: &CacheConfig) -> Self {
        Self {
            client,
            limit: config.list_limit_non_zero(),
            ttl: config.ttl(),
        }
    }

    /// Maximum number of items a cached list retains.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Read the cached list, reloading from `source` on a miss.
    ///
    /// `source` receives the window size and must return up to that many
    /// items, newest first. Client failures degrade to `source` without
    /// touching the cache; only `source` errors propagate.
    pub async fn load<T, F, Fut, E>(&self, key: &str, source: F) -> Result<Vec<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(usize) -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        match self.client.list_range(key) {
            Ok(Some(entries)) => match decode_entries(&entries) {
                Ok(items) => {
                    counter!("plover_cache_requests_total", "kind" => "list", "result" => "hit")
                        .increment(1);
                    Ok(items)
                }
                Err(error) => {
                    warn!(key, %error, "Dropping undecodable cached list");
                    if let Err(error) = self.client.delete(key) {
                        warn!(key, %error, "Failed to drop cached list");
                    }
                    self.reload(key, source).await
                }
            },
            Ok(None) => self.reload(key, source).await,
            Err(error) => {
                warn!(key, %error, "Cache read failed, serving from source");
                counter!("plover_cache_requests_total", "kind" => "list", "result" => "degraded")
                    .increment(1);
                source(self.limit).await
            }
        }
    }

    /// Prepend one new item to the cached list.
    ///
    /// Warm entry: atomic prepend-and-trim, preserving the entry's TTL; a
    /// replayed push of the same item keeps a single slot. Cold entry:
    /// full reload from `source` — a push must never create a one-item
    /// list that would masquerade as the complete window.
    pub async fn push<T, F, Fut, E>(&self, key: &str, item: &T, source: F) -> Result<(), E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(usize) -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let encoded = match serde_json::to_string(item) {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(key, %error, "Failed to encode cache item, invalidating entry");
                if let Err(error) = self.client.delete(key) {
                    warn!(key, %error, "Failed to drop cached list");
                }
                return Ok(());
            }
        };

        match self.client.list_push_front(key, encoded, self.limit) {
            Ok(true) => {
                counter!("plover_cache_pushes_total", "result" => "warm").increment(1);
                Ok(())
            }
            Ok(false) => {
                counter!("plover_cache_pushes_total", "result" => "cold_reload").increment(1);
                self.load(key, source).await.map(|_| ())
            }
            Err(error) => {
                warn!(key, %error, "Cache push failed, entry left for next reload");
                counter!("plover_cache_pushes_total", "result" => "degraded").increment(1);
                Ok(())
            }
        }
    }

    /// Drop the cached list so the next read reloads from the source.
    pub fn invalidate(&self, key: &str) {
        if let Err(error) = self.client.delete(key) {
            warn!(key, %error, "Failed to invalidate cached list");
        }
    }

    async fn reload<T, F, Fut, E>(&self, key: &str, source: F) -> Result<Vec<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(usize) -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        counter!("plover_cache_requests_total", "kind" => "list", "result" => "miss")
            .increment(1);
        let items = source(self.limit).await?;

        match encode_entries(&items) {
            Ok(entries) => {
                if let Err(error) = self.client.list_replace(key, entries, self.ttl) {
                    warn!(key, %error, "Cache write-through failed");
                }
            }
            Err(error) => {
                warn!(key, %error, "Failed to encode items for cache");
            }
        }
        Ok(items)
    }
}

fn decode_entries<T: DeserializeOwned>(entries: &[String]) -> Result<Vec<T>, serde_json::Error> {
    entries.iter().map(|entry| serde_json::from_str(entry)).collect()
}

fn encode_entries<T: Serialize>(items: &[T]) -> Result<Vec<String>, serde_json::Error> {
    items.iter().map(serde_json::to_string).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::super::client::MemoryCacheClient;
    use super::*;

    fn cache(limit: usize) -> BoundedListCache {
        let config = CacheConfig {
            list_limit: limit,
            ttl_seconds: 600,
        };
        BoundedListCache::new(Arc::new(MemoryCacheClient::new()), &config)
    }

    #[tokio::test]
    async fn load_populates_then_serves_without_the_source() {
        let cache = cache(3);
        let calls = AtomicUsize::new(0);

        let first: Vec<i64> = cache
            .load("k", |limit| {
                calls.fetch_add(1, Ordering::SeqCst);
                assert_eq!(limit, 3);
                async { Ok::<_, String>(vec![30, 20, 10]) }
            })
            .await
            .expect("load");
        assert_eq!(first, vec![30, 20, 10]);

        let second: Vec<i64> = cache
            .load("k", |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(vec![])
            })
            .await
            .expect("load");
        assert_eq!(second, vec![30, 20, 10]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn warm_push_keeps_only_the_newest_limit_items() {
        let cache = cache(3);
        cache
            .load("k", |_| async { Ok::<Vec<i64>, String>(vec![]) })
            .await
            .expect("warm up");

        let reloads = AtomicUsize::new(0);
        for item in 1..=5i64 {
            cache
                .push("k", &item, |_| async {
                    reloads.fetch_add(1, Ordering::SeqCst);
                    Ok::<Vec<i64>, String>(vec![])
                })
                .await
                .expect("push");
        }
        assert_eq!(reloads.load(Ordering::SeqCst), 0);

        let items: Vec<i64> = cache
            .load("k", |_| async { Ok::<_, String>(vec![]) })
            .await
            .expect("load");
        assert_eq!(items, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn cold_push_reloads_the_full_window() {
        let cache = cache(3);
        let reloaded = AtomicUsize::new(0);

        cache
            .push("k", &99i64, |limit| {
                reloaded.fetch_add(1, Ordering::SeqCst);
                assert_eq!(limit, 3);
                async { Ok::<_, String>(vec![99, 2, 1]) }
            })
            .await
            .expect("push");
        assert_eq!(reloaded.load(Ordering::SeqCst), 1);

        let items: Vec<i64> = cache
            .load("k", |_| async { Ok::<_, String>(vec![]) })
            .await
            .expect("load");
        assert_eq!(items, vec![99, 2, 1]);
    }

    #[tokio::test]
    async fn source_error_propagates() {
        let cache = cache(3);
        let err = cache
            .load::<i64, _, _, String>("k", |_| async { Err("down".to_string()) })
            .await
            .expect_err("error");
        assert_eq!(err, "down");
    }

    #[tokio::test]
    async fn invalidate_forces_a_reload() {
        let cache = cache(3);
        cache
            .load("k", |_| async { Ok::<_, String>(vec![1i64]) })
            .await
            .expect("load");

        cache.invalidate("k");

        let items: Vec<i64> = cache
            .load("k", |_| async { Ok::<_, String>(vec![2i64]) })
            .await
            .expect("load");
        assert_eq!(items, vec![2]);
    }
}
