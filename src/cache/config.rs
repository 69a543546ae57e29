//! Cache configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_LIST_LIMIT: usize = 200;
const DEFAULT_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Process-wide bounded-list limit and entry TTL.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries retained per cached list (the window `L`).
    pub list_limit: usize,
    /// Lifetime of a cache entry before it must be reloaded from the source.
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            list_limit: DEFAULT_LIST_LIMIT,
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// The list limit clamped to at least one entry.
    pub fn list_limit_non_zero(&self) -> usize {
        self.list_limit.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.list_limit, 200);
        assert_eq!(config.ttl(), Duration::from_secs(604_800));
    }

    #[test]
    fn zero_limit_clamps_to_one() {
        let config = CacheConfig {
            list_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.list_limit_non_zero(), 1);
    }
}
