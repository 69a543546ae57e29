//! Bounded list cache and counter cache.
//!
//! Cache-aside over an injected [`ListCacheClient`]: reads populate lazily
//! from the authoritative source on miss, writes push incrementally into
//! existing entries. The cache is an optimization, never a correctness
//! dependency — a failing client degrades to reading the source directly.
//!
//! Capacity and TTL come from `[cache]` in the configuration file:
//!
//! ```toml
//! [cache]
//! list_limit = 200
//! ttl_seconds = 604800
//! ```

mod client;
mod config;
mod counters;
pub mod keys;
mod lists;
mod lock;

pub use client::{CacheError, ListCacheClient, MemoryCacheClient};
pub use config::CacheConfig;
pub use counters::CounterCache;
pub use lists::BoundedListCache;
