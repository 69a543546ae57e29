//! Cache client trait and the in-memory implementation.
//!
//! Components receive a client handle at construction; test and production
//! configurations differ only in which concrete client is injected. The
//! contract every client must honor: `list_push_front` is an atomic
//! read-modify-write (prepend then trim in one step), so concurrent pushes
//! to the same key never lose an entry — the trim only ever drops from the
//! tail.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::client";

#[derive(Debug, Error)]
#[error("cache client error: {0}")]
pub struct CacheError(pub String);

/// Backend contract for bounded lists and counters.
pub trait ListCacheClient: Send + Sync {
    /// Full contents of a list entry, newest first. `None` means cold.
    fn list_range(&self, key: &str) -> Result<Option<Vec<String>>, CacheError>;

    /// Atomically prepend and trim to `trim_to` entries, dropping any
    /// existing copy of the same entry first so a replayed push collapses
    /// onto one slot. Returns `false` without writing when the entry is
    /// cold: a cold push must go through a full reload instead of creating
    /// a singleton list.
    fn list_push_front(&self, key: &str, entry: String, trim_to: usize)
        -> Result<bool, CacheError>;

    /// Replace (or create) a list entry with the given TTL.
    fn list_replace(
        &self,
        key: &str,
        entries: Vec<String>,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Drop an entry outright, list or counter.
    fn delete(&self, key: &str) -> Result<(), CacheError>;

    fn counter_get(&self, key: &str) -> Result<Option<i64>, CacheError>;

    fn counter_set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError>;

    /// Adjust a warm counter in place; `None` means the counter is cold and
    /// must be seeded from the authoritative source first.
    fn counter_incr(&self, key: &str, delta: i64) -> Result<Option<i64>, CacheError>;

    /// Remove expired entries, returning how many were dropped.
    fn purge_expired(&self) -> Result<usize, CacheError>;
}

enum Value {
    List(VecDeque<String>),
    Counter(i64),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// In-process cache client keyed by string, with per-entry expiry.
#[derive(Default)]
pub struct MemoryCacheClient {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCacheClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ListCacheClient for MemoryCacheClient {
    fn list_range(&self, key: &str) -> Result<Option<Vec<String>>, CacheError> {
        let entries = rw_read(&self.entries, SOURCE, "list_range");
        match entries.get(key) {
            Some(entry) if !entry.expired() => match &entry.value {
                Value::List(list) => Ok(Some(list.iter().cloned().collect())),
                Value::Counter(_) => Err(CacheError(format!("`{key}` holds a counter"))),
            },
            _ => Ok(None),
        }
    }

    fn list_push_front(
        &self,
        key: &str,
        entry: String,
        trim_to: usize,
    ) -> Result<bool, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "list_push_front");
        match entries.get_mut(key) {
            Some(existing) if !existing.expired() => match &mut existing.value {
                Value::List(list) => {
                    list.retain(|existing| existing != &entry);
                    list.push_front(entry);
                    list.truncate(trim_to);
                    Ok(true)
                }
                Value::Counter(_) => Err(CacheError(format!("`{key}` holds a counter"))),
            },
            _ => {
                entries.remove(key);
                Ok(false)
            }
        }
    }

    fn list_replace(
        &self,
        key: &str,
        new_entries: Vec<String>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "list_replace");
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::List(new_entries.into()),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "delete");
        entries.remove(key);
        Ok(())
    }

    fn counter_get(&self, key: &str) -> Result<Option<i64>, CacheError> {
        let entries = rw_read(&self.entries, SOURCE, "counter_get");
        match entries.get(key) {
            Some(entry) if !entry.expired() => match entry.value {
                Value::Counter(value) => Ok(Some(value)),
                Value::List(_) => Err(CacheError(format!("`{key}` holds a list"))),
            },
            _ => Ok(None),
        }
    }

    fn counter_set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "counter_set");
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Counter(value),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    fn counter_incr(&self, key: &str, delta: i64) -> Result<Option<i64>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "counter_incr");
        match entries.get_mut(key) {
            Some(existing) if !existing.expired() => match &mut existing.value {
                Value::Counter(value) => {
                    *value += delta;
                    Ok(Some(*value))
                }
                Value::List(_) => Err(CacheError(format!("`{key}` holds a list"))),
            },
            _ => {
                entries.remove(key);
                Ok(None)
            }
        }
    }

    fn purge_expired(&self) -> Result<usize, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "purge_expired");
        let before = entries.len();
        entries.retain(|_, entry| !entry.expired());
        Ok(before - entries.len())
    }
}
