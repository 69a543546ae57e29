//! Sorted store trait and the in-memory implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use tracing::warn;

use super::error::RowStoreError;

const SOURCE: &str = "rowstore::store";

/// One stored row: its key and its column mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowData {
    pub key: Vec<u8>,
    pub columns: BTreeMap<String, String>,
}

/// A key-range scan over one table.
///
/// Forward scans run from `start` (inclusive) up to `stop` (exclusive).
/// Reverse scans run from `start` (inclusive) down to `stop` (exclusive);
/// the bounds swap roles, matching how a backward cursor walks the key
/// space. `prefix` restricts either direction to keys with the given prefix.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    pub prefix: Option<Vec<u8>>,
    pub start: Option<Vec<u8>>,
    pub stop: Option<Vec<u8>>,
    pub limit: Option<usize>,
    pub reverse: bool,
}

/// Minimal contract a sorted-row backend must provide: point put/get/delete
/// plus an ordered range scan. Every scan is a fresh, finite pass; there are
/// no live cursors.
pub trait SortedStore: Send + Sync {
    /// Set the given columns on the row, creating it if absent. Columns not
    /// named in the update keep their stored values.
    fn put(
        &self,
        table: &str,
        key: &[u8],
        columns: BTreeMap<String, String>,
    ) -> Result<(), RowStoreError>;

    fn get(&self, table: &str, key: &[u8])
        -> Result<Option<BTreeMap<String, String>>, RowStoreError>;

    fn delete(&self, table: &str, key: &[u8]) -> Result<(), RowStoreError>;

    fn scan(&self, table: &str, scan: &Scan) -> Result<Vec<RowData>, RowStoreError>;
}

type Table = BTreeMap<Vec<u8>, BTreeMap<String, String>>;

/// In-memory ordered store: one `BTreeMap` per table behind a lock.
///
/// Backs tests and single-process deployments; the trait is the seam for an
/// external sorted store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Table>> {
        match self.tables.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    target_module = SOURCE,
                    lock_kind = "rwlock.read",
                    result = "poisoned_recovered",
                    "Recovered from poisoned store lock"
                );
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Table>> {
        match self.tables.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    target_module = SOURCE,
                    lock_kind = "rwlock.write",
                    result = "poisoned_recovered",
                    "Recovered from poisoned store lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

impl SortedStore for MemoryStore {
    fn put(
        &self,
        table: &str,
        key: &[u8],
        columns: BTreeMap<String, String>,
    ) -> Result<(), RowStoreError> {
        let mut tables = self.write();
        let rows = tables.entry(table.to_string()).or_default();
        match rows.get_mut(key) {
            Some(existing) => existing.extend(columns),
            None => {
                rows.insert(key.to_vec(), columns);
            }
        }
        Ok(())
    }

    fn get(
        &self,
        table: &str,
        key: &[u8],
    ) -> Result<Option<BTreeMap<String, String>>, RowStoreError> {
        let tables = self.read();
        Ok(tables.get(table).and_then(|rows| rows.get(key)).cloned())
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<(), RowStoreError> {
        let mut tables = self.write();
        if let Some(rows) = tables.get_mut(table) {
            rows.remove(key);
        }
        Ok(())
    }

    fn scan(&self, table: &str, scan: &Scan) -> Result<Vec<RowData>, RowStoreError> {
        let tables = self.read();
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };

        let matches_prefix = |key: &[u8]| match scan.prefix.as_deref() {
            Some(prefix) => key.starts_with(prefix),
            None => true,
        };

        let limit = scan.limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();

        if scan.reverse {
            // start is the inclusive upper bound, stop the exclusive lower.
            for (key, columns) in rows.iter().rev() {
                if let Some(start) = scan.start.as_deref() {
                    if key.as_slice() > start {
                        continue;
                    }
                }
                if let Some(stop) = scan.stop.as_deref() {
                    if key.as_slice() <= stop {
                        break;
                    }
                }
                if !matches_prefix(key) {
                    if scan.prefix.as_deref().is_some_and(|p| key.as_slice() < p) {
                        break;
                    }
                    continue;
                }
                out.push(RowData {
                    key: key.clone(),
                    columns: columns.clone(),
                });
                if out.len() >= limit {
                    break;
                }
            }
        } else {
            for (key, columns) in rows.iter() {
                if let Some(start) = scan.start.as_deref() {
                    if key.as_slice() < start {
                        continue;
                    }
                }
                if let Some(stop) = scan.stop.as_deref() {
                    if key.as_slice() >= stop {
                        break;
                    }
                }
                if !matches_prefix(key) {
                    if scan
                        .prefix
                        .as_deref()
                        .is_some_and(|p| key.as_slice() > p && !key.starts_with(p))
                    {
                        break;
                    }
                    continue;
                }
                out.push(RowData {
                    key: key.clone(),
                    columns: columns.clone(),
                });
                if out.len() >= limit {
                    break;
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(value: &str) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("cf:value".to_string(), value.to_string());
        map
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for key in ["a:1", "a:2", "a:3", "b:1", "b:2"] {
            store
                .put("t", key.as_bytes(), columns(key))
                .expect("seeded");
        }
        store
    }

    #[test]
    fn point_get_and_overwrite() {
        let store = seeded();
        assert_eq!(
            store.get("t", b"a:2").expect("get"),
            Some(columns("a:2"))
        );
        assert_eq!(store.get("t", b"a:9").expect("get"), None);

        store.put("t", b"a:2", columns("updated")).expect("put");
        assert_eq!(
            store.get("t", b"a:2").expect("get"),
            Some(columns("updated"))
        );
    }

    #[test]
    fn put_of_a_column_subset_keeps_the_rest_of_the_row() {
        let store = seeded();
        let mut extra = BTreeMap::new();
        extra.insert("cf:other".to_string(), "kept".to_string());
        store.put("t", b"a:2", extra).expect("put");

        store.put("t", b"a:2", columns("updated")).expect("put");
        let row = store.get("t", b"a:2").expect("get").expect("present");
        assert_eq!(row.get("cf:value").map(String::as_str), Some("updated"));
        assert_eq!(row.get("cf:other").map(String::as_str), Some("kept"));
    }

    #[test]
    fn prefix_scan_forward_and_reverse() {
        let store = seeded();

        let scan = Scan {
            prefix: Some(b"a:".to_vec()),
            ..Default::default()
        };
        let keys: Vec<_> = store
            .scan("t", &scan)
            .expect("scan")
            .into_iter()
            .map(|row| row.key)
            .collect();
        assert_eq!(keys, vec![b"a:1".to_vec(), b"a:2".to_vec(), b"a:3".to_vec()]);

        let scan = Scan {
            prefix: Some(b"a:".to_vec()),
            reverse: true,
            limit: Some(2),
            ..Default::default()
        };
        let keys: Vec<_> = store
            .scan("t", &scan)
            .expect("scan")
            .into_iter()
            .map(|row| row.key)
            .collect();
        assert_eq!(keys, vec![b"a:3".to_vec(), b"a:2".to_vec()]);
    }

    #[test]
    fn range_scan_is_inclusive_start_exclusive_stop() {
        let store = seeded();

        let scan = Scan {
            start: Some(b"a:1".to_vec()),
            stop: Some(b"a:3".to_vec()),
            ..Default::default()
        };
        let keys: Vec<_> = store
            .scan("t", &scan)
            .expect("scan")
            .into_iter()
            .map(|row| row.key)
            .collect();
        assert_eq!(keys, vec![b"a:1".to_vec(), b"a:2".to_vec()]);
    }

    #[test]
    fn reverse_range_walks_down_to_exclusive_stop() {
        let store = seeded();

        let scan = Scan {
            start: Some(b"a:3".to_vec()),
            stop: Some(b"a:".to_vec()),
            reverse: true,
            ..Default::default()
        };
        let keys: Vec<_> = store
            .scan("t", &scan)
            .expect("scan")
            .into_iter()
            .map(|row| row.key)
            .collect();
        assert_eq!(keys, vec![b"a:3".to_vec(), b"a:2".to_vec(), b"a:1".to_vec()]);
    }

    #[test]
    fn delete_removes_the_row() {
        let store = seeded();
        store.delete("t", b"a:2").expect("delete");
        assert_eq!(store.get("t", b"a:2").expect("get"), None);
    }
}
