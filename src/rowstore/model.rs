//! Schema-scoped CRUD and range scans over a sorted store.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::codec::{
    deserialize_field, deserialize_row_key, encode_scan_bound, serialize_columns,
    serialize_row_key,
};
use super::error::RowStoreError;
use super::fields::FieldValue;
use super::schema::TableSchema;
use super::store::{RowData, Scan, SortedStore};

/// A materialized record: field name to value, for both key and column
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    values: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(values: BTreeMap<String, FieldValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn int(&self, field: &str) -> Option<i64> {
        self.values.get(field).and_then(FieldValue::as_int)
    }

    pub fn str(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(FieldValue::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }
}

/// Scan parameters for [`RowModel::filter`].
///
/// `prefix`, `start` and `stop` are partial row-key tuples: leading `Some`
/// components in schema order, with trailing `None` as wildcard. `start` is
/// inclusive, `stop` exclusive; under `reverse` the pair bounds a backward
/// walk.
#[derive(Debug, Clone, Default)]
pub struct ScanQuery {
    pub prefix: Option<Vec<Option<FieldValue>>>,
    pub start: Option<Vec<Option<FieldValue>>>,
    pub stop: Option<Vec<Option<FieldValue>>>,
    pub limit: Option<usize>,
    pub reverse: bool,
}

/// CRUD + range-scan operations for one table schema.
#[derive(Clone)]
pub struct RowModel {
    schema: TableSchema,
    store: Arc<dyn SortedStore>,
}

impl RowModel {
    pub fn new(schema: TableSchema, store: Arc<dyn SortedStore>) -> Self {
        Self { schema, store }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Build a record from the given values, write it, and return it.
    pub fn create(&self, values: BTreeMap<String, FieldValue>) -> Result<Record, RowStoreError> {
        let record = Record::new(values);
        self.save(&record)?;
        Ok(record)
    }

    /// Upsert the record's row key and columns. Columns the record does not
    /// carry keep their stored values.
    ///
    /// A record with zero column values is rejected: the store would persist
    /// nothing retrievable beyond the key itself.
    pub fn save(&self, record: &Record) -> Result<(), RowStoreError> {
        let columns = serialize_columns(&self.schema, record.values())?;
        if columns.is_empty() {
            return Err(RowStoreError::EmptyColumn);
        }
        let row_key = serialize_row_key(&self.schema, record.values())?;
        self.store.put(self.schema.table(), &row_key, columns)
    }

    /// Point lookup by full row key. Absence is `Ok(None)`, not an error.
    ///
    /// Every row-key field must be present: a shorter prefix could match
    /// zero or many rows, so it is rejected outright rather than guessing.
    pub fn get(
        &self,
        values: &BTreeMap<String, FieldValue>,
    ) -> Result<Option<Record>, RowStoreError> {
        for field in self.schema.row_key_fields() {
            if !values.contains_key(field.name) {
                return Err(RowStoreError::IncompleteRowKey {
                    table: self.schema.table(),
                });
            }
        }

        let row_key = serialize_row_key(&self.schema, values)?;
        let Some(columns) = self.store.get(self.schema.table(), &row_key)? else {
            return Ok(None);
        };
        self.record_from_row(&RowData {
            key: row_key,
            columns,
        })
        .map(Some)
    }

    /// Delete the row with the given full key, if present.
    pub fn delete(&self, values: &BTreeMap<String, FieldValue>) -> Result<(), RowStoreError> {
        let row_key = serialize_row_key(&self.schema, values)?;
        self.store.delete(self.schema.table(), &row_key)
    }

    /// Scan the sorted key space; each call is a fresh, finite scan.
    pub fn filter(&self, query: &ScanQuery) -> Result<Vec<Record>, RowStoreError> {
        let encode = |parts: &Option<Vec<Option<FieldValue>>>| -> Result<Option<Vec<u8>>, RowStoreError> {
            match parts {
                Some(parts) => {
                    let bound = encode_scan_bound(&self.schema, parts)?;
                    Ok((!bound.is_empty()).then_some(bound))
                }
                None => Ok(None),
            }
        };

        let scan = Scan {
            prefix: encode(&query.prefix)?,
            start: encode(&query.start)?,
            stop: encode(&query.stop)?,
            limit: query.limit,
            reverse: query.reverse,
        };

        let rows = self.store.scan(self.schema.table(), &scan)?;
        rows.iter().map(|row| self.record_from_row(row)).collect()
    }

    fn record_from_row(&self, row: &RowData) -> Result<Record, RowStoreError> {
        let mut values = deserialize_row_key(&self.schema, &row.key)?;
        for (storage_key, serialized) in &row.columns {
            // Strip "<family>:" to recover the field name.
            let name = storage_key
                .split_once(':')
                .map(|(_, name)| name)
                .unwrap_or(storage_key.as_str());
            let Some(field) = self.schema.field(name) else {
                continue;
            };
            values.insert(name.to_string(), deserialize_field(field, serialized)?);
        }
        Ok(Record::new(values))
    }
}
