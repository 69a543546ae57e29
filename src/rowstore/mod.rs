//! Sorted-row storage: object-to-sorted-row mapping over an ordered key space.
//!
//! Records are encoded into composite row keys whose lexicographic byte order
//! equals the application's feed order, so "the newest N entries for user X"
//! is a bounded prefix scan. The layer is deliberately small: field
//! descriptors, a codec, a schema-scoped model, and a store trait with an
//! in-memory implementation.

mod codec;
mod error;
mod fields;
mod model;
mod schema;
mod store;

pub use codec::{
    deserialize_field, deserialize_row_key, encode_scan_bound, serialize_columns, serialize_field,
    serialize_row_key, MAX_TIMESTAMP,
};
pub use error::RowStoreError;
pub use fields::{FieldDescriptor, FieldKind, FieldValue};
pub use model::{Record, RowModel, ScanQuery};
pub use schema::TableSchema;
pub use store::{MemoryStore, RowData, Scan, SortedStore};
