//! Statically declared table schemas.
//!
//! A schema is fixed at construction: an ordered list of row-key fields, a
//! set of column fields, and a table identifier. There is no runtime
//! reflection; entity modules declare their schemas with plain constructors.

use super::error::RowStoreError;
use super::fields::FieldDescriptor;

/// Ordered record schema for one sorted-row table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    table: &'static str,
    row_key: Vec<FieldDescriptor>,
    columns: Vec<FieldDescriptor>,
}

impl TableSchema {
    /// Build a schema from its declared fields.
    ///
    /// Row-key order is the declaration order of the key fields. A schema
    /// with no column fields is rejected up front: such records would carry
    /// no payload distinct from their key.
    pub fn new(table: &'static str, fields: &[FieldDescriptor]) -> Result<Self, RowStoreError> {
        let row_key: Vec<_> = fields.iter().filter(|f| f.is_row_key()).copied().collect();
        let columns: Vec<_> = fields.iter().filter(|f| !f.is_row_key()).copied().collect();

        if row_key.is_empty() {
            return Err(RowStoreError::store(format!(
                "schema `{table}` declares no row-key fields"
            )));
        }
        if columns.is_empty() {
            return Err(RowStoreError::EmptyColumn);
        }

        Ok(Self {
            table,
            row_key,
            columns,
        })
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn row_key_fields(&self) -> &[FieldDescriptor] {
        &self.row_key
    }

    pub fn column_fields(&self) -> &[FieldDescriptor] {
        &self.columns
    }

    /// Look up any field (key or column) by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.row_key
            .iter()
            .chain(self.columns.iter())
            .find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rowstore::fields::FieldDescriptor as F;

    #[test]
    fn splits_key_and_column_fields_in_order() {
        let schema = TableSchema::new(
            "followings",
            &[
                F::int("from_user_id").reversed(),
                F::timestamp("created_at"),
                F::int("to_user_id").column_family("cf"),
            ],
        )
        .expect("schema");

        let keys: Vec<_> = schema.row_key_fields().iter().map(|f| f.name).collect();
        assert_eq!(keys, vec!["from_user_id", "created_at"]);
        assert_eq!(schema.column_fields().len(), 1);
        assert_eq!(schema.column_fields()[0].column_family, Some("cf"));
    }

    #[test]
    fn rejects_schema_without_columns() {
        let err = TableSchema::new("bare", &[F::int("id")]).expect_err("rejected");
        assert!(matches!(err, RowStoreError::EmptyColumn));
    }

    #[test]
    fn rejects_schema_without_row_key() {
        let err =
            TableSchema::new("bare", &[F::int("id").column_family("cf")]).expect_err("rejected");
        assert!(matches!(err, RowStoreError::Store(_)));
    }
}
