use thiserror::Error;

/// Errors raised by the sorted-row layer.
///
/// The first four variants are caller errors (malformed input). They are
/// raised synchronously, never retried, and propagate to the caller
/// unchanged. `Store` wraps backend failures.
#[derive(Debug, Error)]
pub enum RowStoreError {
    #[error("row-key field `{field}` is missing")]
    MissingRowKeyField { field: &'static str },
    #[error("field `{field}` has an invalid value: {reason}")]
    InvalidFieldValue { field: String, reason: String },
    #[error("record has no column values; a key-only row carries no payload")]
    EmptyColumn,
    #[error("row key for `{table}` is incomplete: `get` requires every row-key field")]
    IncompleteRowKey { table: &'static str },
    #[error("store error: {0}")]
    Store(String),
}

impl RowStoreError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFieldValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn store(message: impl std::fmt::Display) -> Self {
        Self::Store(message.to_string())
    }
}
