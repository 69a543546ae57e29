//! Field descriptors: the typed building blocks of a table schema.

use serde::{Deserialize, Serialize};

/// Value domain of a field.
///
/// `Timestamp` values are epoch microseconds and share the integer codec;
/// they are a distinct kind only so schemas document intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Int,
    Timestamp,
    Str,
}

/// A typed, optionally-reversed, optionally column-family-scoped attribute.
///
/// Fields without a column family are row-key components in declaration
/// order; fields with one are stored as regular column values under
/// `"<family>:<name>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub reversed: bool,
    pub column_family: Option<&'static str>,
}

impl FieldDescriptor {
    pub const fn int(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Int,
            reversed: false,
            column_family: None,
        }
    }

    pub const fn timestamp(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Timestamp,
            reversed: false,
            column_family: None,
        }
    }

    pub const fn str(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Str,
            reversed: false,
            column_family: None,
        }
    }

    /// Serialized form is character-reversed, inverting sort order relative
    /// to a non-reversed field of the same domain.
    pub const fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub const fn column_family(mut self, family: &'static str) -> Self {
        self.column_family = Some(family);
        self
    }

    pub const fn is_row_key(&self) -> bool {
        self.column_family.is_none()
    }
}

/// A concrete field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(i64),
    Str(String),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(value) => Some(*value),
            FieldValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Int(_) => None,
            FieldValue::Str(value) => Some(value.as_str()),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}
