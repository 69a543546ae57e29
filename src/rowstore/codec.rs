//! Row-key codec: field values to sortable byte strings and back.
//!
//! Wire format: serialized values joined by `:`. Integers are zero-padded to
//! 16 digits so lexicographic byte order equals numeric order; a `reversed`
//! field is character-reversed after padding, which inverts its sort order.
//! Column storage keys are `"<column_family>:<field_name>"`.

use std::collections::BTreeMap;

use super::error::RowStoreError;
use super::fields::{FieldDescriptor, FieldKind, FieldValue};
use super::schema::TableSchema;

pub(crate) const DELIMITER: char = ':';
const INT_WIDTH: usize = 16;

/// Largest value an integer field can carry: 16 decimal digits. Used as the
/// open upper bound of "newer than" scans over timestamp key components.
pub const MAX_TIMESTAMP: i64 = 9_999_999_999_999_999;

/// Serialize one field value to its canonical string form.
pub fn serialize_field(
    descriptor: &FieldDescriptor,
    value: &FieldValue,
) -> Result<String, RowStoreError> {
    let mut serialized = match (descriptor.kind, value) {
        (FieldKind::Int | FieldKind::Timestamp, FieldValue::Int(v)) => {
            if *v < 0 {
                return Err(RowStoreError::invalid_value(
                    descriptor.name,
                    "negative integers do not zero-pad into sortable form",
                ));
            }
            if *v > MAX_TIMESTAMP {
                return Err(RowStoreError::invalid_value(
                    descriptor.name,
                    format!("{v} exceeds the {INT_WIDTH}-digit field width"),
                ));
            }
            format!("{v:0width$}", width = INT_WIDTH)
        }
        (FieldKind::Str, FieldValue::Str(v)) => v.clone(),
        (kind, other) => {
            return Err(RowStoreError::invalid_value(
                descriptor.name,
                format!("value {other:?} does not match field kind {kind:?}"),
            ));
        }
    };

    if descriptor.reversed {
        serialized = serialized.chars().rev().collect();
    }

    if serialized.contains(DELIMITER) {
        return Err(RowStoreError::invalid_value(
            descriptor.name,
            format!("serialized value `{serialized}` contains the `{DELIMITER}` delimiter"),
        ));
    }

    Ok(serialized)
}

/// Undo `serialize_field`: un-reverse, then un-pad integers.
pub fn deserialize_field(
    descriptor: &FieldDescriptor,
    serialized: &str,
) -> Result<FieldValue, RowStoreError> {
    let plain: String = if descriptor.reversed {
        serialized.chars().rev().collect()
    } else {
        serialized.to_string()
    };

    match descriptor.kind {
        FieldKind::Int | FieldKind::Timestamp => plain
            .parse::<i64>()
            .map(FieldValue::Int)
            .map_err(|err| RowStoreError::invalid_value(descriptor.name, err.to_string())),
        FieldKind::Str => Ok(FieldValue::Str(plain)),
    }
}

/// Serialize every row-key field, in schema order, into the row key bytes.
///
/// All row-key fields are required; a missing one is a caller error naming
/// the field.
pub fn serialize_row_key(
    schema: &TableSchema,
    values: &BTreeMap<String, FieldValue>,
) -> Result<Vec<u8>, RowStoreError> {
    let mut segments = Vec::with_capacity(schema.row_key_fields().len());
    for field in schema.row_key_fields() {
        let value = values
            .get(field.name)
            .ok_or(RowStoreError::MissingRowKeyField { field: field.name })?;
        segments.push(serialize_field(field, value)?);
    }
    Ok(segments.join(":").into_bytes())
}

/// Encode a (possibly partial) row-key tuple as a scan bound.
///
/// Leading `Some` values are serialized in schema order; the first `None`
/// stops encoding. A partial bound gets a trailing delimiter so it anchors
/// at a segment boundary rather than matching sibling prefixes.
pub fn encode_scan_bound(
    schema: &TableSchema,
    parts: &[Option<FieldValue>],
) -> Result<Vec<u8>, RowStoreError> {
    let mut segments = Vec::new();
    for (field, part) in schema.row_key_fields().iter().zip(parts.iter()) {
        match part {
            Some(value) => segments.push(serialize_field(field, value)?),
            None => break,
        }
    }

    if segments.is_empty() {
        return Ok(Vec::new());
    }

    let mut bound = segments.join(":");
    if segments.len() < schema.row_key_fields().len() {
        bound.push(DELIMITER);
    }
    Ok(bound.into_bytes())
}

/// Split a row key into per-field values, left to right.
///
/// A key with fewer segments than the schema declares is legal: remaining
/// fields stay unset. Partial-prefix keys are how scan bounds are expressed.
pub fn deserialize_row_key(
    schema: &TableSchema,
    row_key: &[u8],
) -> Result<BTreeMap<String, FieldValue>, RowStoreError> {
    let text = std::str::from_utf8(row_key)
        .map_err(|err| RowStoreError::store(format!("row key is not utf-8: {err}")))?;

    let mut values = BTreeMap::new();
    let mut segments = text.split(DELIMITER);
    for field in schema.row_key_fields() {
        let Some(segment) = segments.next() else {
            break;
        };
        values.insert(field.name.to_string(), deserialize_field(field, segment)?);
    }
    Ok(values)
}

/// Serialize column values into their storage mapping.
///
/// Only columns with a present value are emitted; storage keys carry the
/// column-family prefix.
pub fn serialize_columns(
    schema: &TableSchema,
    values: &BTreeMap<String, FieldValue>,
) -> Result<BTreeMap<String, String>, RowStoreError> {
    let mut columns = BTreeMap::new();
    for field in schema.column_fields() {
        let Some(value) = values.get(field.name) else {
            continue;
        };
        let family = field.column_family.unwrap_or_default();
        columns.insert(
            format!("{family}:{}", field.name),
            serialize_field(field, value)?,
        );
    }
    Ok(columns)
}
