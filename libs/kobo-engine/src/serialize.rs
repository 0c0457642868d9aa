//! Record → driver-ready column values.

use kobo_api::{FieldType, InsertRow, Record, Schema, SqlValue, TableIdentity, Value};

/// Convert one record into `(column, value)` pairs, in record order.
///
/// Every non-null value in a `JSON_DOCUMENT` column is wrapped as a
/// document, scalars included. Elsewhere values pass through as-is: a value that does not fit its
/// column is not coerced here and fails at insert time, for this record only.
/// Fields missing from the record are simply not emitted.
pub fn serialize(record: &Record, schema: &Schema) -> Vec<(String, SqlValue)> {
    record
        .fields()
        .map(|(name, value)| (name.to_string(), serialize_value(value, schema.get(name))))
        .collect()
}

fn serialize_value(value: &Value, column: Option<FieldType>) -> SqlValue {
    match (value, column) {
        (Value::Null, _) => SqlValue::Null,
        (_, Some(FieldType::JsonDocument)) => SqlValue::Document(value.to_json()),
        (Value::Bool(b), _) => SqlValue::Bool(*b),
        (Value::Int(i), _) => SqlValue::Int(*i),
        // `bigint` rejects the text "5.0"
        (Value::Number(n), _) => match n.as_integral() {
            Some(i) => SqlValue::Int(i),
            None => SqlValue::Numeric(n.clone()),
        },
        (Value::String(s), _) => SqlValue::Text(s.clone()),
        (Value::Object(_) | Value::Array(_), _) => SqlValue::Nested(value.clone()),
    }
}

/// Serialized record wrapped as an insert-or-ignore on `natural_key`.
pub fn insert_row(
    table: &TableIdentity,
    natural_key: &str,
    record: &Record,
    schema: &Schema,
) -> InsertRow {
    InsertRow {
        table: table.clone(),
        conflict_key: natural_key.to_string(),
        values: serialize(record, schema),
    }
}

/// Natural key rendered for logs: `<missing>` when absent or null.
pub fn natural_key_text(record: &Record, natural_key: &str) -> String {
    match record.get(natural_key) {
        None | Some(Value::Null) => "<missing>".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Int(i)) => i.to_string(),
        Some(other) => other.to_json().to_string(),
    }
}
