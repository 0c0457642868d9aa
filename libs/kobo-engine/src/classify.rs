//! Per-value type classification.

use std::sync::LazyLock;

use regex::Regex;

use kobo_api::{FieldType, Value};

/// Starts with `YYYY-MM-DDTHH:MM:SS`. Whatever follows (fraction, offset,
/// trailing text) is left to the server's `timestamp` input parser.
static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}").expect("timestamp pattern")
});

/// `lat,long` with no surrounding or inner whitespace.
static GEO_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?[0-9]+(\.[0-9]+)?,-?[0-9]+(\.[0-9]+)?$").expect("geo point pattern")
});

/// Most specific storage type for one observed value.
///
/// `None` for `Null`: a null carries no type information and must not pull
/// the column towards `TEXT`. Pure and total.
pub fn classify(value: &Value) -> Option<FieldType> {
    let ty = match value {
        Value::Null => return None,
        Value::Object(_) | Value::Array(_) => FieldType::JsonDocument,
        Value::Bool(_) => FieldType::Boolean,
        Value::Int(_) => FieldType::Integer,
        Value::Number(n) if n.as_integral().is_some() => FieldType::Integer,
        Value::Number(_) => FieldType::Decimal,
        Value::String(s) => classify_str(s),
    };
    Some(ty)
}

fn classify_str(s: &str) -> FieldType {
    if TIMESTAMP.is_match(s) {
        FieldType::Timestamp
    } else if GEO_POINT.is_match(s) {
        FieldType::GeoPoint
    } else {
        FieldType::Text
    }
}
