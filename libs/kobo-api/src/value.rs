use crate::error::BackendError;

/// Canonical value of one submission field.
///
/// Strategy by type:
/// - Scalars (Bool, Int): taken as-is from the wire
/// - Number: every other JSON number, kept as its exact digits
/// - String: owned, pattern-matched later by the type classifier
/// - Object, Array: recursive, key order preserved
///
/// JSON integers that fit `i64` become `Int`. Fractions, exponents and
/// integers beyond the signed range stay `Number`, so nothing is rounded on
/// the way to a `numeric` column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Number(Number),
    String(String),
    Object(Vec<(String, Value)>),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
        }
    }

    /// Re-encode as a JSON tree.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Number(n) => n.to_json(),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Number(Number(n.to_string())),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Number
// ════════════════════════════════════════════════════════════════

/// A JSON number that is not an `i64`, held as the digits it arrived with.
///
/// Relies on serde_json's `arbitrary_precision`: `Number::to_string` gives
/// back the source text, not an `f64` rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Number(String);

impl Number {
    /// Exact digits of a JSON number literal. `None` if `text` is not one.
    pub fn parse(text: &str) -> Option<Self> {
        text.parse::<serde_json::Number>().ok().map(|n| Number(n.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The value as an `i64` when it has no fractional part and fits the
    /// signed range: `5.0` and `5.000` give `5`, `5.5` and `2^63` give `None`.
    pub fn as_integral(&self) -> Option<i64> {
        let text = self.0.as_str();
        if text.contains(['e', 'E']) {
            let f: f64 = text.parse().ok()?;
            // i64::MAX as f64 rounds up to 2^63, which is already out of range.
            let fits = f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64;
            return fits.then_some(f as i64);
        }
        let (int, frac) = text.split_once('.').unwrap_or((text, ""));
        if !frac.bytes().all(|b| b == b'0') {
            return None;
        }
        int.parse().ok()
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.0
            .parse::<serde_json::Number>()
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// One submission: ordered `field → value` pairs.
///
/// Field names are kept verbatim, including group separators (`group/question`)
/// and the platform's underscore-prefixed system fields (`_id`, `_uuid`, ...).
/// Records of one batch need not share the same field set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Set a field. An existing field keeps its position and takes the new value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(entry) = self.fields.iter_mut().find(|(k, _)| k == &name) {
            entry.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build from a decoded JSON object. Any other JSON shape is a format error.
    pub fn from_json(value: serde_json::Value) -> Result<Self, BackendError> {
        match value {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect()),
            other => Err(BackendError::format(format!(
                "expected JSON object for record, got {}",
                Value::from(other).kind()
            ))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_split_into_int_and_number() {
        assert_eq!(Value::from(json!(7)), Value::Int(7));
        assert_eq!(Value::from(json!(-7)), Value::Int(-7));
        assert_eq!(Value::from(json!(2.5)), Value::Number(Number::parse("2.5").unwrap()));
        // u64 beyond i64::MAX does not fit the signed range
        assert!(matches!(Value::from(json!(u64::MAX)), Value::Number(_)));
    }

    #[test]
    fn test_numbers_keep_their_exact_digits() {
        let record = Record::from_json(
            serde_json::from_str(r#"{"big": 18446744073709551615, "pi": 3.14159265358979323846264}"#)
                .unwrap(),
        )
        .unwrap();
        let digits = |name: &str| match record.get(name) {
            Some(Value::Number(n)) => n.as_str().to_string(),
            other => panic!("{name}: {other:?}"),
        };
        assert_eq!(digits("big"), "18446744073709551615");
        assert_eq!(digits("pi"), "3.14159265358979323846264");
        assert_eq!(
            record.to_json().to_string(),
            r#"{"big":18446744073709551615,"pi":3.14159265358979323846264}"#
        );
    }

    #[test]
    fn test_number_as_integral() {
        let n = |t: &str| Number::parse(t).unwrap().as_integral();
        assert_eq!(n("5.0"), Some(5));
        assert_eq!(n("-12.000"), Some(-12));
        assert_eq!(n("1e3"), Some(1000));
        assert_eq!(n("5.5"), None);
        assert_eq!(n("18446744073709551615"), None);
        assert_eq!(n("1e400"), None);
        assert!(Number::parse("12,5").is_none());
    }

    #[test]
    fn test_record_preserves_field_order() {
        let record = Record::from_json(json!({
            "start": "2024-01-01T10:00:00",
            "group_a/q1": 1,
            "_id": 42,
        }))
        .unwrap();
        let names: Vec<&str> = record.fields().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["start", "group_a/q1", "_id"]);
    }

    #[test]
    fn test_record_from_non_object_is_format_error() {
        let err = Record::from_json(json!([1, 2])).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
    }

    #[test]
    fn test_nested_value_round_trips_to_json() {
        let original = json!({"a": {"x": 1, "tags": ["p", null, 2.5]}});
        let record = Record::from_json(original.clone()).unwrap();
        assert_eq!(record.to_json(), original);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut record = Record::new();
        record.set("a", Value::Int(1));
        record.set("b", Value::Int(2));
        record.set("a", Value::Null);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("a"), Some(&Value::Null));
        assert_eq!(record.fields().next().map(|(k, _)| k), Some("a"));
    }
}
