//! Batch-wide schema inference.
//!
//! Every record of the batch is looked at before a single column type is
//! decided: a field that is `null` in the first record and numeric later
//! must still come out numeric.

use std::collections::{BTreeSet, HashMap};

use kobo_api::{FieldType, Record, Schema};

use crate::classify::classify;

/// Join two observed types into one column type.
///
/// Equal types stay; `INTEGER`/`DECIMAL` widen to `DECIMAL`; every other
/// disagreement falls back to `TEXT`. Commutative and associative, with
/// `TEXT` absorbing, so the result does not depend on record order.
pub fn merge(a: FieldType, b: FieldType) -> FieldType {
    use FieldType::*;
    match (a, b) {
        (a, b) if a == b => a,
        (Integer, Decimal) | (Decimal, Integer) => Decimal,
        _ => Text,
    }
}

/// What was observed for one field across the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDetail {
    pub name: String,
    /// Occurrences that were present and non-null.
    pub non_null: usize,
    /// Distinct classifications, sorted.
    pub observed: Vec<FieldType>,
    pub resolved: FieldType,
}

impl FieldDetail {
    /// Occurrences disagreed on the type.
    pub fn is_mixed(&self) -> bool {
        self.observed.len() > 1
    }
}

/// Inferred schema plus the per-field evidence behind it.
#[derive(Debug, Clone, Default)]
pub struct Inference {
    pub schema: Schema,
    pub details: Vec<FieldDetail>,
}

#[derive(Default)]
struct Acc {
    merged: Option<FieldType>,
    observed: BTreeSet<FieldType>,
    non_null: usize,
}

/// Infer one column type per field name seen anywhere in `records`.
///
/// Columns are ordered by first appearance. A field that is absent or
/// null everywhere becomes `TEXT`.
pub fn infer(records: &[Record]) -> Inference {
    let mut order: Vec<String> = Vec::new();
    let mut accs: HashMap<String, Acc> = HashMap::new();

    for record in records {
        for (name, value) in record.fields() {
            if !accs.contains_key(name) {
                order.push(name.to_string());
            }
            let acc = accs.entry(name.to_string()).or_default();
            if let Some(ty) = classify(value) {
                acc.non_null += 1;
                acc.observed.insert(ty);
                acc.merged = Some(match acc.merged {
                    Some(prev) => merge(prev, ty),
                    None => ty,
                });
            }
        }
    }

    let mut inference = Inference::default();
    for name in order {
        let acc = accs.remove(&name).unwrap_or_default();
        let resolved = acc.merged.unwrap_or(FieldType::Text);
        if acc.observed.len() > 1 {
            tracing::debug!(field = %name, observed = ?acc.observed, resolved = %resolved, "mixed field types merged");
        }
        tracing::debug!(field = %name, field_type = %resolved, "inferred column");
        inference.schema.set(name.clone(), resolved);
        inference.details.push(FieldDetail {
            name,
            non_null: acc.non_null,
            observed: acc.observed.into_iter().collect(),
            resolved,
        });
    }
    inference
}

/// Shortcut when the per-field detail is not needed.
pub fn infer_schema(records: &[Record]) -> Schema {
    infer(records).schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(values: Vec<serde_json::Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|v| Record::from_json(v).unwrap())
            .collect()
    }

    #[test]
    fn test_numeric_widening() {
        let schema = infer_schema(&records(vec![json!({"n": 5}), json!({"n": 2.5})]));
        assert_eq!(schema.get("n"), Some(FieldType::Decimal));
    }

    #[test]
    fn test_null_tolerance() {
        let schema = infer_schema(&records(vec![
            json!({"n": null}),
            json!({"n": null}),
            json!({"n": 7}),
        ]));
        assert_eq!(schema.get("n"), Some(FieldType::Integer));
    }

    #[test]
    fn test_all_null_or_absent_falls_back_to_text() {
        let schema = infer_schema(&records(vec![json!({"a": null}), json!({"b": 1})]));
        assert_eq!(schema.get("a"), Some(FieldType::Text));
        assert_eq!(schema.get("b"), Some(FieldType::Integer));
    }

    #[test]
    fn test_timestamp_and_text_merge_to_text() {
        let schema = infer_schema(&records(vec![
            json!({"t": "2024-01-01T00:00:00"}),
            json!({"t": "yesterday"}),
        ]));
        assert_eq!(schema.get("t"), Some(FieldType::Text));
    }

    #[test]
    fn test_incompatible_narrow_types_fall_back_to_text() {
        let schema = infer_schema(&records(vec![
            json!({"x": true}),
            json!({"x": "1.5,2.5"}),
            json!({"y": {"a": 1}}),
            json!({"y": 3}),
        ]));
        assert_eq!(schema.get("x"), Some(FieldType::Text));
        assert_eq!(schema.get("y"), Some(FieldType::Text));
    }

    #[test]
    fn test_every_field_appears_once_in_first_appearance_order() {
        let batch = records(vec![
            json!({"_id": 1, "a": 1}),
            json!({"b": "x", "_id": 2}),
            json!({"a": 2.0, "c/d": [1], "b": null}),
        ]);
        let schema = infer_schema(&batch);
        let names: Vec<&str> = schema.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["_id", "a", "b", "c/d"]);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let values = vec![json!(1), json!(null), json!(2.5), json!(3)];
        let forward = infer_schema(&records(values.iter().map(|v| json!({"f": v})).collect()));
        let backward =
            infer_schema(&records(values.iter().rev().map(|v| json!({"f": v})).collect()));
        assert_eq!(forward.get("f"), backward.get("f"));
        assert_eq!(forward.get("f"), Some(FieldType::Decimal));

        use FieldType::*;
        let all = [Timestamp, GeoPoint, JsonDocument, Boolean, Integer, Decimal, Text];
        for a in all {
            for b in all {
                assert_eq!(merge(a, b), merge(b, a));
                for c in all {
                    assert_eq!(merge(merge(a, b), c), merge(a, merge(b, c)));
                }
            }
        }
    }

    #[test]
    fn test_details_flag_mixed_fields() {
        let inference = infer(&records(vec![json!({"n": 1, "s": "a"}), json!({"n": 1.5, "s": null})]));
        let n = &inference.details[0];
        assert_eq!(n.non_null, 2);
        assert!(n.is_mixed());
        assert_eq!(n.observed, vec![FieldType::Integer, FieldType::Decimal]);
        let s = &inference.details[1];
        assert_eq!(s.non_null, 1);
        assert!(!s.is_mixed());
    }

    #[test]
    fn test_empty_batch_gives_empty_schema() {
        assert!(infer_schema(&[]).is_empty());
    }
}
