use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tokio::sync::RwLock;

use kobo_api::statement::{qualified, truncated_table};
use kobo_api::{
    BackendError, BoxFuture, Column, Database, FieldType, InsertRow, SqlValue, TableDefinition,
    TableIdentity,
};

// ═══════════════════════════════════════════════════════════════
//  MemoryTable
// ═══════════════════════════════════════════════════════════════

/// One stored row: every column of the table, `Null` where the insert
/// left it at its default.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRow {
    pub values: Vec<(String, SqlValue)>,
}

impl MemoryRow {
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }
}

#[derive(Debug)]
struct MemoryTable {
    columns: Vec<Column>,
    primary_key: String,
    keys: HashSet<String>,
    rows: Vec<MemoryRow>,
}

impl MemoryTable {
    fn column_type(&self, name: &str) -> Option<FieldType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.field_type)
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryDatabase
// ═══════════════════════════════════════════════════════════════

/// In-memory `Database` for dry runs and tests. Behaves like PostgreSQL
/// wherever the loader can tell the difference.
///
/// - values are checked against the column type the way PostgreSQL parses
///   text input (`"5"` fits `bigint`, `"2.5"` does not)
/// - a duplicate primary key is a silent no-op (`0` rows)
/// - a null or missing primary key, an unknown column, or an unbindable
///   nested value is a query error
/// - tables are stored under their truncated identity; `table_exists`
///   compares the name it is given, like a catalog query
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    namespaces: RwLock<HashSet<String>>,
    tables: RwLock<HashMap<TableIdentity, MemoryTable>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a table's rows in insertion order. `None` if no such table.
    pub async fn rows(&self, table: &TableIdentity) -> Option<Vec<MemoryRow>> {
        self.tables.read().await.get(&truncated_table(table)).map(|t| t.rows.clone())
    }

    /// Live column set of a table.
    pub async fn columns(&self, table: &TableIdentity) -> Option<Vec<Column>> {
        self.tables.read().await.get(&truncated_table(table)).map(|t| t.columns.clone())
    }

    pub async fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.read().await.contains(namespace)
    }
}

impl Database for MemoryDatabase {
    fn ensure_namespace<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            self.namespaces.write().await.insert(namespace.to_string());
            Ok(())
        })
    }

    fn table_exists<'a>(&'a self, table: &'a TableIdentity) -> BoxFuture<'a, Result<bool, BackendError>> {
        Box::pin(async move { Ok(self.tables.read().await.contains_key(table)) })
    }

    fn create_table<'a>(&'a self, def: &'a TableDefinition) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            if !self.namespaces.read().await.contains(&def.table.namespace) {
                return Err(BackendError::query(format!(
                    "schema \"{}\" does not exist",
                    def.table.namespace
                )));
            }
            if !def.columns.iter().any(|c| c.name == def.primary_key) {
                return Err(BackendError::query(format!(
                    "column \"{}\" named in key does not exist",
                    def.primary_key
                )));
            }
            let mut tables = self.tables.write().await;
            tables.entry(truncated_table(&def.table)).or_insert_with(|| MemoryTable {
                columns: def.columns.clone(),
                primary_key: def.primary_key.clone(),
                keys: HashSet::new(),
                rows: Vec::new(),
            });
            Ok(())
        })
    }

    fn insert_or_ignore<'a>(&'a self, row: &'a InsertRow) -> BoxFuture<'a, Result<u64, BackendError>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let table = tables.get_mut(&truncated_table(&row.table)).ok_or_else(|| {
                BackendError::query(format!("relation {} does not exist", qualified(&row.table)))
            })?;

            for (column, value) in &row.values {
                let ty = table.column_type(column).ok_or_else(|| {
                    BackendError::query(format!(
                        "column \"{column}\" of relation \"{}\" does not exist",
                        row.table.name
                    ))
                })?;
                check_input(ty, value)?;
            }

            let key = match row.get(&table.primary_key).map(SqlValue::to_text) {
                Some(Ok(Some(text))) => text.into_owned(),
                Some(Err(e)) => return Err(e),
                Some(Ok(None)) | None => {
                    return Err(BackendError::query(format!(
                        "null value in column \"{}\" violates not-null constraint",
                        table.primary_key
                    )));
                }
            };
            if row.conflict_key == table.primary_key && table.keys.contains(&key) {
                return Ok(0);
            }
            if table.keys.contains(&key) {
                return Err(BackendError::query(format!(
                    "duplicate key value violates unique constraint on \"{}\"",
                    table.primary_key
                )));
            }

            let values = table
                .columns
                .iter()
                .map(|c| {
                    let v = row.get(&c.name).cloned().unwrap_or(SqlValue::Null);
                    (c.name.clone(), v)
                })
                .collect();
            table.keys.insert(key);
            table.rows.push(MemoryRow { values });
            Ok(1)
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Text input checks
// ═══════════════════════════════════════════════════════════════

/// Would PostgreSQL accept this bound value for a column of type `ty`?
fn check_input(ty: FieldType, value: &SqlValue) -> Result<(), BackendError> {
    if let SqlValue::Document(_) = value {
        if ty != FieldType::JsonDocument {
            return Err(BackendError::query(format!(
                "column is of type {} but expression is of type jsonb",
                ty.pg_type()
            )));
        }
    }
    let Some(text) = value.to_text()? else {
        return Ok(());
    };
    let ok = match ty {
        FieldType::Text => true,
        FieldType::Integer => text.trim().parse::<i64>().is_ok(),
        FieldType::Decimal => text.trim().parse::<f64>().is_ok(),
        FieldType::Boolean => parse_bool(&text),
        FieldType::Timestamp => parse_timestamp(text.trim()),
        FieldType::GeoPoint => parse_point(&text),
        FieldType::JsonDocument => serde_json::from_str::<serde_json::Value>(&text).is_ok(),
    };
    if ok {
        Ok(())
    } else {
        Err(BackendError::query(format!(
            "invalid input syntax for type {}: \"{text}\"",
            ty.pg_type()
        )))
    }
}

fn parse_bool(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "t" | "true" | "y" | "yes" | "on" | "1" | "f" | "false" | "n" | "no" | "off" | "0"
    )
}

fn parse_timestamp(text: &str) -> bool {
    const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"];
    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    DateTime::parse_from_rfc3339(text).is_ok()
        || OFFSET_FORMATS
            .iter()
            .any(|f| DateTime::parse_from_str(text, f).is_ok())
        || NAIVE_FORMATS
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(text, f).is_ok())
        || NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

fn parse_point(text: &str) -> bool {
    let inner = text.trim();
    let inner = inner
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(inner);
    let mut parts = inner.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(x), Some(y), None) => {
            x.trim().parse::<f64>().is_ok() && y.trim().parse::<f64>().is_ok()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kobo_api::{Number, Value};
    use serde_json::json;

    fn table() -> TableIdentity {
        TableIdentity::new("dsa", "kobo_t")
    }

    async fn db_with_table() -> MemoryDatabase {
        let db = MemoryDatabase::new();
        db.ensure_namespace("dsa").await.unwrap();
        db.create_table(&TableDefinition {
            table: table(),
            columns: vec![
                Column::new("_id", FieldType::Integer),
                Column::new("when", FieldType::Timestamp),
                Column::new("geo", FieldType::GeoPoint),
                Column::new("doc", FieldType::JsonDocument),
                Column::new("note", FieldType::Text),
            ],
            primary_key: "_id".into(),
        })
        .await
        .unwrap();
        db
    }

    fn row(values: Vec<(&str, SqlValue)>) -> InsertRow {
        InsertRow {
            table: table(),
            conflict_key: "_id".into(),
            values: values.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_duplicate_is_noop() {
        let db = db_with_table().await;
        let r = row(vec![("_id", SqlValue::Int(1)), ("note", SqlValue::Text("a".into()))]);
        assert_eq!(db.insert_or_ignore(&r).await.unwrap(), 1);
        assert_eq!(db.insert_or_ignore(&r).await.unwrap(), 0);
        let rows = db.rows(&table()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("when"), Some(&SqlValue::Null));
    }

    #[tokio::test]
    async fn test_text_input_is_checked_against_column_type() {
        let db = db_with_table().await;
        let ok = row(vec![
            ("_id", SqlValue::Int(2)),
            ("note", SqlValue::Numeric(Number::parse("18446744073709551615").unwrap())),
            ("when", SqlValue::Text("2024-05-01T10:00:00.000-05:00".into())),
            ("geo", SqlValue::Text("12.5,-0.3".into())),
            ("doc", SqlValue::Document(json!({"x": 1}))),
        ]);
        assert_eq!(db.insert_or_ignore(&ok).await.unwrap(), 1);

        let bad_int = row(vec![("_id", SqlValue::Numeric(Number::parse("2.5").unwrap()))]);
        assert!(db.insert_or_ignore(&bad_int).await.is_err());
        let bad_ts = row(vec![("_id", SqlValue::Int(3)), ("when", SqlValue::Text("soon".into()))]);
        assert!(db.insert_or_ignore(&bad_ts).await.is_err());
        let bad_doc = row(vec![("_id", SqlValue::Int(4)), ("note", SqlValue::Document(json!([])))]);
        assert!(db.insert_or_ignore(&bad_doc).await.is_err());
        let nested = row(vec![
            ("_id", SqlValue::Int(5)),
            ("note", SqlValue::Nested(Value::Object(vec![]))),
        ]);
        assert!(db.insert_or_ignore(&nested).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_key_and_unknown_column_fail() {
        let db = db_with_table().await;
        let no_key = row(vec![("note", SqlValue::Text("x".into()))]);
        assert!(db.insert_or_ignore(&no_key).await.is_err());
        let unknown = row(vec![("_id", SqlValue::Int(1)), ("nope", SqlValue::Int(1))]);
        let err = db.insert_or_ignore(&unknown).await.unwrap_err();
        assert!(err.message().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_create_table_requires_namespace_and_is_idempotent() {
        let db = MemoryDatabase::new();
        let def = TableDefinition {
            table: table(),
            columns: vec![Column::new("_id", FieldType::Integer)],
            primary_key: "_id".into(),
        };
        assert!(db.create_table(&def).await.is_err());
        db.ensure_namespace("dsa").await.unwrap();
        db.ensure_namespace("dsa").await.unwrap();
        db.create_table(&def).await.unwrap();
        db.create_table(&def).await.unwrap();
        assert!(db.table_exists(&table()).await.unwrap());
        assert_eq!(db.columns(&table()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_long_table_name_is_stored_truncated() {
        let db = MemoryDatabase::new();
        db.ensure_namespace("dsa").await.unwrap();
        let long = TableIdentity::new("dsa", "t".repeat(70));
        db.create_table(&TableDefinition {
            table: long.clone(),
            columns: vec![Column::new("_id", FieldType::Integer)],
            primary_key: "_id".into(),
        })
        .await
        .unwrap();
        assert!(!db.table_exists(&long).await.unwrap());
        assert!(db.table_exists(&truncated_table(&long)).await.unwrap());
        let r = InsertRow {
            table: long.clone(),
            conflict_key: "_id".into(),
            values: vec![("_id".into(), SqlValue::Int(1))],
        };
        assert_eq!(db.insert_or_ignore(&r).await.unwrap(), 1);
        assert_eq!(db.rows(&long).await.unwrap().len(), 1);
    }

    #[test]
    fn test_point_and_bool_parsing() {
        assert!(parse_point("(1.5, 2)"));
        assert!(!parse_point("1.5"));
        assert!(!parse_point("1,2,3"));
        assert!(parse_bool("Yes"));
        assert!(!parse_bool("maybe"));
    }
}
