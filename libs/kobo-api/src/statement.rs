use std::borrow::Cow;

use crate::error::BackendError;
use crate::schema::{Column, TableIdentity};
use crate::value::{Number, Value};

// ════════════════════════════════════════════════════════════════
//  SqlValue
// ════════════════════════════════════════════════════════════════

/// Driver-ready value of one column.
///
/// Scalars are bound in PostgreSQL text input format, so the server applies
/// its own input parsing for whatever type the live column has.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Exact decimal digits, bound as written.
    Numeric(Number),
    Text(String),
    /// Value wrapped for a document column (`jsonb`).
    Document(serde_json::Value),
    /// Object or array headed for a non-document column. Passed through
    /// unwrapped: no driver can bind it, so the insert fails for that record.
    Nested(Value),
}

impl SqlValue {
    /// Text input form of the value. `None` is SQL `NULL`.
    pub fn to_text(&self) -> Result<Option<Cow<'_, str>>, BackendError> {
        match self {
            SqlValue::Null => Ok(None),
            SqlValue::Bool(b) => Ok(Some(Cow::Borrowed(if *b { "true" } else { "false" }))),
            SqlValue::Int(i) => Ok(Some(Cow::Owned(i.to_string()))),
            SqlValue::Numeric(n) => Ok(Some(Cow::Borrowed(n.as_str()))),
            SqlValue::Text(s) => Ok(Some(Cow::Borrowed(s.as_str()))),
            SqlValue::Document(doc) => Ok(Some(Cow::Owned(serde_json::to_string(doc)?))),
            SqlValue::Nested(v) => Err(BackendError::query(format!(
                "cannot bind {} value to a non-document column",
                v.kind()
            ))),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Identifiers
// ════════════════════════════════════════════════════════════════

/// PostgreSQL truncates identifiers to this many bytes.
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Quote an identifier: always wrapped in `"`, embedded `"` doubled.
///
/// Field names carry `/`, leading digits and reserved words verbatim, so
/// every column is quoted unconditionally.
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// `"namespace"."name"`.
pub fn qualified(table: &TableIdentity) -> String {
    format!("{}.{}", quote_ident(&table.namespace), quote_ident(&table.name))
}

/// Table identity as PostgreSQL stores it: both parts truncated. Catalog
/// lookups must use this form, DDL and DML may use either.
pub fn truncated_table(table: &TableIdentity) -> TableIdentity {
    TableIdentity::new(truncated_ident(&table.namespace), truncated_ident(&table.name))
}

/// Identifier as PostgreSQL will store it (truncated on a char boundary).
pub fn truncated_ident(name: &str) -> &str {
    if name.len() <= MAX_IDENTIFIER_BYTES {
        return name;
    }
    let mut end = MAX_IDENTIFIER_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

// ════════════════════════════════════════════════════════════════
//  DDL
// ════════════════════════════════════════════════════════════════

/// Destination table, as created on first write.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub table: TableIdentity,
    pub columns: Vec<Column>,
    /// Natural-key column carrying the primary key.
    pub primary_key: String,
}

impl TableDefinition {
    pub fn create_namespace_sql(namespace: &str) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(namespace))
    }

    pub fn to_sql(&self) -> String {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.field_type.pg_type()))
            .collect();
        defs.push(format!("PRIMARY KEY ({})", quote_ident(&self.primary_key)));
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            qualified(&self.table),
            defs.join(", ")
        )
    }
}

// ════════════════════════════════════════════════════════════════
//  DML
// ════════════════════════════════════════════════════════════════

/// One serialized record, ready for insert-or-ignore.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRow {
    pub table: TableIdentity,
    /// Conflict target: a duplicate key is a no-op, not an error.
    pub conflict_key: String,
    /// Only the fields present in the record; absent columns keep their default.
    pub values: Vec<(String, SqlValue)>,
}

impl InsertRow {
    /// Parameterized statement; `$n` matches `values[n - 1]`.
    pub fn to_sql(&self) -> String {
        let target = qualified(&self.table);
        let conflict = quote_ident(&self.conflict_key);
        if self.values.is_empty() {
            return format!("INSERT INTO {target} DEFAULT VALUES ON CONFLICT ({conflict}) DO NOTHING");
        }
        let columns: Vec<String> = self.values.iter().map(|(c, _)| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=self.values.len()).map(|i| format!("${i}")).collect();
        format!(
            "INSERT INTO {target} ({}) VALUES ({}) ON CONFLICT ({conflict}) DO NOTHING",
            columns.join(", "),
            placeholders.join(", "),
        )
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }
}
