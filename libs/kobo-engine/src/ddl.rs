//! Destination namespace and table creation.

use std::collections::HashMap;

use kobo_api::statement::{truncated_ident, truncated_table, MAX_IDENTIFIER_BYTES};
use kobo_api::{Database, Schema, TableDefinition, TableIdentity};

use crate::error::LoadError;

/// What `ensure` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    /// Left as-is, whatever its live columns are.
    AlreadyExists,
}

/// Makes sure the destination exists. Never alters an existing table:
/// first write wins, a later mismatch shows up as per-row insert failures.
pub struct SchemaWriter<'a> {
    db: &'a dyn Database,
}

impl<'a> SchemaWriter<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    /// Idempotent: namespace and table are created only when absent.
    pub async fn ensure(
        &self,
        table: &TableIdentity,
        schema: &Schema,
        natural_key: &str,
    ) -> Result<EnsureOutcome, LoadError> {
        let write_err = |source| LoadError::SchemaWrite {
            table: table.clone(),
            source,
        };

        self.db
            .ensure_namespace(&table.namespace)
            .await
            .map_err(write_err)?;

        // The catalog holds the truncated name.
        let stored = truncated_table(table);
        if stored != *table {
            tracing::warn!(table = %table, stored = %stored, "table name exceeds {MAX_IDENTIFIER_BYTES} bytes and will be truncated");
        }
        if self.db.table_exists(&stored).await.map_err(write_err)? {
            tracing::info!(table = %table, "table exists, keeping its schema");
            return Ok(EnsureOutcome::AlreadyExists);
        }

        let def = definition(table, schema, natural_key)?;
        self.db.create_table(&def).await.map_err(write_err)?;
        tracing::info!(table = %table, columns = def.columns.len(), key = %natural_key, "created table");
        Ok(EnsureOutcome::Created)
    }
}

/// Table definition for a fresh table: one column per schema entry, primary
/// key on the natural key.
pub fn definition(
    table: &TableIdentity,
    schema: &Schema,
    natural_key: &str,
) -> Result<TableDefinition, LoadError> {
    if !schema.contains(natural_key) {
        return Err(LoadError::MissingNaturalKey {
            table: table.clone(),
            key: natural_key.to_string(),
        });
    }

    let mut seen: HashMap<&str, &str> = HashMap::new();
    for col in schema.columns() {
        if col.name.len() > MAX_IDENTIFIER_BYTES {
            tracing::warn!(column = %col.name, "column name exceeds {MAX_IDENTIFIER_BYTES} bytes and will be truncated");
        }
        if let Some(first) = seen.insert(truncated_ident(&col.name), &col.name) {
            return Err(LoadError::ColumnCollision {
                table: table.clone(),
                first: first.to_string(),
                second: col.name.clone(),
            });
        }
    }

    Ok(TableDefinition {
        table: table.clone(),
        columns: schema.columns().to_vec(),
        primary_key: natural_key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kobo_api::FieldType;

    fn table() -> TableIdentity {
        TableIdentity::new("dsa", "kobo_x")
    }

    #[test]
    fn test_definition_keeps_schema_order_and_key() {
        let mut schema = Schema::new();
        schema.set("start", FieldType::Timestamp);
        schema.set("_id", FieldType::Integer);
        let def = definition(&table(), &schema, "_id").unwrap();
        assert_eq!(def.columns[0].name, "start");
        assert_eq!(def.primary_key, "_id");
    }

    #[test]
    fn test_missing_natural_key() {
        let mut schema = Schema::new();
        schema.set("a", FieldType::Text);
        let err = definition(&table(), &schema, "_id").unwrap_err();
        assert!(matches!(err, LoadError::MissingNaturalKey { .. }));
        assert!(err.is_schema_write());
    }

    #[test]
    fn test_truncation_collision() {
        let prefix = "g".repeat(MAX_IDENTIFIER_BYTES);
        let mut schema = Schema::new();
        schema.set("_id", FieldType::Integer);
        schema.set(format!("{prefix}/one"), FieldType::Text);
        schema.set(format!("{prefix}/two"), FieldType::Text);
        let err = definition(&table(), &schema, "_id").unwrap_err();
        assert!(matches!(err, LoadError::ColumnCollision { .. }));
    }
}
