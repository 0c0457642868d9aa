use kobo_api::{BackendError, TableIdentity};

/// Fatal load errors. Any of these ends the run; per-record failures are
/// not errors here, they are counted in the report.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("fetch '{source_id}': {source}")]
    Fetch {
        source_id: String,
        source: BackendError,
    },

    #[error("schema write {table}: {source}")]
    SchemaWrite {
        table: TableIdentity,
        source: BackendError,
    },

    #[error("schema write {table}: natural key '{key}' never appears in the batch")]
    MissingNaturalKey { table: TableIdentity, key: String },

    #[error("schema write {table}: columns '{first}' and '{second}' collide after identifier truncation")]
    ColumnCollision {
        table: TableIdentity,
        first: String,
        second: String,
    },
}

impl LoadError {
    /// Schema errors happen before any insert; fetch errors before inference.
    pub fn is_schema_write(&self) -> bool {
        matches!(
            self,
            LoadError::SchemaWrite { .. }
                | LoadError::MissingNaturalKey { .. }
                | LoadError::ColumnCollision { .. }
        )
    }
}
