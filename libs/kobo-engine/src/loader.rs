use std::sync::Arc;

use kobo_api::{Database, Record, RecordSource, Schema, TableIdentity};

use crate::config::LoadConfig;
use crate::ddl::SchemaWriter;
use crate::error::LoadError;
use crate::infer::infer;
use crate::report::{LoadReport, RecordFailure, RecordOutcome};
use crate::serialize::{insert_row, natural_key_text};

/// Drives one load: FETCH → INFER → ENSURE_SCHEMA → INSERT_LOOP → DONE.
///
/// Sequential. Each record is inserted and committed on its own, in fetch
/// order, exactly once. A failing record is logged and counted, the loop
/// goes on, and earlier commits stay.
pub struct Loader {
    config: LoadConfig,
    source: Arc<dyn RecordSource>,
    db: Arc<dyn Database>,
}

impl Loader {
    pub fn new(config: LoadConfig, source: Arc<dyn RecordSource>, db: Arc<dyn Database>) -> Self {
        Self { config, source, db }
    }

    /// Fetch the whole batch from the source, then [`load`](Self::load) it.
    pub async fn run(&self, table: &TableIdentity) -> Result<LoadReport, LoadError> {
        let source_id = &self.config.source_id;
        tracing::info!(source = %source_id, "fetching submissions");
        let records = self
            .source
            .fetch_all(source_id)
            .await
            .map_err(|source| LoadError::Fetch {
                source_id: source_id.clone(),
                source,
            })?;
        self.load(table, records).await
    }

    /// Load an already materialized batch.
    pub async fn load(
        &self,
        table: &TableIdentity,
        records: Vec<Record>,
    ) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport {
            fetched: records.len(),
            ..Default::default()
        };
        if records.is_empty() {
            tracing::info!(table = %table, "no submissions to load");
            return Ok(report);
        }
        tracing::info!(table = %table, records = records.len(), "inferring schema");

        let inference = infer(&records);
        let schema = inference.schema;
        tracing::info!(
            table = %table,
            columns = schema.len(),
            mixed = inference.details.iter().filter(|d| d.is_mixed()).count(),
            "schema inferred"
        );

        SchemaWriter::new(self.db.as_ref())
            .ensure(table, &schema, &self.config.natural_key)
            .await?;

        for (position, record) in records.into_iter().enumerate() {
            let outcome = self.insert_one(position, table, &schema, &record).await;
            report.record(outcome);
        }

        tracing::info!(
            table = %table,
            inserted = report.inserted,
            skipped = report.skipped,
            failed = report.failed,
            "load finished"
        );
        Ok(report)
    }

    async fn insert_one(
        &self,
        position: usize,
        table: &TableIdentity,
        schema: &Schema,
        record: &Record,
    ) -> RecordOutcome {
        let key = &self.config.natural_key;
        let row = insert_row(table, key, record, schema);
        match self.db.insert_or_ignore(&row).await {
            Ok(0) => RecordOutcome::Skipped,
            Ok(_) => RecordOutcome::Inserted,
            Err(error) => {
                let key = natural_key_text(record, key);
                tracing::warn!(position, key = %key, error = %error, "record insert failed");
                RecordOutcome::Failed(RecordFailure { position, key, error })
            }
        }
    }
}
