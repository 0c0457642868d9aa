pub mod inspect;
pub mod load;

use kobo_api::TableIdentity;
use kobo_source_http::KoboSource;

use crate::config::{Effective, TableNaming};
use crate::error::EtlError;

/// Destination table for this run. Only `SurveyName` costs a request.
pub async fn resolve_table(eff: &Effective, source: &KoboSource) -> Result<TableIdentity, EtlError> {
    let table = match &eff.table {
        TableNaming::Explicit(name) => TableIdentity::new(&eff.namespace, name),
        TableNaming::Prefixed(prefix) => {
            TableIdentity::for_source(&eff.namespace, prefix, &eff.asset_uid)
        }
        TableNaming::SurveyName => {
            let meta = source.asset_metadata(&eff.asset_uid).await?;
            let table = TableIdentity::for_survey_name(&eff.namespace, &meta.name);
            if table.name.is_empty() {
                return Err(EtlError::config(
                    "table",
                    format!("survey name '{}' leaves nothing to name a table", meta.name),
                ));
            }
            table
        }
    };
    tracing::info!(table = %table, "destination table");
    Ok(table)
}
