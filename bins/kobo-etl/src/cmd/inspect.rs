use std::sync::Arc;

use kobo_api::{Record, RecordSource, Value};
use kobo_engine::{infer, Inference, LoadConfig, Loader};
use kobo_source_http::{AssetMetadata, KoboSource};
use kobo_storage_memory::MemoryDatabase;

use crate::config::{DbArgs, Effective, InspectArgs};
use crate::error::EtlError;

const PREVIEW_CHARS: usize = 50;

/// Diagnostics: metadata, submissions, the schema a load would create and a
/// rehearsal of the load against an empty in-memory table.
pub async fn run(args: InspectArgs) -> Result<(), EtlError> {
    let eff = Effective::new(&args.source, &DbArgs::default())?;
    let source = Arc::new(KoboSource::new(&eff.kobo)?);

    section("SURVEY");
    let meta = source.asset_metadata(&eff.asset_uid).await?;
    print_metadata(&meta);

    section("SUBMISSIONS");
    let records = source.fetch_all(&eff.asset_uid).await?;
    println!("total: {}", records.len());
    let Some(first) = records.first() else {
        println!("no submissions available");
        return Ok(());
    };

    section("FIRST SUBMISSION");
    print_fields(first);
    if args.dump_first {
        let pretty = serde_json::to_string_pretty(&first.to_json())
            .map_err(kobo_api::BackendError::from)?;
        println!("{pretty}");
    }

    section("INFERRED SCHEMA");
    let inference = infer(&records);
    print_schema(&inference, records.len());

    section("DRY RUN");
    let table = super::resolve_table(&eff, &source).await?;
    let db = Arc::new(MemoryDatabase::new());
    let config = LoadConfig::new(&eff.asset_uid).with_natural_key(&eff.natural_key);
    let report = Loader::new(config, source, db).load(&table, records).await?;
    println!("table: {table}");
    super::load::print_report(&report, 10);
    Ok(())
}

fn section(title: &str) {
    println!("\n== {title} {}", "=".repeat(72usize.saturating_sub(title.len())));
}

fn print_metadata(meta: &AssetMetadata) {
    println!("name:     {}", meta.name);
    println!("uid:      {}", meta.uid);
    println!("created:  {}", meta.date_created.as_deref().unwrap_or("-"));
    println!("modified: {}", meta.date_modified.as_deref().unwrap_or("-"));
    if let Some(count) = meta.submission_count {
        println!("deployed submissions: {count}");
    }
}

fn print_fields(record: &Record) {
    println!("fields: {}", record.len());
    for (name, value) in record.fields() {
        println!("  {name:40} | {:6} | {}", value.kind(), describe(value));
    }
}

fn print_schema(inference: &Inference, total: usize) {
    for detail in &inference.details {
        let flag = if detail.is_mixed() {
            let observed: Vec<String> = detail.observed.iter().map(|t| t.to_string()).collect();
            format!("  MIXED [{}]", observed.join(", "))
        } else {
            String::new()
        };
        println!(
            "  {:40} {:13} {:>6}/{total}{flag}",
            detail.name,
            detail.resolved.to_string(),
            detail.non_null,
        );
    }
    let mixed = inference.details.iter().filter(|d| d.is_mixed()).count();
    println!("columns: {}, mixed: {mixed}", inference.schema.len());
}

/// One-line preview of a field value, calling out the shapes that tend to
/// surprise a schema: empty containers, null-only arrays, empty strings.
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Object(entries) if entries.is_empty() => "{} (empty object)".to_string(),
        Value::Object(entries) => {
            let keys: Vec<&str> = entries.iter().take(3).map(|(k, _)| k.as_str()).collect();
            format!("{{}} with {} keys: {}", entries.len(), keys.join(", "))
        }
        Value::Array(items) if items.is_empty() => "[] (empty array)".to_string(),
        Value::Array(items) if items.iter().all(Value::is_null) => {
            format!("[null x {}] (nulls only)", items.len())
        }
        Value::Array(items) => format!("[...] with {} items", items.len()),
        Value::String(s) if s.is_empty() => "'' (empty string)".to_string(),
        Value::String(s) if s.chars().count() > PREVIEW_CHARS => {
            format!("'{}...'", s.chars().take(PREVIEW_CHARS).collect::<String>())
        }
        Value::String(s) => format!("'{s}'"),
        other => other.to_json().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_shapes() {
        assert_eq!(describe(&Value::Null), "NULL");
        assert_eq!(describe(&Value::Object(vec![])), "{} (empty object)");
        assert_eq!(describe(&Value::Array(vec![])), "[] (empty array)");
        assert_eq!(
            describe(&Value::Array(vec![Value::Null, Value::Null])),
            "[null x 2] (nulls only)"
        );
        assert_eq!(describe(&Value::String(String::new())), "'' (empty string)");
        assert_eq!(describe(&Value::Int(7)), "7");
        assert_eq!(
            describe(&Value::Object(vec![("a".into(), Value::Int(1))])),
            "{} with 1 keys: a"
        );
    }

    #[test]
    fn test_describe_truncates_long_strings() {
        let long = "x".repeat(80);
        let out = describe(&Value::String(long));
        assert_eq!(out.len(), PREVIEW_CHARS + 5);
        assert!(out.ends_with("...'"));
    }
}
