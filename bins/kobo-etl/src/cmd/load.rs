use std::sync::Arc;

use kobo_engine::{LoadConfig, LoadReport, Loader};
use kobo_source_http::KoboSource;
use kobo_storage_postgres::PgDatabase;

use crate::config::{Effective, LoadArgs};
use crate::error::EtlError;

pub async fn run(args: LoadArgs) -> Result<(), EtlError> {
    let eff = Effective::new(&args.source, &args.db)?;
    let source = Arc::new(KoboSource::new(&eff.kobo)?);
    let table = super::resolve_table(&eff, &source).await?;

    let db = Arc::new(PgDatabase::connect(&eff.pg).await?);
    let config = LoadConfig::new(&eff.asset_uid).with_natural_key(&eff.natural_key);
    let report = Loader::new(config, source, db).run(&table).await?;

    print_report(&report, args.show_failures);
    Ok(())
}

/// Summary on stdout. Failed records are not fatal: they are listed and the
/// process still exits 0.
pub fn print_report(report: &LoadReport, show_failures: usize) {
    println!("{report}");
    for failure in report.failures.iter().take(show_failures) {
        println!(
            "  #{} key={}: {}",
            failure.position, failure.key, failure.error
        );
    }
    if report.failures.len() > show_failures {
        println!("  ... {} more", report.failures.len() - show_failures);
    }
}
