//! Type inference and schema reconciliation for survey submissions, and the
//! loader that drives a batch into the destination database.

pub mod classify;
pub mod config;
pub mod ddl;
pub mod error;
pub mod infer;
pub mod loader;
pub mod report;
pub mod serialize;

pub use classify::classify;
pub use config::LoadConfig;
pub use ddl::{EnsureOutcome, SchemaWriter};
pub use error::LoadError;
pub use infer::{infer, infer_schema, merge, FieldDetail, Inference};
pub use loader::Loader;
pub use report::{LoadReport, RecordFailure, RecordOutcome};
pub use serialize::{insert_row, natural_key_text, serialize};
