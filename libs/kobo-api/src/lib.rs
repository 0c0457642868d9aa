use std::future::Future;
use std::pin::Pin;

pub mod database;
pub mod error;
pub mod schema;
pub mod source;
pub mod statement;
pub mod value;

pub use database::Database;
pub use error::{BackendError, ErrorKind};
pub use schema::{clean_survey_name, Column, FieldType, Schema, TableIdentity};
pub use source::RecordSource;
pub use statement::{InsertRow, SqlValue, TableDefinition};
pub use value::{Number, Record, Value};

/// Boxed future returned by the object-safe backend traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
