use crate::BoxFuture;
use crate::error::BackendError;
use crate::schema::TableIdentity;
use crate::statement::{InsertRow, TableDefinition};

/// Destination database handle.
///
/// Every call commits on its own. The loader never reads rows back;
/// `table_exists` is the only query it issues.
pub trait Database: Send + Sync {
    /// Create the namespace if absent. No error if it already exists.
    fn ensure_namespace<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<(), BackendError>>;

    fn table_exists<'a>(&'a self, table: &'a TableIdentity) -> BoxFuture<'a, Result<bool, BackendError>>;

    /// Create the table if absent. An existing table is left untouched.
    fn create_table<'a>(&'a self, def: &'a TableDefinition) -> BoxFuture<'a, Result<(), BackendError>>;

    /// Insert one row, ignoring a conflict on `row.conflict_key`.
    ///
    /// Returns the number of rows written: `1` inserted, `0` already present.
    fn insert_or_ignore<'a>(&'a self, row: &'a InsertRow) -> BoxFuture<'a, Result<u64, BackendError>>;
}
