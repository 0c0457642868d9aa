use crate::BoxFuture;
use crate::error::BackendError;
use crate::value::Record;

/// Where submissions come from.
///
/// Pagination and authentication are the source's business: `fetch_all`
/// returns the full, ordered batch or fails as a whole.
pub trait RecordSource: Send + Sync {
    fn fetch_all<'a>(&'a self, source_id: &'a str) -> BoxFuture<'a, Result<Vec<Record>, BackendError>>;
}
