use std::future::Future;
use std::pin::Pin;

use crate::error::TailError;

/// Fetches schema definitions from a schema registry by numeric id.
pub trait SchemaFetcher: Send + Sync {
    /// Return the schema definition text registered under `id`.
    fn fetch_schema(&self, id: u32) -> Pin<Box<dyn Future<Output = Result<String, TailError>> + Send + '_>>;
}
