use crate::domain::model::{Batch, TableReport};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// A forward-only, non-restartable producer of raw records.
#[async_trait]
pub trait RecordSource: Send {
    /// Pull up to `max` records. An empty batch means the source is exhausted.
    async fn next_batch(&mut self, max: usize) -> Result<Batch>;

    /// Total number of records, when it is known before reading.
    fn total_hint(&self) -> Option<u64> {
        None
    }
}

/// A destination that commits each batch as one transaction.
#[async_trait]
pub trait RecordSink: Send {
    /// Write and commit `batch`, returning the number of records written.
    async fn commit_batch(&mut self, batch: &Batch) -> Result<u64>;
}

#[async_trait]
pub trait Pipeline: Send {
    fn name(&self) -> &str;

    /// Path of the embedded store this pipeline writes to.
    fn destination(&self) -> &Path;

    /// Fail fast before any destination table is touched.
    async fn check_preconditions(&mut self) -> Result<()>;

    /// Prepare the schema and run every table transfer.
    async fn execute(&mut self) -> Result<Vec<TableReport>>;
}
