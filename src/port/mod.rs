//! Port seam between the pipeline and the warehouse backend.
//!
//! The pipeline never talks to a concrete client; it drives this trait and
//! lets an adapter (HTTP job API, in-memory fake) supply the transport.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::codec::StorageRow;
use crate::sql::{Statement, TableRef};

/// One row the backend could not ingest. Reported on an otherwise
/// successful write job; never fatal on its own.
#[derive(Debug, Clone)]
pub struct RowError {
    pub index: usize,
    pub message: String,
}

/// Terminal outcome of a staging-write job.
#[derive(Debug, Clone, Default)]
pub struct WriteJob {
    pub rows_appended: u64,
    pub row_errors: Vec<RowError>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend accepted the request but the job ended in a failed state.
    #[error("backend rejected the job: {0}")]
    Rejected(String),
    /// The wait for a submitted job was cut short. The job may still run to
    /// completion on the backend side; staging state is undefined.
    #[error("interrupted while waiting for the backend job")]
    Interrupted,
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Warehouse backend operations the pipeline depends on.
///
/// All three calls block until the backend reports the job terminal; there
/// is no caller-supplied timeout and no cancellation primitive.
#[async_trait]
pub trait WarehouseBackend: Send + Sync {
    /// Stream the newline-delimited artifact at `source` into `table` under
    /// a truncate-write disposition (prior contents are replaced) and wait
    /// for the write job to finish. Implementations read the artifact
    /// incrementally; the payload is never materialized whole in memory.
    async fn load_rows(&self, table: &TableRef, source: &Path) -> Result<WriteJob, BackendError>;

    /// Execute a merge or truncate statement and wait for completion.
    async fn execute(&self, statement: &Statement) -> Result<(), BackendError>;

    /// Read every row of `table`.
    async fn read_all(&self, table: &TableRef) -> Result<Vec<StorageRow>, BackendError>;
}
