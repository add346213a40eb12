//! Cleanup executor: truncates the staging table.
//!
//! Runs twice per export: defensively at run start (a previous run may have
//! died between write and cleanup) and again after a successful merge, so
//! staging holds only the current run's rows before any merge executes.

use tracing::debug;

use crate::pipeline::StageError;
use crate::port::WarehouseBackend;
use crate::sql::{Statement, TableRef, TruncateStatement};

pub struct CleanupExecutor<'a> {
    backend: &'a dyn WarehouseBackend,
}

impl<'a> CleanupExecutor<'a> {
    pub fn new(backend: &'a dyn WarehouseBackend) -> Self {
        Self { backend }
    }

    /// Fails loudly: a truncate error is fatal to the run.
    pub async fn truncate(&self, staging: &TableRef) -> Result<(), StageError> {
        let statement = Statement::Truncate(TruncateStatement {
            table: staging.clone(),
        });
        debug!(%staging, "truncating staging table");
        self.backend.execute(&statement).await?;
        Ok(())
    }
}
