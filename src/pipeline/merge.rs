//! Merge executor: one atomic key-matched upsert from staging into target.

use tracing::debug;

use crate::pipeline::StageError;
use crate::port::WarehouseBackend;
use crate::sql::{MergeStatement, Statement, TableRef};

pub struct MergeExecutor<'a> {
    backend: &'a dyn WarehouseBackend,
}

impl<'a> MergeExecutor<'a> {
    pub fn new(backend: &'a dyn WarehouseBackend) -> Self {
        Self { backend }
    }

    /// Executes the upsert and waits for completion. Matched target rows
    /// have every non-key column overwritten from staging, unmatched
    /// staging rows are inserted, and no target row is ever deleted.
    /// Unlike staging row errors, any backend failure here is fatal.
    pub async fn merge(&self, target: &TableRef, staging: &TableRef) -> Result<(), StageError> {
        let statement = Statement::Merge(MergeStatement::products(
            target.clone(),
            staging.clone(),
        ));
        debug!(%target, %staging, "executing merge statement");
        self.backend.execute(&statement).await?;
        Ok(())
    }
}
