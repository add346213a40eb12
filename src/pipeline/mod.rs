//! The stage-then-merge export pipeline.
//!
//! Data flows one way, each stage fully draining before the next starts:
//! producer → codec → staging write → merge → cleanup.

pub mod cleanup;
pub mod merge;
pub mod orchestrator;
pub mod stage_writer;

pub use orchestrator::{FailureReason, PipelineOrchestrator, RunOutcome};

use thiserror::Error;

use crate::error::ExporterError;
use crate::port::BackendError;
use crate::sql::TableRef;

/// Where a run lands its rows.
#[derive(Debug, Clone)]
pub struct Destination {
    pub target: TableRef,
    pub staging: TableRef,
    pub batch_size: usize,
}

impl Destination {
    pub fn new(
        dataset: &str,
        target_table: &str,
        staging_table: &str,
        batch_size: usize,
    ) -> Result<Self, ExporterError> {
        if batch_size == 0 {
            return Err(ExporterError::Config(
                "batch size must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            target: TableRef::new(dataset, target_table)?,
            staging: TableRef::new(dataset, staging_table)?,
            batch_size,
        })
    }
}

/// Failure of a single pipeline stage. Consumed by the orchestrator; never
/// crosses the crate's public boundary as an error.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("local spool I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("interrupted while waiting for a backend job")]
    Interrupted,
    #[error("backend failure: {0}")]
    Backend(String),
}

impl From<BackendError> for StageError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Interrupted => StageError::Interrupted,
            other => StageError::Backend(other.to_string()),
        }
    }
}
