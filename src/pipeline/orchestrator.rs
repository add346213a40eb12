//! Pipeline orchestrator: sequences the export stages and maps every
//! failure into an explicit run outcome.
//!
//! One run walks Producing → Writing → Merging → Cleaning strictly in
//! order; producer and writer are interleaved one batch at a time so peak
//! memory is bounded by a single batch, never the whole dataset.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::ProductRecord;
use crate::pipeline::cleanup::CleanupExecutor;
use crate::pipeline::merge::MergeExecutor;
use crate::pipeline::stage_writer::StagingWriter;
use crate::pipeline::{Destination, StageError};
use crate::port::WarehouseBackend;
use crate::producer::{BatchProducer, SyntheticProducer};

/// Why a run failed. No error type crosses this boundary; callers branch on
/// the tag and log the detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The local serialization sink could not be opened or written.
    Io(String),
    /// A backend job wait was interrupted; staging state is undefined.
    Interrupted,
    /// The backend rejected the write or merge job.
    Backend(String),
    /// Another export run already holds the run token.
    Busy,
}

impl From<StageError> for FailureReason {
    fn from(err: StageError) -> Self {
        match err {
            StageError::Io(e) => FailureReason::Io(e.to_string()),
            StageError::Interrupted => FailureReason::Interrupted,
            StageError::Backend(detail) => FailureReason::Backend(detail),
        }
    }
}

/// Terminal report of one export run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub success: bool,
    pub rows_produced: u64,
    pub batches_written: u64,
    /// Rows the backend dropped with row-level errors while the run still
    /// succeeded overall. Non-zero means the target is missing those rows.
    pub rows_dropped: u64,
    pub failure: Option<FailureReason>,
    /// Wall-clock milliseconds for the whole run; set by the probe variant.
    pub elapsed_ms: Option<u64>,
}

impl RunOutcome {
    fn started(run_id: Uuid) -> Self {
        Self {
            run_id,
            success: false,
            rows_produced: 0,
            batches_written: 0,
            rows_dropped: 0,
            failure: None,
            elapsed_ms: None,
        }
    }
}

pub struct PipelineOrchestrator {
    backend: Arc<dyn WarehouseBackend>,
    destination: Destination,
    spool_path: PathBuf,
    /// Run token: concurrent exports would interleave writes into the one
    /// shared staging table, so overlap fails fast instead.
    run_guard: Mutex<()>,
}

impl PipelineOrchestrator {
    pub fn new(
        backend: Arc<dyn WarehouseBackend>,
        destination: Destination,
        spool_path: impl AsRef<Path>,
    ) -> Self {
        Self {
            backend,
            destination,
            spool_path: spool_path.as_ref().to_path_buf(),
            run_guard: Mutex::new(()),
        }
    }

    /// Drains `producer` through the full pipeline. Never panics and never
    /// returns an error type; the outcome carries success or the tagged
    /// failure reason.
    pub async fn export(&self, producer: &mut dyn BatchProducer) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let Ok(_guard) = self.run_guard.try_lock() else {
            warn!(%run_id, "another export run is already in progress");
            let mut outcome = RunOutcome::started(run_id);
            outcome.failure = Some(FailureReason::Busy);
            return outcome;
        };
        self.run(run_id, producer).await
    }

    /// Synthetic performance probe: exports `count` template records and
    /// reports the end-to-end wall-clock time.
    pub async fn probe(&self, template: ProductRecord, count: usize) -> RunOutcome {
        let mut producer = SyntheticProducer::new(template, count);
        let started = Instant::now();
        let mut outcome = self.export(&mut producer).await;
        outcome.elapsed_ms = Some(started.elapsed().as_millis() as u64);
        info!(
            run_id = %outcome.run_id,
            rows = outcome.rows_produced,
            elapsed_ms = outcome.elapsed_ms,
            "performance probe finished"
        );
        outcome
    }

    /// Reads the target table back, decoding rows through the codec.
    pub async fn read_target(&self) -> Result<Vec<ProductRecord>, StageError> {
        let rows = self.backend.read_all(&self.destination.target).await?;
        Ok(rows.iter().map(crate::codec::from_storage_row).collect())
    }

    async fn run(&self, run_id: Uuid, producer: &mut dyn BatchProducer) -> RunOutcome {
        let mut outcome = RunOutcome::started(run_id);
        let backend = self.backend.as_ref();
        let cleanup = CleanupExecutor::new(backend);

        info!(%run_id, destination = %self.destination.target, "serializing batches to local spool");

        // The spool opens before anything touches the warehouse, so a local
        // IO failure leaves both staging and target unmodified.
        let mut writer = match StagingWriter::create(&self.spool_path).await {
            Ok(writer) => writer,
            Err(err) => return fail(outcome, "serialize", err),
        };

        // Defensive truncate: a previous run may have died between its
        // staging write and its cleanup.
        if let Err(err) = cleanup.truncate(&self.destination.staging).await {
            return fail(outcome, "pre-clean", err);
        }

        let mut offset = 0;
        loop {
            let batch = producer.next_page(offset, self.destination.batch_size);
            if batch.is_empty() {
                break;
            }
            offset += self.destination.batch_size;
            outcome.rows_produced += batch.len() as u64;
            if let Err(err) = writer.append_batch(&batch).await {
                return fail(outcome, "serialize", err);
            }
        }

        let summary = match writer.finish(backend, &self.destination.staging).await {
            Ok(summary) => summary,
            Err(err) => return fail(outcome, "stage-write", err),
        };
        outcome.batches_written = summary.batches;
        outcome.rows_dropped = summary.rows_dropped;
        info!(
            %run_id,
            rows = summary.rows,
            batches = summary.batches,
            dropped = summary.rows_dropped,
            "stage write done"
        );

        let merge = MergeExecutor::new(backend);
        if let Err(err) = merge
            .merge(&self.destination.target, &self.destination.staging)
            .await
        {
            return fail(outcome, "merge", err);
        }
        info!(%run_id, "merge done");

        if let Err(err) = cleanup.truncate(&self.destination.staging).await {
            return fail(outcome, "cleanup", err);
        }

        outcome.success = true;
        info!(
            %run_id,
            rows = outcome.rows_produced,
            dropped = outcome.rows_dropped,
            "export completed"
        );
        outcome
    }
}

fn fail(mut outcome: RunOutcome, stage: &str, err: StageError) -> RunOutcome {
    error!(run_id = %outcome.run_id, stage, error = %err, "export failed");
    outcome.success = false;
    outcome.failure = Some(FailureReason::from(err));
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_errors_map_to_tagged_reasons() {
        let io = StageError::Io(std::io::Error::other("disk gone"));
        assert!(matches!(FailureReason::from(io), FailureReason::Io(_)));

        assert_eq!(
            FailureReason::from(StageError::Interrupted),
            FailureReason::Interrupted
        );

        let backend = StageError::Backend("quota exceeded".to_string());
        assert_eq!(
            FailureReason::from(backend),
            FailureReason::Backend("quota exceeded".to_string())
        );
    }
}
