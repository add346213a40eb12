//! Staging writer: spools serialized batches to a local NDJSON artifact,
//! then streams the artifact into the staging table.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::codec;
use crate::domain::ProductRecord;
use crate::pipeline::StageError;
use crate::port::WarehouseBackend;
use crate::sql::TableRef;

/// What a completed staging write looked like.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows: u64,
    pub batches: u64,
    /// Rows the backend reported as row-level errors. Logged and counted,
    /// never fatal; these rows are absent from the subsequent merge.
    pub rows_dropped: u64,
}

pub struct StagingWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
    batches: u64,
}

impl StagingWriter {
    /// Opens the spool file, replacing any artifact from a previous run.
    pub async fn create(path: &Path) -> Result<Self, StageError> {
        let file = File::create(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            rows: 0,
            batches: 0,
        })
    }

    /// Stamps, serializes and appends one batch, one NDJSON line per record.
    pub async fn append_batch(&mut self, batch: &[ProductRecord]) -> Result<(), StageError> {
        for record in batch {
            let stamped = codec::stamp_freshness(record);
            let line = codec::encode_line(&stamped)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.rows += 1;
        }
        self.batches += 1;
        debug!(rows = batch.len(), total = self.rows, "batch spooled");
        Ok(())
    }

    /// Finalizes the artifact and hands its path to the backend, which
    /// streams it into `staging` under a truncate disposition; waits for
    /// the backend job to finish. The artifact is never read back into
    /// memory here, so peak memory stays bounded by one batch.
    pub async fn finish(
        mut self,
        backend: &dyn WarehouseBackend,
        staging: &TableRef,
    ) -> Result<WriteSummary, StageError> {
        self.writer.flush().await?;
        drop(self.writer);

        let job = backend.load_rows(staging, &self.path).await?;

        for row_error in &job.row_errors {
            warn!(
                index = row_error.index,
                message = %row_error.message,
                "staging row rejected by backend"
            );
        }

        // Every staged row must be accounted for as either appended or a
        // row error; anything else is the backend silently dropping rows.
        let accounted = job.rows_appended + job.row_errors.len() as u64;
        if accounted != self.rows {
            warn!(
                staged = self.rows,
                appended = job.rows_appended,
                row_errors = job.row_errors.len(),
                "backend row accounting does not match staged rows"
            );
        }

        Ok(WriteSummary {
            rows: self.rows,
            batches: self.batches,
            rows_dropped: job.row_errors.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::memory::MemoryBackend;
    use crate::port::{BackendError, WriteJob};
    use crate::sql::Statement;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    /// Backend stub that records the artifact path it was handed and
    /// reports whatever job outcome the test dictates.
    struct RecordingBackend {
        reported: WriteJob,
        seen_source: Mutex<Option<PathBuf>>,
    }

    impl RecordingBackend {
        fn reporting(reported: WriteJob) -> Self {
            Self {
                reported,
                seen_source: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl WarehouseBackend for RecordingBackend {
        async fn load_rows(
            &self,
            _table: &TableRef,
            source: &Path,
        ) -> Result<WriteJob, BackendError> {
            *self.seen_source.lock().unwrap() = Some(source.to_path_buf());
            Ok(self.reported.clone())
        }

        async fn execute(&self, _statement: &Statement) -> Result<(), BackendError> {
            Ok(())
        }

        async fn read_all(
            &self,
            _table: &TableRef,
        ) -> Result<Vec<codec::StorageRow>, BackendError> {
            Ok(Vec::new())
        }
    }

    fn make_record(id: &str) -> ProductRecord {
        ProductRecord {
            long_article_id: id.to_string(),
            title: format!("product {id}"),
            ..ProductRecord::default()
        }
    }

    #[tokio::test]
    async fn spools_and_streams_batches_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let spool = dir.path().join("export.ndjson");
        let backend = MemoryBackend::new();
        let staging = TableRef::new("shop", "staging").unwrap();

        let mut writer = StagingWriter::create(&spool).await.unwrap();
        writer
            .append_batch(&[make_record("1"), make_record("2")])
            .await
            .unwrap();
        writer.append_batch(&[make_record("3")]).await.unwrap();
        let summary = writer.finish(&backend, &staging).await.unwrap();

        assert_eq!(summary.rows, 3);
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.rows_dropped, 0);

        let rows = backend.rows(&staging);
        assert_eq!(rows.len(), 3);
        assert_eq!(codec::column_text(&rows[0], "longArticleId"), "1");
        assert_eq!(codec::column_text(&rows[2], "longArticleId"), "3");
        // Every staged row carries a freshly stamped timestamp.
        assert!(!codec::column_text(&rows[0], "modified").is_empty());
    }

    #[tokio::test]
    async fn row_errors_are_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let spool = dir.path().join("export.ndjson");
        let backend = MemoryBackend::new();
        backend.drop_rows_with_key("2");
        let staging = TableRef::new("shop", "staging").unwrap();

        let mut writer = StagingWriter::create(&spool).await.unwrap();
        writer
            .append_batch(&[make_record("1"), make_record("2"), make_record("3")])
            .await
            .unwrap();
        let summary = writer.finish(&backend, &staging).await.unwrap();

        assert_eq!(summary.rows, 3);
        assert_eq!(summary.rows_dropped, 1);
        assert_eq!(backend.rows(&staging).len(), 2);
    }

    #[tokio::test]
    async fn backend_receives_the_spool_path_not_a_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let spool = dir.path().join("export.ndjson");
        let backend = RecordingBackend::reporting(WriteJob {
            rows_appended: 3,
            row_errors: Vec::new(),
        });
        let staging = TableRef::new("shop", "staging").unwrap();

        let mut writer = StagingWriter::create(&spool).await.unwrap();
        writer
            .append_batch(&[make_record("1"), make_record("2"), make_record("3")])
            .await
            .unwrap();
        let summary = writer.finish(&backend, &staging).await.unwrap();

        assert_eq!(summary.rows, 3);
        // The writer hands over the artifact path; the backend streams it
        // from disk rather than receiving an in-memory payload.
        assert_eq!(backend.seen_source.lock().unwrap().as_deref(), Some(spool.as_path()));
        let text = std::fs::read_to_string(&spool).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[tokio::test]
    #[traced_test]
    async fn mismatched_row_accounting_is_warned_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let spool = dir.path().join("export.ndjson");
        // Backend claims one appended row for three staged, with no row
        // errors to explain the gap.
        let backend = RecordingBackend::reporting(WriteJob {
            rows_appended: 1,
            row_errors: Vec::new(),
        });
        let staging = TableRef::new("shop", "staging").unwrap();

        let mut writer = StagingWriter::create(&spool).await.unwrap();
        writer
            .append_batch(&[make_record("1"), make_record("2"), make_record("3")])
            .await
            .unwrap();
        let summary = writer.finish(&backend, &staging).await.unwrap();

        assert_eq!(summary.rows, 3);
        assert_eq!(summary.rows_dropped, 0);
        assert!(logs_contain(
            "backend row accounting does not match staged rows"
        ));
    }

    #[tokio::test]
    async fn unopenable_spool_path_is_an_io_error() {
        let result = StagingWriter::create(Path::new("/nonexistent/dir/export.ndjson")).await;
        assert!(matches!(result, Err(StageError::Io(_))));
    }
}
