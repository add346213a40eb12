//! In-memory warehouse backend.
//!
//! Interprets staged NDJSON artifacts and merge/truncate statements against
//! plain row vectors. Used by the test suite and for dry runs; supports
//! injecting one-shot failures and simulated row-level ingest errors.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::codec::{self, StorageRow};
use crate::port::{BackendError, RowError, WarehouseBackend, WriteJob};
use crate::sql::{Statement, TableRef};

#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Vec<StorageRow>>>,
    load_fault: Mutex<Option<BackendError>>,
    /// Countdown to a failing `execute` call: `(calls_left, fault)`.
    statement_fault: Mutex<Option<(usize, BackendError)>>,
    /// Keys whose rows the backend "fails" to ingest, reported as row errors.
    drop_keys: Mutex<HashSet<String>>,
    /// Artificial latency on load, for exercising overlapping runs.
    load_delay: Mutex<Option<Duration>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_key(table: &TableRef) -> String {
        table.to_string()
    }

    /// Current contents of `table` (empty if it was never written).
    pub fn rows(&self, table: &TableRef) -> Vec<StorageRow> {
        self.tables
            .lock()
            .unwrap()
            .get(&Self::table_key(table))
            .cloned()
            .unwrap_or_default()
    }

    pub fn seed(&self, table: &TableRef, rows: Vec<StorageRow>) {
        self.tables
            .lock()
            .unwrap()
            .insert(Self::table_key(table), rows);
    }

    /// The next `load_rows` call fails with `fault`.
    pub fn fail_next_load(&self, fault: BackendError) {
        *self.load_fault.lock().unwrap() = Some(fault);
    }

    /// The next `execute` call fails with `fault`.
    pub fn fail_next_statement(&self, fault: BackendError) {
        self.fail_statement_nth(1, fault);
    }

    /// The `nth` `execute` call from now (1-based) fails with `fault`.
    /// Lets tests target a specific stage: within one run, statement 1 is
    /// the defensive pre-clean, 2 the merge, 3 the final cleanup.
    pub fn fail_statement_nth(&self, nth: usize, fault: BackendError) {
        *self.statement_fault.lock().unwrap() = Some((nth, fault));
    }

    /// Rows whose merge key equals `key` are dropped on load and reported
    /// as row-level errors.
    pub fn drop_rows_with_key(&self, key: &str) {
        self.drop_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl WarehouseBackend for MemoryBackend {
    async fn load_rows(&self, table: &TableRef, source: &Path) -> Result<WriteJob, BackendError> {
        let delay = *self.load_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(fault) = self.load_fault.lock().unwrap().take() {
            return Err(fault);
        }

        let file = File::open(source).await.map_err(|e| {
            BackendError::Transport(format!("cannot read staged artifact: {e}"))
        })?;

        // One line at a time; the artifact is never buffered whole.
        let drop_keys = self.drop_keys.lock().unwrap().clone();
        let mut lines = BufReader::new(file).lines();
        let mut rows = Vec::new();
        let mut row_errors = Vec::new();
        let mut index = 0;
        while let Some(line) = lines.next_line().await.map_err(|e| {
            BackendError::Transport(format!("cannot read staged artifact: {e}"))
        })? {
            if line.is_empty() {
                continue;
            }
            let row: StorageRow = serde_json::from_str(&line)
                .map_err(|e| BackendError::Rejected(format!("malformed row {index}: {e}")))?;
            if drop_keys.contains(&codec::column_text(&row, codec::KEY_COLUMN)) {
                row_errors.push(RowError {
                    index,
                    message: "row failed backend validation".to_string(),
                });
            } else {
                rows.push(row);
            }
            index += 1;
        }

        let rows_appended = rows.len() as u64;
        // Truncate-write: replace whatever the table held before.
        self.tables
            .lock()
            .unwrap()
            .insert(Self::table_key(table), rows);

        Ok(WriteJob {
            rows_appended,
            row_errors,
        })
    }

    async fn execute(&self, statement: &Statement) -> Result<(), BackendError> {
        {
            let mut fault = self.statement_fault.lock().unwrap();
            if let Some((calls_left, err)) = fault.take() {
                if calls_left <= 1 {
                    return Err(err);
                }
                *fault = Some((calls_left - 1, err));
            }
        }

        let mut tables = self.tables.lock().unwrap();
        match statement {
            Statement::Merge(merge) => {
                let staging = tables
                    .get(&Self::table_key(&merge.staging))
                    .cloned()
                    .unwrap_or_default();
                let target = tables.entry(Self::table_key(&merge.target)).or_default();

                for row in staging {
                    let key = codec::column_text(&row, merge.key);
                    match target
                        .iter_mut()
                        .find(|t| codec::column_text(t, merge.key) == key)
                    {
                        Some(existing) => *existing = row,
                        None => target.push(row),
                    }
                }
            }
            Statement::Truncate(truncate) => {
                tables.insert(Self::table_key(&truncate.table), Vec::new());
            }
        }
        Ok(())
    }

    async fn read_all(&self, table: &TableRef) -> Result<Vec<StorageRow>, BackendError> {
        Ok(self.rows(table))
    }
}
