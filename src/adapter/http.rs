//! HTTP adapter for a warehouse job API.
//!
//! Both the staging load and statement execution submit a job and poll its
//! status until the backend reports a terminal state. The wait has no upper
//! bound of its own; the process (or its caller's HTTP timeout) is the only
//! limit, matching the synchronous-wait contract of the port.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::codec::StorageRow;
use crate::port::{BackendError, RowError, WarehouseBackend, WriteJob};
use crate::sql::{Statement, TableRef};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub poll_interval: Duration,
}

impl HttpBackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

#[derive(Deserialize)]
struct JobHandle {
    id: String,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum JobState {
    Pending,
    Running,
    Done,
    Failed,
    Interrupted,
}

#[derive(Deserialize)]
struct JobStatus {
    state: JobState,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    rows_appended: u64,
    #[serde(default)]
    row_errors: Vec<JobRowError>,
}

#[derive(Deserialize)]
struct JobRowError {
    index: usize,
    message: String,
}

#[derive(Deserialize)]
struct RowPage {
    rows: Vec<StorageRow>,
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_interval: config.poll_interval,
        })
    }

    /// Polls the job until the backend reports a terminal state.
    async fn wait_for(&self, job_id: &str) -> Result<JobStatus, BackendError> {
        let url = format!("{}/jobs/{job_id}", self.base_url);
        loop {
            let status: JobStatus = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(transport)?
                .error_for_status()
                .map_err(transport)?
                .json()
                .await
                .map_err(transport)?;

            match status.state {
                JobState::Done => return Ok(status),
                JobState::Failed => {
                    return Err(BackendError::Rejected(
                        status.error.unwrap_or_else(|| "job failed".to_string()),
                    ));
                }
                JobState::Interrupted => return Err(BackendError::Interrupted),
                JobState::Pending | JobState::Running => {
                    debug!(job_id, state = ?status.state, "waiting for backend job");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn submit(&self, request: reqwest::RequestBuilder) -> Result<String, BackendError> {
        let handle: JobHandle = request
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        Ok(handle.id)
    }
}

#[async_trait]
impl WarehouseBackend for HttpBackend {
    async fn load_rows(&self, table: &TableRef, source: &Path) -> Result<WriteJob, BackendError> {
        let url = format!(
            "{}/datasets/{}/tables/{}/load?disposition=truncate",
            self.base_url, table.dataset, table.table
        );

        // Chunk-stream the artifact off disk; it is never buffered whole.
        let file = tokio::fs::File::open(source).await.map_err(|e| {
            BackendError::Transport(format!("cannot read staged artifact: {e}"))
        })?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let job_id = self
            .submit(
                self.client
                    .post(&url)
                    .header("content-type", "application/x-ndjson")
                    .body(body),
            )
            .await?;
        let status = self.wait_for(&job_id).await?;

        Ok(WriteJob {
            rows_appended: status.rows_appended,
            row_errors: status
                .row_errors
                .into_iter()
                .map(|e| RowError {
                    index: e.index,
                    message: e.message,
                })
                .collect(),
        })
    }

    async fn execute(&self, statement: &Statement) -> Result<(), BackendError> {
        let url = format!("{}/queries", self.base_url);
        let job_id = self
            .submit(
                self.client
                    .post(&url)
                    .json(&serde_json::json!({ "query": statement.render() })),
            )
            .await?;
        self.wait_for(&job_id).await?;
        Ok(())
    }

    async fn read_all(&self, table: &TableRef) -> Result<Vec<StorageRow>, BackendError> {
        let url = format!(
            "{}/datasets/{}/tables/{}/rows",
            self.base_url, table.dataset, table.table
        );
        let page: RowPage = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        Ok(page.rows)
    }
}
