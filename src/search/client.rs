use crate::config::{ImporterTuning, IndexSettings};
use crate::models::NoteDocument;
use crate::search::DocumentSink;
use crate::search::error::IndexError;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant, sleep};

const PRIMARY_KEY: &str = "id";

/// Task error code Meilisearch reports when the index was created in the meantime.
const INDEX_ALREADY_EXISTS: &str = "index_already_exists";

/// Minimal Meilisearch client scoped to the notes index.
#[derive(Clone)]
pub struct MeiliClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    index_uid: String,
    task_poll_interval: Duration,
    task_stall_warning: Duration,
    upsert_chunk_size: usize,
}

impl MeiliClient {
    pub fn new(settings: &IndexSettings, tuning: &ImporterTuning) -> Result<Self, IndexError> {
        Self::with_base_url(
            settings.base_url(),
            settings.api_key.clone(),
            settings.notes_index_uid(),
            tuning,
        )
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: Option<String>,
        index_uid: impl Into<String>,
        tuning: &ImporterTuning,
    ) -> Result<Self, IndexError> {
        let http = Client::builder()
            .timeout(tuning.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("note-importer/0.1")
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            index_uid: index_uid.into(),
            task_poll_interval: tuning.task_poll_interval,
            task_stall_warning: tuning.task_stall_warning,
            upsert_chunk_size: tuning.upsert_chunk_size.max(1),
        })
    }

    pub fn index_uid(&self) -> &str {
        &self.index_uid
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the service answers at all; `/health` needs no key.
    pub async fn healthcheck(&self) -> Result<(), IndexError> {
        self.send(Method::GET, "/health").await?;
        Ok(())
    }

    /// Create the notes index with `id` as primary key unless it already exists.
    pub async fn ensure_index(&self) -> Result<(), IndexError> {
        if self.index_exists(&self.index_uid).await? {
            debug!("meilisearch ensure_index: index '{}' exists", self.index_uid);
            return Ok(());
        }

        info!(
            "meilisearch ensure_index: creating index '{}' (primary key '{}')",
            self.index_uid, PRIMARY_KEY
        );

        let payload = CreateIndexRequest {
            uid: self.index_uid.clone(),
            primary_key: PRIMARY_KEY.to_string(),
        };

        let response = self
            .request(Method::POST, "/indexes")
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Ok(()),
            status if status.is_success() => {
                let task: TaskInfo = response.json().await?;
                self.wait_for_task(task.task_uid, Some(INDEX_ALREADY_EXISTS)).await
            }
            status => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "failed to read error body".to_string());
                Err(IndexError::status(status, body))
            }
        }
    }

    /// Add or replace documents, keyed by `id`, and wait until Meilisearch applied them.
    pub async fn upsert_notes(&self, documents: &[NoteDocument]) -> Result<(), IndexError> {
        if documents.is_empty() {
            return Ok(());
        }

        let path = format!(
            "/indexes/{}/documents?primaryKey={}",
            self.index_uid, PRIMARY_KEY
        );

        for (chunk_index, chunk) in documents.chunks(self.upsert_chunk_size).enumerate() {
            debug!(
                "meilisearch upsert_notes: submitting chunk #{} ({} documents)",
                chunk_index + 1,
                chunk.len()
            );
            let task = self.submit_task(Method::POST, &path, chunk).await?;
            self.wait_for_task(task, None).await?;
        }

        Ok(())
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url_for(path);
        let builder = self.http.request(method, url);
        self.apply_auth(builder)
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, method: Method, path: &str) -> Result<reqwest::Response, IndexError> {
        let response = self.request(method, path).send().await?;
        ensure_success(response).await
    }

    async fn submit_task<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<u64, IndexError> {
        debug!("meilisearch submit_task: {method} {path}");
        let response = self.request(method, path).json(payload).send().await?;
        let response = ensure_success(response).await?;
        let task: TaskInfo = response.json().await?;
        Ok(task.task_uid)
    }

    async fn index_exists(&self, index_uid: &str) -> Result<bool, IndexError> {
        let response = self
            .request(Method::GET, &format!("/indexes/{}", index_uid))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "failed to read error body".to_string());
                Err(IndexError::status(other, body))
            }
        }
    }

    /// Poll a task until it leaves the queue. A failure whose error code equals
    /// `tolerated_code` counts as success.
    async fn wait_for_task(
        &self,
        task_uid: u64,
        tolerated_code: Option<&str>,
    ) -> Result<(), IndexError> {
        let started = Instant::now();
        let mut next_warning = self.task_stall_warning;

        loop {
            let response = self
                .send(Method::GET, &format!("/tasks/{}", task_uid))
                .await?;
            let status: TaskStatus = response.json().await?;

            match status.status.as_str() {
                "succeeded" => {
                    debug!(
                        "meilisearch wait_for_task: task {task_uid} succeeded after {:?}",
                        started.elapsed()
                    );
                    return Ok(());
                }
                "failed" | "canceled" => {
                    let error = status.error.unwrap_or_default();
                    if tolerated_code.is_some() && error.code.as_deref() == tolerated_code {
                        debug!("meilisearch wait_for_task: task {task_uid} ignored ({error:?})");
                        return Ok(());
                    }
                    let message = error
                        .message
                        .unwrap_or_else(|| format!("task {}", status.status));
                    return Err(IndexError::TaskFailed { task_uid, message });
                }
                "enqueued" | "processing" => {
                    let elapsed = started.elapsed();
                    if elapsed >= next_warning {
                        warn!(
                            "meilisearch wait_for_task: task {task_uid} still {} after {:?}; \
                             the task queue is backlogged, still waiting",
                            status.status, elapsed
                        );
                        next_warning += self.task_stall_warning.max(self.task_poll_interval);
                    }
                    sleep(self.task_poll_interval).await;
                }
                other => {
                    return Err(IndexError::UnexpectedTaskStatus {
                        task_uid,
                        status: other.to_string(),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl DocumentSink for MeiliClient {
    async fn upsert(&self, documents: &[NoteDocument]) -> Result<(), IndexError> {
        self.upsert_notes(documents).await
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, IndexError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "failed to read error body".to_string());
    Err(IndexError::status(status, body))
}

#[derive(Deserialize)]
struct TaskInfo {
    #[serde(rename = "taskUid")]
    task_uid: u64,
}

#[derive(Deserialize)]
struct TaskStatus {
    status: String,
    error: Option<TaskError>,
}

#[derive(Debug, Deserialize, Default)]
struct TaskError {
    message: Option<String>,
    code: Option<String>,
}

#[derive(Serialize)]
struct CreateIndexRequest {
    uid: String,
    #[serde(rename = "primaryKey")]
    primary_key: String,
}
