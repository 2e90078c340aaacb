use reqwest::StatusCode;
use thiserror::Error;

/// Errors that occur while interacting with Meilisearch.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("meilisearch HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("meilisearch service returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("meilisearch task {task_uid} failed: {message}")]
    TaskFailed { task_uid: u64, message: String },
    #[error("meilisearch task {task_uid} reported unexpected status '{status}'")]
    UnexpectedTaskStatus { task_uid: u64, status: String },
}

impl IndexError {
    pub fn status(status: StatusCode, body: String) -> Self {
        IndexError::Status { status, body }
    }

    /// HTTP status of a rejected request, if the service answered at all.
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            IndexError::Status { status, .. } => Some(*status),
            IndexError::Http(err) => err.status(),
            _ => None,
        }
    }

    /// Whether the service rejected our credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            IndexError::Status { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}
