use crate::aid::MalformedIdentifier;
use crate::config::ConfigError;
use crate::search::IndexError;
use thiserror::Error;

/// Every way an import run can stop before reaching `Done`.
///
/// All of them are fatal: the run halts instead of skipping the offending note.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("failed to connect to postgres: {0}")]
    StoreConnection(#[source] sqlx::Error),
    #[error("failed to connect to meilisearch: {0}")]
    IndexConnection(#[source] IndexError),
    #[error("database query failed: {0}")]
    Store(#[from] sqlx::Error),
    #[error("malformed note id: {0}")]
    MalformedIdentifier(#[from] MalformedIdentifier),
    #[error("failed to write notes to meilisearch: {0}")]
    IndexWrite(#[from] IndexError),
}

impl ImportError {
    /// Whether the failure happened before any note could be read.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            ImportError::Configuration(_)
                | ImportError::StoreConnection(_)
                | ImportError::IndexConnection(_)
        )
    }
}
