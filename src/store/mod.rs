//! PostgreSQL side of the import: connection setup and the cursor scan.

pub mod connect;
pub mod scanner;

pub use connect::connect;
pub use scanner::PgNoteScanner;

use crate::models::{Batch, ImportCursor, ScopeFilter};
use async_trait::async_trait;

/// Source of qualifying notes, scanned newest first.
#[async_trait]
pub trait NoteSource: Send + Sync {
    /// Number of qualifying notes strictly before `cursor`. Only sizes progress output.
    async fn count(&self, scope: &ScopeFilter, cursor: &ImportCursor) -> Result<u64, sqlx::Error>;

    /// Up to `limit` qualifying notes strictly before `cursor`, in descending id order.
    /// An empty batch means the scan is exhausted.
    async fn next_batch(
        &self,
        scope: &ScopeFilter,
        cursor: &ImportCursor,
        limit: usize,
    ) -> Result<Batch, sqlx::Error>;
}
