//! Meilisearch side of the import: the notes index client and the write seam.

pub mod client;
pub mod error;

pub use client::MeiliClient;
pub use error::IndexError;

use crate::models::NoteDocument;
use async_trait::async_trait;

/// Destination of projected documents.
///
/// Writes are keyed by document id, so repeating a write leaves the index unchanged.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn upsert(&self, documents: &[NoteDocument]) -> Result<(), IndexError>;
}
