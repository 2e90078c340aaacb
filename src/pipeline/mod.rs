//! Import pipeline: the run context, the state-machine driver and progress reporting.
//!
//! 1. **Counting** sizes the progress output (`store::NoteSource::count`)
//! 2. **Importing** repeatedly fetches the next batch before the cursor, projects it into
//!    index documents and upserts them (`search::DocumentSink`)
//! 3. **Done** is reached on the first empty batch; any error ends in **Failed**
//!
//! The cursor lives only in memory. A rerun with the last reported cursor resumes the scan.

pub mod driver;
pub mod progress;

pub use driver::{ImportSummary, PipelineDriver, PipelineState};
pub use progress::{DONE_LABEL, LogProgress, ProgressEvent, ProgressReporter};

use crate::models::{ImportCursor, ScopeFilter};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Resources and parameters owned by one import run.
pub struct ImportContext<S, W> {
    pub source: S,
    pub sink: W,
    pub scope: ScopeFilter,
    pub start: ImportCursor,
    pub batch_size: usize,
}

impl<S, W> ImportContext<S, W> {
    pub fn new(
        source: S,
        sink: W,
        scope: ScopeFilter,
        start: ImportCursor,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            sink,
            scope,
            start,
            batch_size: batch_size.max(1),
        }
    }
}
