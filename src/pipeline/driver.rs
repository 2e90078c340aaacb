use crate::aid;
use crate::error::ImportError;
use crate::models::{ImportCursor, NoteDocument};
use crate::pipeline::ImportContext;
use crate::pipeline::progress::{ProgressEvent, ProgressReporter};
use crate::search::DocumentSink;
use crate::store::NoteSource;
use log::{debug, error, info, warn};

/// Lifecycle of one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Counting,
    Importing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: u64,
    pub total: u64,
    pub batches: u64,
}

/// Drives the scan → project → upsert loop over an [`ImportContext`].
///
/// The cursor only moves after a batch has been written, so a run interrupted at any point
/// can be restarted from the last reported cursor without gaps.
pub struct PipelineDriver<'ctx, S, W> {
    context: &'ctx ImportContext<S, W>,
    state: PipelineState,
    cursor: ImportCursor,
    imported: u64,
    total: u64,
    batches: u64,
}

impl<'ctx, S, W> PipelineDriver<'ctx, S, W>
where
    S: NoteSource,
    W: DocumentSink,
{
    pub fn new(context: &'ctx ImportContext<S, W>) -> Self {
        Self {
            context,
            state: PipelineState::Init,
            cursor: context.start.clone(),
            imported: 0,
            total: 0,
            batches: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Last committed resume point.
    pub fn cursor(&self) -> &ImportCursor {
        &self.cursor
    }

    pub fn imported(&self) -> u64 {
        self.imported
    }

    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            imported: self.imported,
            total: self.total,
            batches: self.batches,
        }
    }

    /// Run until `Done` or the first failure.
    pub async fn run<P>(mut self, progress: &mut P) -> Result<ImportSummary, ImportError>
    where
        P: ProgressReporter + ?Sized,
    {
        while !self.state.is_terminal() {
            self.step(progress).await?;
        }
        Ok(self.summary())
    }

    /// Perform one transition. Terminal states are left unchanged.
    pub async fn step<P>(&mut self, progress: &mut P) -> Result<PipelineState, ImportError>
    where
        P: ProgressReporter + ?Sized,
    {
        let outcome = match self.state {
            PipelineState::Init => {
                info!(
                    "starting import (scope {}, batch size {}, starting at {})",
                    self.context.scope, self.context.batch_size, self.cursor
                );
                Ok(PipelineState::Counting)
            }
            PipelineState::Counting => self.count(progress).await,
            PipelineState::Importing => self.import_batch(progress).await,
            PipelineState::Done | PipelineState::Failed => return Ok(self.state),
        };

        match outcome {
            Ok(next) => {
                self.state = next;
                Ok(next)
            }
            Err(err) => {
                error!(
                    "import failed during {:?} after {} notes: {}",
                    self.state, self.imported, err
                );
                match self.cursor.as_id() {
                    Some(id) => error!("resume with --id {}", id),
                    None => error!("no batch was committed; rerun without --id"),
                }
                self.state = PipelineState::Failed;
                Err(err)
            }
        }
    }

    async fn count<P>(&mut self, progress: &mut P) -> Result<PipelineState, ImportError>
    where
        P: ProgressReporter + ?Sized,
    {
        info!("preparing for import...");
        let total = self
            .context
            .source
            .count(&self.context.scope, &self.cursor)
            .await?;

        self.total = total;
        progress.report(&ProgressEvent::Started {
            total,
            cursor: self.cursor.clone(),
        });

        Ok(PipelineState::Importing)
    }

    async fn import_batch<P>(&mut self, progress: &mut P) -> Result<PipelineState, ImportError>
    where
        P: ProgressReporter + ?Sized,
    {
        let context = self.context;
        let batch = context
            .source
            .next_batch(&context.scope, &self.cursor, context.batch_size)
            .await?;

        let Some(oldest) = batch.min_id() else {
            info!(
                "import finished: {} notes in {} batches",
                self.imported, self.batches
            );
            progress.report(&ProgressEvent::Finished {
                imported: self.imported,
                total: self.total,
            });
            return Ok(PipelineState::Done);
        };

        let documents = batch
            .records()
            .iter()
            .map(NoteDocument::project)
            .collect::<Result<Vec<_>, _>>()?;

        let newest = batch.max_id().unwrap_or(oldest);
        debug!(
            "batch #{}: {} notes ({} .. {}), created {:?} .. {:?}",
            self.batches + 1,
            documents.len(),
            newest,
            oldest,
            aid::created_at(newest).ok(),
            aid::created_at(oldest).ok(),
        );

        context.sink.upsert(&documents).await?;

        self.cursor = ImportCursor::Before(oldest.to_string());
        self.imported += batch.len() as u64;
        self.batches += 1;

        if self.imported > self.total && self.imported - (batch.len() as u64) <= self.total {
            warn!(
                "imported more notes than counted ({} > {}); notes were added during the run",
                self.imported, self.total
            );
        }

        progress.report(&ProgressEvent::BatchCommitted {
            imported: self.imported,
            total: self.total,
            batch_len: batch.len(),
            cursor: oldest.to_string(),
        });

        Ok(PipelineState::Importing)
    }
}
