//! Progress events emitted by the driver and the log-based renderer.

use crate::models::ImportCursor;
use log::info;

/// Cursor label shown once the scan is exhausted.
pub const DONE_LABEL: &str = "(done)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Counting finished; `total` sizes the progress output.
    Started { total: u64, cursor: ImportCursor },
    /// A batch was written; `cursor` is the id to resume from.
    BatchCommitted {
        imported: u64,
        total: u64,
        batch_len: usize,
        cursor: String,
    },
    /// The scan returned an empty batch.
    Finished { imported: u64, total: u64 },
}

impl ProgressEvent {
    pub fn cursor_label(&self) -> String {
        match self {
            ProgressEvent::Started { cursor, .. } => cursor.to_string(),
            ProgressEvent::BatchCommitted { cursor, .. } => cursor.clone(),
            ProgressEvent::Finished { .. } => DONE_LABEL.to_string(),
        }
    }
}

/// Consumer of progress events.
pub trait ProgressReporter {
    fn report(&mut self, event: &ProgressEvent);
}

impl<P: ProgressReporter + ?Sized> ProgressReporter for &mut P {
    fn report(&mut self, event: &ProgressEvent) {
        (**self).report(event);
    }
}

/// Writes one `Importing | ...` line per event through the `log` facade.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&mut self, event: &ProgressEvent) {
        info!("{}", render_line(event));
    }
}

pub fn render_line(event: &ProgressEvent) -> String {
    let (value, total) = match *event {
        ProgressEvent::Started { total, .. } => (0, total),
        ProgressEvent::BatchCommitted {
            imported, total, ..
        } => (imported, total),
        ProgressEvent::Finished { total, imported } => (total.max(imported), total.max(imported)),
    };

    format!(
        "Importing | {:>3}% | {}/{} notes | {}",
        percentage(value, total),
        value,
        total,
        event.cursor_label()
    )
}

fn percentage(value: u64, total: u64) -> u64 {
    if total == 0 {
        return if value == 0 { 0 } else { 100 };
    }
    (value.saturating_mul(100) / total).min(100)
}
