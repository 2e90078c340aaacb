//! In-memory stand-ins for the note table and the search index.

use crate::models::{Batch, ImportCursor, NoteDocument, NoteRecord, ScopeFilter, Visibility};
use crate::pipeline::{ProgressEvent, ProgressReporter};
use crate::search::{DocumentSink, IndexError};
use crate::store::NoteSource;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Public note with body text, authored on `host`.
pub fn sample_note(id: &str, host: Option<&str>) -> NoteRecord {
    NoteRecord {
        id: id.to_string(),
        user_host: host.map(str::to_string),
        channel_id: None,
        cw: None,
        text: Some(format!("note {id}")),
        tags: Vec::new(),
        visibility: Visibility::Public,
    }
}

/// Note table held in memory. Applies the same qualification and ordering as the SQL scan.
#[derive(Default)]
pub struct MemoryNoteStore {
    notes: Vec<NoteRecord>,
    fail_count: bool,
    fail_on_batch_call: Option<usize>,
    batch_calls: Mutex<Vec<ImportCursor>>,
}

impl MemoryNoteStore {
    pub fn new(notes: Vec<NoteRecord>) -> Self {
        Self {
            notes,
            ..Self::default()
        }
    }

    /// Make `count` fail.
    pub fn failing_count(mut self) -> Self {
        self.fail_count = true;
        self
    }

    /// Make the `call`-th `next_batch` (zero based) fail.
    pub fn failing_on_batch(mut self, call: usize) -> Self {
        self.fail_on_batch_call = Some(call);
        self
    }

    /// Cursors passed to `next_batch`, in call order.
    pub fn batch_calls(&self) -> Vec<ImportCursor> {
        self.batch_calls.lock().clone()
    }

    /// Ids of every qualifying note, newest first.
    pub fn descending_scan(&self, scope: &ScopeFilter) -> Vec<String> {
        self.select(scope, &ImportCursor::Start, usize::MAX)
            .into_iter()
            .map(|note| note.id)
            .collect()
    }

    fn select(
        &self,
        scope: &ScopeFilter,
        cursor: &ImportCursor,
        limit: usize,
    ) -> Vec<NoteRecord> {
        let mut selected: Vec<NoteRecord> = self
            .notes
            .iter()
            .filter(|note| note.qualifies(scope) && cursor.admits(&note.id))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.id.cmp(&a.id));
        selected.truncate(limit);
        selected
    }
}

#[async_trait]
impl NoteSource for MemoryNoteStore {
    async fn count(
        &self,
        scope: &ScopeFilter,
        cursor: &ImportCursor,
    ) -> Result<u64, sqlx::Error> {
        if self.fail_count {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(self.select(scope, cursor, usize::MAX).len() as u64)
    }

    async fn next_batch(
        &self,
        scope: &ScopeFilter,
        cursor: &ImportCursor,
        limit: usize,
    ) -> Result<Batch, sqlx::Error> {
        let call = {
            let mut calls = self.batch_calls.lock();
            calls.push(cursor.clone());
            calls.len() - 1
        };

        if self.fail_on_batch_call == Some(call) {
            return Err(sqlx::Error::Protocol(format!(
                "injected failure on batch call {call}"
            )));
        }

        Ok(Batch::new(self.select(scope, cursor, limit)))
    }
}

/// Search index held in memory, keyed by document id.
#[derive(Default)]
pub struct MemoryIndex {
    documents: Mutex<BTreeMap<String, NoteDocument>>,
    writes: Mutex<Vec<Vec<String>>>,
    fail_on_write: Option<usize>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `write`-th upsert (zero based) fail without storing anything.
    pub fn failing_on_write(mut self, write: usize) -> Self {
        self.fail_on_write = Some(write);
        self
    }

    pub fn documents(&self) -> BTreeMap<String, NoteDocument> {
        self.documents.lock().clone()
    }

    pub fn document(&self, id: &str) -> Option<NoteDocument> {
        self.documents.lock().get(id).cloned()
    }

    /// Ids of every accepted upsert, in call order.
    pub fn writes(&self) -> Vec<Vec<String>> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl DocumentSink for MemoryIndex {
    async fn upsert(&self, documents: &[NoteDocument]) -> Result<(), IndexError> {
        let mut writes = self.writes.lock();
        if self.fail_on_write == Some(writes.len()) {
            return Err(IndexError::TaskFailed {
                task_uid: writes.len() as u64,
                message: "injected write failure".to_string(),
            });
        }

        let mut stored = self.documents.lock();
        for document in documents {
            stored.insert(document.id.clone(), document.clone());
        }
        writes.push(documents.iter().map(|doc| doc.id.clone()).collect());
        Ok(())
    }
}

/// Keeps every progress event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub events: Vec<ProgressEvent>,
}

impl RecordingProgress {
    pub fn cursor_labels(&self) -> Vec<String> {
        self.events.iter().map(ProgressEvent::cursor_label).collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&mut self, event: &ProgressEvent) {
        self.events.push(event.clone());
    }
}
