//! Helpers shared by the unit and integration tests.

pub mod database;
pub mod memory;

pub use database::{TestDatabase, TestDatabaseError};
pub use memory::{MemoryIndex, MemoryNoteStore, RecordingProgress, sample_note};
