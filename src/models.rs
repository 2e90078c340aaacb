use crate::aid::{self, MalformedIdentifier};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::fmt;

// ===== Source Records =====

/// Visibility of a note as stored in the `note.visibility` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Home,
    /// `followers`, `specified` and anything else; never imported.
    Other(String),
}

impl Visibility {
    pub fn as_str(&self) -> &str {
        match self {
            Visibility::Public => "public",
            Visibility::Home => "home",
            Visibility::Other(value) => value,
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, Visibility::Public | Visibility::Home)
    }
}

impl From<&str> for Visibility {
    fn from(value: &str) -> Self {
        match value {
            "public" => Visibility::Public,
            "home" => Visibility::Home,
            other => Visibility::Other(other.to_string()),
        }
    }
}

/// Raw row shape returned by the note scan query.
#[derive(Debug, Clone, FromRow)]
pub struct NoteRow {
    pub id: String,
    pub user_host: Option<String>,
    pub channel_id: Option<String>,
    pub cw: Option<String>,
    pub text: Option<String>,
    pub tags: Vec<String>,
    pub visibility: String,
}

/// A note read from the source database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub id: String,
    pub user_host: Option<String>,
    pub channel_id: Option<String>,
    pub cw: Option<String>,
    pub text: Option<String>,
    pub tags: Vec<String>,
    pub visibility: Visibility,
}

impl NoteRecord {
    /// Whether this note belongs in the index for the given scope.
    pub fn qualifies(&self, scope: &ScopeFilter) -> bool {
        self.visibility.is_indexed()
            && (self.text.is_some() || self.cw.is_some())
            && scope.admits_host(self.user_host.as_deref())
    }
}

impl From<NoteRow> for NoteRecord {
    fn from(row: NoteRow) -> Self {
        Self {
            visibility: Visibility::from(row.visibility.as_str()),
            id: row.id,
            user_host: row.user_host,
            channel_id: row.channel_id,
            cw: row.cw,
            text: row.text,
            tags: row.tags,
        }
    }
}

// ===== Scan Control =====

/// Host-based restriction on which notes are imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    /// Notes from every host.
    All,
    /// Notes authored on this instance (`userHost IS NULL`).
    LocalOnly,
    /// Notes whose remote host is one of the listed hosts.
    HostAllowlist(BTreeSet<String>),
}

impl ScopeFilter {
    pub fn admits_host(&self, host: Option<&str>) -> bool {
        match self {
            ScopeFilter::All => true,
            ScopeFilter::LocalOnly => host.is_none(),
            ScopeFilter::HostAllowlist(hosts) => host.is_some_and(|host| hosts.contains(host)),
        }
    }
}

impl fmt::Display for ScopeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeFilter::All => f.write_str("global"),
            ScopeFilter::LocalOnly => f.write_str("local"),
            ScopeFilter::HostAllowlist(hosts) => {
                let joined = hosts.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
                write!(f, "hosts [{joined}]")
            }
        }
    }
}

/// Resume boundary of the descending scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImportCursor {
    /// Nothing imported yet; scan from the newest note.
    #[default]
    Start,
    /// Resume with notes strictly older than this id.
    Before(String),
}

impl ImportCursor {
    pub fn from_resume_id(id: Option<String>) -> Self {
        match id {
            Some(id) => ImportCursor::Before(id),
            None => ImportCursor::Start,
        }
    }

    pub fn as_id(&self) -> Option<&str> {
        match self {
            ImportCursor::Start => None,
            ImportCursor::Before(id) => Some(id),
        }
    }

    /// Whether a note id lies strictly before this cursor.
    pub fn admits(&self, id: &str) -> bool {
        self.as_id().is_none_or(|cursor| id < cursor)
    }
}

impl fmt::Display for ImportCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportCursor::Start => f.write_str("(all)"),
            ImportCursor::Before(id) => f.write_str(id),
        }
    }
}

/// One chunk of notes, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    records: Vec<NoteRecord>,
}

impl Batch {
    pub fn new(records: Vec<NoteRecord>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[NoteRecord] {
        &self.records
    }

    /// Oldest id in the batch; the next cursor after a successful write.
    pub fn min_id(&self) -> Option<&str> {
        self.records.last().map(|record| record.id.as_str())
    }

    pub fn max_id(&self) -> Option<&str> {
        self.records.first().map(|record| record.id.as_str())
    }
}

// ===== Index Documents =====

/// Representation of a note document stored in Meilisearch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDocument {
    pub id: String,
    pub created_at: i64,
    pub user_host: Option<String>,
    pub channel_id: Option<String>,
    pub cw: Option<String>,
    pub text: Option<String>,
    pub tags: Vec<String>,
}

impl NoteDocument {
    pub fn project(record: &NoteRecord) -> Result<Self, MalformedIdentifier> {
        Ok(Self {
            id: record.id.clone(),
            created_at: aid::decode(&record.id)?,
            user_host: record.user_host.clone(),
            channel_id: record.channel_id.clone(),
            cw: record.cw.clone(),
            text: record.text.clone(),
            tags: record.tags.clone(),
        })
    }
}
