use crate::models::{Batch, ImportCursor, NoteRecord, NoteRow, ScopeFilter};
use crate::store::NoteSource;
use async_trait::async_trait;
use log::debug;
use sqlx::{PgPool, Postgres, QueryBuilder};

const COUNT_SELECT: &str = "SELECT count(*) FROM note";

const NOTE_SELECT: &str = r#"SELECT id, "userHost" AS user_host, "channelId" AS channel_id, cw, text, tags::text[] AS tags, visibility::text AS visibility FROM note"#;

/// Notes worth indexing: searchable visibility and some text to search.
const QUALIFYING_NOTES: &str =
    " WHERE (text IS NOT NULL OR cw IS NOT NULL) AND visibility IN ('home', 'public')";

/// Descending, cursor-bounded scan over the `note` table.
#[derive(Clone)]
pub struct PgNoteScanner {
    pool: PgPool,
}

impl PgNoteScanner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl NoteSource for PgNoteScanner {
    async fn count(
        &self,
        scope: &ScopeFilter,
        cursor: &ImportCursor,
    ) -> Result<u64, sqlx::Error> {
        let mut query = count_query(scope, cursor);
        let total = query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn next_batch(
        &self,
        scope: &ScopeFilter,
        cursor: &ImportCursor,
        limit: usize,
    ) -> Result<Batch, sqlx::Error> {
        let mut query = batch_query(scope, cursor, limit);
        let rows: Vec<NoteRow> = query
            .build_query_as::<NoteRow>()
            .fetch_all(&self.pool)
            .await?;

        debug!(
            "note scan: {} rows before {} (limit {})",
            rows.len(),
            cursor,
            limit
        );

        Ok(Batch::new(rows.into_iter().map(NoteRecord::from).collect()))
    }
}

pub(crate) fn count_query(
    scope: &ScopeFilter,
    cursor: &ImportCursor,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(COUNT_SELECT);
    push_qualifying(&mut builder, scope, cursor);
    builder
}

pub(crate) fn batch_query(
    scope: &ScopeFilter,
    cursor: &ImportCursor,
    limit: usize,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(NOTE_SELECT);
    push_qualifying(&mut builder, scope, cursor);
    builder
        .push(" ORDER BY id DESC LIMIT ")
        .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    builder
}

fn push_qualifying(
    builder: &mut QueryBuilder<'static, Postgres>,
    scope: &ScopeFilter,
    cursor: &ImportCursor,
) {
    builder.push(QUALIFYING_NOTES);
    push_scope(builder, scope);
    if let Some(id) = cursor.as_id() {
        builder.push(" AND id < ").push_bind(id.to_string());
    }
}

/// Translate the scope into a predicate on `"userHost"`.
fn push_scope(builder: &mut QueryBuilder<'static, Postgres>, scope: &ScopeFilter) {
    match scope {
        ScopeFilter::All => {}
        ScopeFilter::LocalOnly => {
            builder.push(r#" AND "userHost" IS NULL"#);
        }
        ScopeFilter::HostAllowlist(hosts) => {
            let hosts: Vec<String> = hosts.iter().cloned().collect();
            builder
                .push(r#" AND "userHost" = ANY("#)
                .push_bind(hosts)
                .push(")");
        }
    }
}
