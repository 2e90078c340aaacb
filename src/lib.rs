pub mod aid;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod store;
pub mod test_support;

use crate::config::{ConfigError, ImporterTuning, MisskeyConfig};
use crate::error::ImportError;
use crate::models::ImportCursor;
use crate::pipeline::{ImportContext, ImportSummary, LogProgress, PipelineDriver};
use crate::search::MeiliClient;
use crate::store::PgNoteScanner;
use env_logger::Env;
use std::path::PathBuf;
use std::sync::Once;

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info,sqlx=warn"))
            .format_timestamp(None)
            .init();
    });
}

/// Inputs of one import run, as given on the command line.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub config_path: PathBuf,
    pub resume_id: Option<String>,
    pub batch_size: usize,
}

/// Load the configuration, connect both ends and import every qualifying note.
///
/// Configuration problems are reported before any connection is attempted.
pub async fn run(options: ImportOptions) -> Result<ImportSummary, ImportError> {
    let settings = MisskeyConfig::load(&options.config_path)?.resolve()?;
    let start = resume_cursor(options.resume_id)?;
    let tuning = ImporterTuning::from_env();

    log::info!(
        "importing notes into {} (index '{}', scope {})",
        settings.index.base_url(),
        settings.index.notes_index_uid(),
        settings.scope
    );

    let pool = store::connect(&settings.db, &tuning)
        .await
        .map_err(ImportError::StoreConnection)?;

    let index = MeiliClient::new(&settings.index, &tuning).map_err(ImportError::IndexConnection)?;
    index
        .healthcheck()
        .await
        .map_err(ImportError::IndexConnection)?;
    index
        .ensure_index()
        .await
        .map_err(ImportError::IndexConnection)?;

    let context = ImportContext::new(
        PgNoteScanner::new(pool),
        index,
        settings.scope,
        start,
        options.batch_size,
    );

    let mut progress = LogProgress;
    let outcome = PipelineDriver::new(&context).run(&mut progress).await;
    context.source.pool().close().await;
    outcome
}

/// Validate the `--id` override; it must be a decodable aid.
pub fn resume_cursor(resume_id: Option<String>) -> Result<ImportCursor, ConfigError> {
    let resume_id = resume_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    if let Some(id) = resume_id.as_deref() {
        aid::decode(id)?;
    }
    Ok(ImportCursor::from_resume_id(resume_id))
}
