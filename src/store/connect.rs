use crate::config::{DbSettings, ImporterTuning};
use log::LevelFilter;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};

pub fn connect_options(settings: &DbSettings) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.user)
        .database(&settings.database)
        .application_name("note-importer");

    if let Some(password) = settings.password.as_deref() {
        options = options.password(password);
    }

    options.log_statements(LevelFilter::Debug)
}

/// Open the pool used for the scan. One connection by default: the import never issues
/// concurrent queries.
pub async fn connect(
    settings: &DbSettings,
    tuning: &ImporterTuning,
) -> Result<PgPool, sqlx::Error> {
    log::info!(
        "connecting to postgres {}:{}/{} as {}",
        settings.host,
        settings.port,
        settings.database,
        settings.user
    );

    let pool = PgPoolOptions::new()
        .max_connections(tuning.db_max_connections)
        .acquire_timeout(tuning.db_connect_timeout)
        .connect_with(connect_options(settings))
        .await?;

    Ok(pool)
}
