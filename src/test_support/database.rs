use crate::models::NoteRecord;
use log::LevelFilter;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::env;
use testcontainers::{ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use thiserror::Error;
use tokio::runtime::Handle;
use uuid::Uuid;

/// Just the columns of Misskey's `note` table that the importer reads.
const NOTE_SCHEMA: &[&str] = &[
    "CREATE TYPE note_visibility_enum AS ENUM ('public', 'home', 'followers', 'specified')",
    r#"CREATE TABLE note (
        id varchar(32) PRIMARY KEY,
        "userHost" varchar(128),
        "channelId" varchar(32),
        cw varchar(512),
        text text,
        tags varchar(128)[] NOT NULL DEFAULT '{}',
        visibility note_visibility_enum NOT NULL
    )"#,
];

#[derive(Debug, Error)]
pub enum TestDatabaseError {
    #[error("TEST_DATABASE_URL not set")]
    MissingUrl,
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("container error: {0}")]
    Container(#[from] TestcontainersError),
}

/// Ephemeral database holding a `note` table, one per test.
///
/// The server comes from `TEST_DATABASE_URL`, or from a disposable Postgres container when
/// `TEST_USE_CONTAINERS=1`.
pub struct TestDatabase {
    pool: Option<PgPool>,
    admin_options: PgConnectOptions,
    database_name: String,
    container: Option<ContainerAsync<Postgres>>,
}

impl TestDatabase {
    pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
        if let Ok(url) = env::var("TEST_DATABASE_URL") {
            return Self::with_server(&url, None).await;
        }

        let use_containers = env::var("TEST_USE_CONTAINERS")
            .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if !use_containers {
            return Err(TestDatabaseError::MissingUrl);
        }

        let container = Postgres::default().start().await?;
        let host = container.get_host().await?.to_string();
        let port = container.get_host_port_ipv4(5432).await?;
        let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
        Self::with_server(&url, Some(container)).await
    }

    async fn with_server(
        url: &str,
        container: Option<ContainerAsync<Postgres>>,
    ) -> Result<Self, TestDatabaseError> {
        let base_options: PgConnectOptions = url.parse()?;
        let admin_options = base_options.log_statements(LevelFilter::Off);

        let admin_pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(admin_options.clone())
            .await?;

        let database_name = format!("note_importer_{}", Uuid::new_v4().simple());
        sqlx::query(&format!(
            "CREATE DATABASE \"{}\" TEMPLATE template0",
            database_name
        ))
        .execute(&admin_pool)
        .await?;
        admin_pool.close().await;

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_with(admin_options.clone().database(&database_name))
            .await?;

        for statement in NOTE_SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self {
            pool: Some(pool),
            admin_options,
            database_name,
            container,
        })
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref().expect("test database pool is available")
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool().clone()
    }

    pub async fn insert_note(&self, note: &NoteRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO note (id, "userHost", "channelId", cw, text, tags, visibility)
               VALUES ($1, $2, $3, $4, $5, $6::varchar(128)[], $7::text::note_visibility_enum)"#,
        )
        .bind(&note.id)
        .bind(&note.user_host)
        .bind(&note.channel_id)
        .bind(&note.cw)
        .bind(&note.text)
        .bind(&note.tags)
        .bind(note.visibility.as_str())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Close pool connections and drop the ephemeral database.
    pub async fn close(mut self) -> Result<(), TestDatabaseError> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }

        drop_database(self.admin_options.clone(), &self.database_name).await?;

        if let Some(container) = self.container.take() {
            drop(container);
        }

        Ok(())
    }
}

async fn drop_database(
    admin_options: PgConnectOptions,
    database_name: &str,
) -> Result<(), sqlx::Error> {
    let admin_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(admin_options)
        .await?;

    sqlx::query(&format!(
        "DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)",
        database_name
    ))
    .execute(&admin_pool)
    .await?;

    admin_pool.close().await;
    Ok(())
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            let admin_options = self.admin_options.clone();
            let database_name = self.database_name.clone();
            if let Ok(handle) = Handle::try_current() {
                handle.spawn(async move {
                    pool.close().await;
                    let _ = drop_database(admin_options, &database_name).await;
                });
            }
        }

        if let Some(container) = self.container.take() {
            drop(container);
        }
    }
}
