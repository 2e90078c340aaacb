use std::env;
use std::time::Duration;

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn env_duration_millis(key: &str, default_millis: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default_millis))
}

/// Process-level knobs that do not belong in the Misskey configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterTuning {
    pub db_max_connections: u32,
    pub db_connect_timeout: Duration,
    pub request_timeout: Duration,
    pub task_poll_interval: Duration,
    pub task_stall_warning: Duration,
    pub upsert_chunk_size: usize,
}

impl ImporterTuning {
    pub fn from_env() -> Self {
        Self {
            db_max_connections: env_u32("IMPORTER_DB_MAX_CONNECTIONS", 1),
            db_connect_timeout: env_duration_millis("IMPORTER_DB_CONNECT_TIMEOUT_MS", 10_000),
            request_timeout: env_duration_millis("MEILI_REQUEST_TIMEOUT_MS", 30_000),
            task_poll_interval: env_duration_millis("MEILI_TASK_POLL_INTERVAL_MS", 200),
            task_stall_warning: env_duration_millis("MEILI_TASK_STALL_WARN_MS", 60_000),
            upsert_chunk_size: env_usize("MEILI_UPSERT_CHUNK_SIZE", 1000),
        }
    }
}
