//! Importer configuration: the Misskey YAML file plus environment tuning.

pub mod file;
pub mod tuning;

pub use file::{
    ConfigError, DEFAULT_CONFIG_PATH, DbSettings, ImportSettings, IndexSettings, MisskeyConfig,
    SUPPORTED_ID_SCHEME,
};
pub use tuning::ImporterTuning;
