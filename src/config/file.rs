//! Misskey `default.yml` parsing and resolution into import settings.

use crate::models::ScopeFilter;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The only identifier scheme whose ids carry a decodable time prefix.
pub const SUPPORTED_ID_SCHEME: &str = "aid";

/// Default location of the Misskey configuration relative to the importer checkout.
pub const DEFAULT_CONFIG_PATH: &str = "../misskey/.config/default.yml";

/// Errors raised while reading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read Misskey config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse Misskey config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("id format must be \"aid\" (found \"{0}\")")]
    UnsupportedIdScheme(String),
    #[error("meilisearch settings are not enabled")]
    MissingMeilisearch,
    #[error("unknown meilisearch scope \"{0}\"; expected \"global\", \"local\" or a list of hosts")]
    UnknownScope(String),
    #[error("meilisearch scope host list is empty")]
    EmptyHostAllowlist,
    #[error("invalid resume id: {0}")]
    InvalidResumeId(#[from] crate::aid::MalformedIdentifier),
}

/// Subset of the Misskey configuration file read by the importer.
#[derive(Debug, Clone, Deserialize)]
pub struct MisskeyConfig {
    #[serde(default)]
    pub id: Option<String>,
    pub db: DbSection,
    #[serde(default)]
    pub meilisearch: Option<MeilisearchSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbSection {
    pub host: String,
    pub port: u16,
    pub db: String,
    pub user: String,
    #[serde(default)]
    pub pass: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeilisearchSection {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub scope: Option<ScopeValue>,
}

/// `scope` is either a keyword or an explicit list of hosts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScopeValue {
    Keyword(String),
    Hosts(Vec<String>),
}

impl ScopeValue {
    fn resolve(&self) -> Result<ScopeFilter, ConfigError> {
        match self {
            ScopeValue::Keyword(keyword) => match keyword.as_str() {
                "global" => Ok(ScopeFilter::All),
                "local" => Ok(ScopeFilter::LocalOnly),
                other => Err(ConfigError::UnknownScope(other.to_string())),
            },
            ScopeValue::Hosts(hosts) => {
                let hosts: BTreeSet<String> = hosts
                    .iter()
                    .map(|host| host.trim().to_ascii_lowercase())
                    .filter(|host| !host.is_empty())
                    .collect();
                if hosts.is_empty() {
                    Err(ConfigError::EmptyHostAllowlist)
                } else {
                    Ok(ScopeFilter::HostAllowlist(hosts))
                }
            }
        }
    }
}

/// Connection parameters for the Misskey PostgreSQL database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
}

/// Connection parameters for Meilisearch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub api_key: Option<String>,
    pub index_prefix: String,
}

impl IndexSettings {
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Uid of the index Misskey searches notes in.
    pub fn notes_index_uid(&self) -> String {
        format!("{}---notes", self.index_prefix)
    }
}

/// Everything the importer needs from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    pub db: DbSettings,
    pub index: IndexSettings,
    pub scope: ScopeFilter,
}

impl MisskeyConfig {
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    /// Validate the file and extract the import settings.
    pub fn resolve(&self) -> Result<ImportSettings, ConfigError> {
        let scheme = self.id.as_deref().unwrap_or_default();
        if scheme != SUPPORTED_ID_SCHEME {
            return Err(ConfigError::UnsupportedIdScheme(scheme.to_string()));
        }

        let meili = self
            .meilisearch
            .as_ref()
            .ok_or(ConfigError::MissingMeilisearch)?;

        let scope = match &meili.scope {
            Some(value) => value.resolve()?,
            None => ScopeFilter::LocalOnly,
        };

        Ok(ImportSettings {
            db: DbSettings {
                host: self.db.host.clone(),
                port: self.db.port,
                database: self.db.db.clone(),
                user: self.db.user.clone(),
                password: self.db.pass.clone(),
            },
            index: IndexSettings {
                host: meili.host.clone(),
                port: meili.port,
                ssl: meili.ssl,
                api_key: meili.api_key.clone().filter(|key| !key.is_empty()),
                index_prefix: meili.index.clone(),
            },
            scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
url: https://misskey.example/
port: 3000
id: 'aid'
db:
  host: localhost
  port: 5432
  db: misskey
  user: example-misskey-user
  pass: example-misskey-pass
"#;

    fn with_meili(section: &str) -> String {
        format!("{BASE}meilisearch:\n{section}")
    }

    #[test]
    fn resolves_local_scope_by_default() {
        let yaml = with_meili("  host: localhost\n  port: 7700\n  apiKey: ''\n  index: ''\n");
        let settings = MisskeyConfig::from_yaml(&yaml).unwrap().resolve().unwrap();

        assert_eq!(settings.scope, ScopeFilter::LocalOnly);
        assert_eq!(settings.index.api_key, None);
        assert_eq!(settings.index.base_url(), "http://localhost:7700");
        assert_eq!(settings.index.notes_index_uid(), "---notes");
        assert_eq!(settings.db.database, "misskey");
        assert_eq!(settings.db.password.as_deref(), Some("example-misskey-pass"));
    }

    #[test]
    fn resolves_global_scope_and_tls() {
        let yaml = with_meili(
            "  host: search.example\n  port: 443\n  ssl: true\n  apiKey: secret\n  index: mk\n  scope: global\n",
        );
        let settings = MisskeyConfig::from_yaml(&yaml).unwrap().resolve().unwrap();

        assert_eq!(settings.scope, ScopeFilter::All);
        assert_eq!(settings.index.base_url(), "https://search.example:443");
        assert_eq!(settings.index.api_key.as_deref(), Some("secret"));
        assert_eq!(settings.index.notes_index_uid(), "mk---notes");
    }

    #[test]
    fn resolves_host_list_scope() {
        let yaml = with_meili(
            "  host: localhost\n  port: 7700\n  index: mk\n  scope:\n    - Remote.Example\n    - other.example\n",
        );
        let settings = MisskeyConfig::from_yaml(&yaml).unwrap().resolve().unwrap();

        let expected: BTreeSet<String> = ["other.example", "remote.example"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        assert_eq!(settings.scope, ScopeFilter::HostAllowlist(expected));
    }

    #[test]
    fn rejects_unknown_scope_keyword_and_empty_lists() {
        let yaml = with_meili("  host: localhost\n  port: 7700\n  scope: everywhere\n");
        let err = MisskeyConfig::from_yaml(&yaml).unwrap().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownScope(ref s) if s == "everywhere"));

        let yaml = with_meili("  host: localhost\n  port: 7700\n  scope: []\n");
        let err = MisskeyConfig::from_yaml(&yaml).unwrap().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyHostAllowlist));
    }

    #[test]
    fn rejects_other_id_schemes() {
        let yaml = with_meili("  host: localhost\n  port: 7700\n").replace("'aid'", "'uuid'");
        let err = MisskeyConfig::from_yaml(&yaml).unwrap().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedIdScheme(ref s) if s == "uuid"));
        assert_eq!(err.to_string(), "id format must be \"aid\" (found \"uuid\")");
    }

    #[test]
    fn requires_meilisearch_section() {
        let err = MisskeyConfig::from_yaml(BASE).unwrap().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::MissingMeilisearch));
    }

    #[test]
    fn reports_unreadable_files() {
        let err = MisskeyConfig::load("/nonexistent/default.yml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
