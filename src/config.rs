//! Service configuration loaded from `config.toml`.
//!
//! Every key is optional. A missing or empty file yields `Config::default()`,
//! which has no sources. Unknown keys are accepted but logged, since they are
//! usually typos. A couple of settings can be overridden from the
//! environment for container deployments.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_FEED_SIZE};
use crate::ingest::Source;
use crate::pagination::DEFAULT_PER_PAGE;
use crate::query::DEFAULT_QUERY_TIMEOUT;
use crate::util::{validate_source_url, HostPolicy};

/// Overrides `database.path`.
pub const ENV_DATABASE_PATH: &str = "NEWSSERVICE_DATABASE_PATH";
/// Overrides `poll_interval_secs`.
pub const ENV_POLL_INTERVAL_SECS: &str = "NEWSSERVICE_POLL_INTERVAL_SECS";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feeds to poll.
    pub sources: Vec<Source>,

    /// Seconds between ingestion cycles of a single source.
    pub poll_interval_secs: u64,

    /// When set, a failing source backs off exponentially up to this many
    /// seconds instead of polling at the fixed interval.
    pub max_backoff_secs: Option<u64>,

    /// Page size for news listings.
    pub per_page: i64,

    /// Upper bound on one query call, in seconds.
    pub query_timeout_secs: u64,

    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Permit sources on localhost and private networks.
    pub allow_private_hosts: bool,

    pub database: DatabaseConfig,

    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:`.
    pub path: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Largest accepted response body in bytes.
    pub max_bytes: usize,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            poll_interval_secs: 300,
            max_backoff_secs: None,
            per_page: DEFAULT_PER_PAGE,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT.as_secs(),
            log_level: "info".to_string(),
            allow_private_hosts: false,
            database: DatabaseConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "news.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            max_bytes: DEFAULT_MAX_FEED_SIZE,
            user_agent: format!("newsservice/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "sources",
        "poll_interval_secs",
        "max_backoff_secs",
        "per_page",
        "query_timeout_secs",
        "log_level",
        "allow_private_hosts",
        "database",
        "fetch",
    ];

    /// Load, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            poll_interval_secs = config.poll_interval_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Read the TOML file without overrides or validation.
    ///
    /// - Missing, empty or whitespace-only file → `Ok(Config::default())`
    /// - Invalid TOML or wrong value types → `Err(ConfigError::Parse)`
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        Self::from_toml(&content)
    }

    /// Parse TOML text. Unknown top-level keys are logged and ignored.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }
        Ok(toml::from_str(content)?)
    }

    /// Apply `NEWSSERVICE_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|p| !p.trim().is_empty()) {
            tracing::debug!(path = %path, "Database path overridden from environment");
            self.database.path = path;
        }

        if let Some(raw) = lookup(ENV_POLL_INTERVAL_SECS) {
            self.poll_interval_secs = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{ENV_POLL_INTERVAL_SECS} must be a whole number of seconds, got '{raw}'"
                ))
            })?;
        }

        Ok(())
    }

    /// Check value ranges, source names and source URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.max_backoff_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "max_backoff_secs must be at least 1".to_string(),
            ));
        }
        if self.per_page < 1 {
            return Err(ConfigError::Invalid(format!(
                "per_page must be at least 1, got {}",
                self.per_page
            )));
        }
        if self.query_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "query_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_secs == 0 || self.fetch.max_bytes == 0 {
            return Err(ConfigError::Invalid(
                "fetch.timeout_secs and fetch.max_bytes must be positive".to_string(),
            ));
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database.path is empty".to_string()));
        }

        let policy = HostPolicy::from_allow_private(self.allow_private_hosts);
        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source with url '{}' has no name",
                    source.url
                )));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            validate_source_url(&source.url, policy).map_err(|e| {
                ConfigError::Invalid(format!("source '{}': {}", source.name, e))
            })?;
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_backoff(&self) -> Option<Duration> {
        self.max_backoff_secs.map(Duration::from_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.sources.is_empty());
        assert_eq!(config.poll_interval_secs, 300);
        assert_eq!(config.max_backoff(), None);
        assert_eq!(config.per_page, 20);
        assert_eq!(config.query_timeout_secs, 5);
        assert_eq!(config.log_level, "info");
        assert!(!config.allow_private_hosts);
        assert_eq!(config.database.path, "news.db");
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.max_bytes, 10 * 1024 * 1024);
        assert!(config.fetch.user_agent.starts_with("newsservice/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/newsservice_test_nonexistent_config.toml");
        let config = Config::load_file(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let dir = std::env::temp_dir().join("newsservice_config_test_whitespace");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "   \n  \n  ").unwrap();

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config, Config::default());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::from_toml("per_page = 50\n[database]\nmax_connections = 2\n").unwrap();
        assert_eq!(config.per_page, 50);
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.database.path, "news.db");
        assert_eq!(config.poll_interval_secs, 300);
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("newsservice_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
poll_interval_secs = 120
max_backoff_secs = 3600
per_page = 10
query_timeout_secs = 2
log_level = "debug"

[[sources]]
name = "world"
url = "https://news.example.com/world.rss"

[[sources]]
name = "tech"
url = "https://news.example.com/tech.rss"

[database]
path = "/var/lib/newsservice/news.db"
max_connections = 8

[fetch]
timeout_secs = 10
max_bytes = 1048576
user_agent = "custom-agent/1.0"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(120));
        assert_eq!(config.max_backoff(), Some(Duration::from_secs(3600)));
        assert_eq!(config.per_page, 10);
        assert_eq!(config.query_timeout(), Duration::from_secs(2));
        assert_eq!(config.log_level, "debug");
        assert_eq!(
            config.sources,
            vec![
                Source::new("world", "https://news.example.com/world.rss"),
                Source::new("tech", "https://news.example.com/tech.rss"),
            ]
        );
        assert_eq!(config.database.path, "/var/lib/newsservice/news.db");
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.fetch.max_bytes, 1_048_576);
        assert_eq!(config.fetch.user_agent, "custom-agent/1.0");
        assert!(config.validate().is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let err = Config::from_toml("poll_interval_secs = \"often\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_source_missing_url_is_parse_error() {
        let err = Config::from_toml("[[sources]]\nname = \"world\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("per_page = 5\ntotally_fake_key = true\n").unwrap();
        assert_eq!(config.per_page, 5);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("newsservice_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                (ENV_DATABASE_PATH, "/data/override.db"),
                (ENV_POLL_INTERVAL_SECS, " 60 "),
            ]))
            .unwrap();

        assert_eq!(config.database.path, "/data/override.db");
        assert_eq!(config.poll_interval_secs, 60);
    }

    #[test]
    fn test_empty_env_path_is_ignored() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[(ENV_DATABASE_PATH, "  ")]))
            .unwrap();
        assert_eq!(config.database.path, "news.db");
    }

    #[test]
    fn test_bad_env_interval_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(env(&[(ENV_POLL_INTERVAL_SECS, "five")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains(ENV_POLL_INTERVAL_SECS));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.poll_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.per_page = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.fetch.max_bytes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_private_source_unless_allowed() {
        let mut config = Config::default();
        config.sources = vec![Source::new("local", "http://127.0.0.1:8080/rss")];

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source 'local'"));

        config.allow_private_hosts = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let mut config = Config::default();
        config.sources = vec![Source::new("disk", "file:///etc/passwd")];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_and_blank_names() {
        let mut config = Config::default();
        config.sources = vec![
            Source::new("world", "https://a.example.com/rss"),
            Source::new("world", "https://b.example.com/rss"),
        ];
        assert!(config.validate().unwrap_err().to_string().contains("duplicate"));

        config.sources = vec![Source::new(" ", "https://a.example.com/rss")];
        assert!(config.validate().unwrap_err().to_string().contains("no name"));
    }
}
