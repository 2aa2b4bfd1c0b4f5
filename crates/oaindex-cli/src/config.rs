//! Configuration loading from TOML files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use oaindex_ingest::config::DEFAULT_SNAPSHOT_ROOT;
use oaindex_ingest::walker::default_workers;
use oaindex_ingest::{ElasticConfig, IndexOverrides, RecordType, Strategy, SubmitConfig, WalkConfig};
use serde::Deserialize;

/// Global configuration for oaindex
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub snapshot: SnapshotConfig,
    pub ingest: IngestConfig,
    /// Per record type overrides, keyed by type name (`work`, `sources`, ...)
    pub index: BTreeMap<String, IndexSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    /// None: ingestion requests never time out
    pub ingest_timeout_secs: Option<u64>,
    pub query_timeout_secs: u64,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub username: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub password: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            ingest_timeout_secs: None,
            query_timeout_secs: 20,
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub root: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_SNAPSHOT_ROOT),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub chunk_size: usize,
    pub thread_count: usize,
    pub queue_size: usize,
    pub strategy: Strategy,
    pub workers: usize,
    pub max_retries: u32,
    pub max_folders: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let submit = SubmitConfig::default();
        Self {
            batch_size: oaindex_core::DEFAULT_BATCH_SIZE,
            chunk_size: submit.chunk_size,
            thread_count: submit.thread_count,
            queue_size: submit.queue_size,
            strategy: Strategy::default(),
            workers: default_workers(),
            max_retries: submit.max_retries,
            max_folders: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct IndexSection {
    pub name: Option<String>,
    pub shards: Option<u32>,
    pub replicas: Option<u32>,
    pub refresh_interval: Option<String>,
    pub translog_durability: Option<String>,
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./oaindex.toml (current directory)
    /// 2. ~/.config/oaindex/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("oaindex.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "oaindex") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        for key in config.index.keys() {
            if RecordType::from_name(key).is_none() {
                log::warn!("Ignoring [index.{key}]: unknown record type");
            }
        }
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Connection settings with the given request timeout
    pub fn elastic_config(&self, url: Option<&str>, timeout_secs: Option<u64>) -> ElasticConfig {
        ElasticConfig {
            url: url.unwrap_or(&self.backend.url).to_string(),
            timeout: timeout_secs.map(Duration::from_secs),
            username: self.backend.username.clone(),
            password: self.backend.password.clone(),
            ..Default::default()
        }
    }

    pub fn overrides(&self, record_type: RecordType) -> IndexOverrides {
        let section = self
            .index
            .iter()
            .find(|(key, _)| RecordType::from_name(key) == Some(record_type))
            .map(|(_, section)| section.clone())
            .unwrap_or_default();
        IndexOverrides {
            name: section.name,
            shards: section.shards,
            replicas: section.replicas,
            refresh_interval: section.refresh_interval,
            translog_durability: section.translog_durability,
        }
    }

    pub fn walk_config(&self) -> WalkConfig {
        let ingest = &self.ingest;
        WalkConfig {
            strategy: ingest.strategy,
            workers: ingest.workers,
            batch_size: ingest.batch_size,
            max_folders: ingest.max_folders,
            submit: SubmitConfig {
                chunk_size: ingest.chunk_size,
                thread_count: ingest.thread_count,
                queue_size: ingest.queue_size,
                max_retries: ingest.max_retries,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.backend.url, "http://localhost:9200");
        assert_eq!(config.backend.query_timeout_secs, 20);
        assert!(config.backend.ingest_timeout_secs.is_none());
        assert_eq!(config.snapshot.root, PathBuf::from(DEFAULT_SNAPSHOT_ROOT));
        assert_eq!(config.ingest.batch_size, 5_000);
        assert_eq!(config.ingest.strategy, Strategy::Sequential);
        assert!(config.ingest.workers >= 1);
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("OAINDEX_TEST_VAR", "test_value");
        assert_eq!(
            expand_env_var("${OAINDEX_TEST_VAR}"),
            Some("test_value".to_string())
        );
        std::env::remove_var("OAINDEX_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[backend]
url = "http://es.internal:9200"
ingest_timeout_secs = 120

[snapshot]
root = "/mnt/openalex/data"

[ingest]
batch_size = 20000
thread_count = 8
strategy = "fan-out"
workers = 3
max_folders = 2

[index.works]
name = "works-2024"
replicas = 1
refresh_interval = "30s"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.backend.url, "http://es.internal:9200");
        assert_eq!(config.backend.ingest_timeout_secs, Some(120));
        assert_eq!(config.backend.query_timeout_secs, 20);
        assert_eq!(config.snapshot.root, PathBuf::from("/mnt/openalex/data"));

        let walk = config.walk_config();
        assert_eq!(walk.batch_size, 20_000);
        assert_eq!(walk.strategy, Strategy::FanOut);
        assert_eq!(walk.workers, 3);
        assert_eq!(walk.max_folders, Some(2));
        assert_eq!(walk.submit.thread_count, 8);
        assert_eq!(walk.submit.chunk_size, 5_000);

        let work = config.overrides(RecordType::Work);
        assert_eq!(work.name.as_deref(), Some("works-2024"));
        assert_eq!(work.replicas, Some(1));
        assert_eq!(work.refresh_interval.as_deref(), Some("30s"));
        assert_eq!(config.overrides(RecordType::Source), IndexOverrides::default());
    }

    #[test]
    fn credentials_expand_from_env() {
        std::env::set_var("OAINDEX_TEST_PASSWORD", "hunter2");
        let toml = r#"
[backend]
username = "elastic"
password = "${OAINDEX_TEST_PASSWORD}"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        std::env::remove_var("OAINDEX_TEST_PASSWORD");
        let es = config.elastic_config(None, Some(5));
        assert_eq!(es.username.as_deref(), Some("elastic"));
        assert_eq!(es.password.as_deref(), Some("hunter2"));
        assert_eq!(es.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("oaindex.toml");
        std::fs::write(&path, "[ingest]\nbatch_size = \"lots\"\n").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
