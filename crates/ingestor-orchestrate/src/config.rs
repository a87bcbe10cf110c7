//! System and job configuration (design §1.3): defaults → file →
//! environment → CLI, with `#[serde(deny_unknown_fields)]` strictness
//! throughout so an unknown key is a startup error, never silently
//! ignored.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use indexmap::IndexMap;
use ingestor_core::retry::RetryPolicy;
use ingestor_core::symbols::SymbolType;
use ingestor_core::IngestError;
use ingestor_model::Schema;
use ingestor_storage::{resolve_connect_options, PostgresConnectOptions};
use serde::Deserialize;

/// `logging.format` in a system config file.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

/// Explicit database overrides from the system config file. Any field left
/// unset falls through to the `<PREFIX>_*` environment variables and then
/// to [`PostgresConnectOptions::default`] (design §6).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DbConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

/// System-wide defaults: logging, DB connection, quarantine root, retry
/// and chunking/batching defaults (design §1.3).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SystemConfig {
    pub logging: LoggingConfig,
    pub db: DbConfig,
    pub quarantine_root: PathBuf,
    pub retry_policy: RetryPolicy,
    pub default_chunk_days: Option<u32>,
    pub default_batch_size: usize,
    pub max_rows_per_statement: usize,
    pub db_pool_size: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            db: DbConfig::default(),
            quarantine_root: PathBuf::from("quarantine"),
            retry_policy: RetryPolicy::default(),
            default_chunk_days: None,
            default_batch_size: 1000,
            max_rows_per_statement: 5000,
            db_pool_size: 4,
        }
    }
}

impl SystemConfig {
    /// Loads the system config from `path`, or returns the built-in
    /// defaults if `path` is `None`. Unknown keys are a hard error.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Configuration`] if the file cannot be read
    /// or fails to parse under `deny_unknown_fields`.
    pub fn load(path: Option<&Path>) -> Result<Self, IngestError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| IngestError::Configuration(format!("reading {}: {e}", path.display())))?;
        serde_yaml::from_str(&text)
            .map_err(|e| IngestError::Configuration(format!("parsing {}: {e}", path.display())))
    }

    /// Resolves the final DB connect options: file-declared values
    /// override [`PostgresConnectOptions::default`], environment
    /// variables prefixed `prefix` override those (design §6).
    #[must_use]
    pub fn resolve_db_options(&self, prefix: &str) -> PostgresConnectOptions {
        let mut options = resolve_connect_options(
            prefix,
            self.db.host.clone(),
            self.db.port,
            self.db.username.clone(),
            self.db.password.clone(),
            self.db.database.clone(),
        );
        options.pool_size = self.db_pool_size;
        options
    }
}

/// One named ingestion job (design §4.1's inputs, §1.3).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub api: String,
    pub dataset: String,
    pub schema: Schema,
    pub symbols: Vec<String>,
    #[serde(default = "default_symbol_type")]
    pub symbol_type: SymbolType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub chunk_days: Option<u32>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default = "default_true")]
    pub quarantine_enabled: bool,
    pub mapping_path: PathBuf,
}

fn default_symbol_type() -> SymbolType {
    SymbolType::Continuous
}

fn default_true() -> bool {
    true
}

/// A per-API file declaring its jobs and an optional retry-policy
/// override shared by all of them (design §1.3, §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobsFile {
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    pub jobs: IndexMap<String, JobConfig>,
}

impl JobsFile {
    /// # Errors
    ///
    /// Returns [`IngestError::Configuration`] if the file cannot be read
    /// or fails to parse under `deny_unknown_fields`.
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| IngestError::Configuration(format!("reading {}: {e}", path.display())))?;
        serde_yaml::from_str(&text)
            .map_err(|e| IngestError::Configuration(format!("parsing {}: {e}", path.display())))
    }

    /// The job's effective retry policy: its own override, else the
    /// file-wide default, else [`RetryPolicy::default`].
    #[must_use]
    pub fn retry_policy_for(&self, job: &JobConfig) -> RetryPolicy {
        job.retry_policy
            .or(self.retry_policy)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_system_config_path_yields_defaults() {
        let config = SystemConfig::load(None).unwrap();
        assert_eq!(config.default_batch_size, 1000);
    }

    #[test]
    fn unknown_top_level_key_is_a_hard_error() {
        let yaml = "quarantine_root: /tmp/q\nbogus_key: true\n";
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), yaml).unwrap();
        assert!(SystemConfig::load(Some(tmp.path())).is_err());
    }

    #[test]
    fn jobs_file_parses_a_minimal_job() {
        let yaml = r#"
jobs:
  ohlcv-es:
    api: databento
    dataset: GLBX.MDP3
    schema: ohlcv
    symbols: ["ES.c.0"]
    start_date: 2024-01-15
    end_date: 2024-01-16
    mapping_path: mappings/ohlcv.yaml
"#;
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), yaml).unwrap();
        let file = JobsFile::load(tmp.path()).unwrap();
        let job = &file.jobs["ohlcv-es"];
        assert_eq!(job.symbol_type, SymbolType::Continuous);
        assert!(job.quarantine_enabled);
    }

    #[test]
    fn retry_policy_for_prefers_job_override() {
        let file = JobsFile {
            retry_policy: Some(RetryPolicy {
                max_attempts: 5,
                ..RetryPolicy::default()
            }),
            jobs: IndexMap::new(),
        };
        let mut job_yaml = JobConfig {
            api: "databento".to_string(),
            dataset: "GLBX.MDP3".to_string(),
            schema: Schema::Ohlcv,
            symbols: vec!["ES.c.0".to_string()],
            symbol_type: SymbolType::Continuous,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            chunk_days: None,
            batch_size: None,
            retry_policy: Some(RetryPolicy {
                max_attempts: 9,
                ..RetryPolicy::default()
            }),
            fail_fast: false,
            quarantine_enabled: true,
            mapping_path: PathBuf::from("mappings/ohlcv.yaml"),
        };
        assert_eq!(file.retry_policy_for(&job_yaml).max_attempts, 9);
        job_yaml.retry_policy = None;
        assert_eq!(file.retry_policy_for(&job_yaml).max_attempts, 5);
    }
}
