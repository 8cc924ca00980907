// crates/triage-gate-config/src/config.rs
// ============================================================================
// Module: Triage Gate Configuration
// Description: TOML file + environment-variable layered configuration model.
// Purpose: One validated root type every binary entry point loads before wiring.
// Dependencies: serde, toml, triage-gate-providers
// ============================================================================

//! ## Overview
//! [`AppConfig::load`] resolves the ambient configuration for a process: an
//! optional TOML file supplies defaults, a fixed set of environment
//! variables override individual fields, and [`AppConfig::validate`] rejects
//! anything inconsistent before the caller wires up collaborators. Loading
//! never panics; every failure mode is a typed [`ConfigError`] (§6.3).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use triage_gate_providers::AnalyzerConfig;
use triage_gate_providers::BoardClientConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hard ceiling on the size of a config file, independent of `MAX_CONTENT_LENGTH`.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

/// Default bind host for the HTTP edge.
const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port for the HTTP edge.
const DEFAULT_PORT: u16 = 8080;

/// Default number of cards sent to the analyzer per batch (§6.3).
const DEFAULT_ANALYSIS_BATCH_SIZE: usize = 8;

/// Default number of analyzer batches allowed in flight at once.
const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 4;

/// Default request body ceiling for the file-upload endpoint: 16 MiB (§6.3).
const DEFAULT_MAX_CONTENT_LENGTH: u64 = 16 * 1024 * 1024;

/// Default SQLite persistence path.
const DEFAULT_DB_URL: &str = "triage-gate.sqlite3";

/// Default grounding-store SQLite path.
const DEFAULT_VECTOR_DB_PATH: &str = "triage-gate-grounding.sqlite3";

/// Default grounding-store collection name.
const DEFAULT_VECTOR_COLLECTION: &str = "default";

/// Default upload staging directory.
const DEFAULT_UPLOAD_FOLDER: &str = "uploads";

/// Default board provider identifier stamped on fresh board scopes.
const DEFAULT_PLATFORM: &str = "trello";

/// Default in-process scheduler poll interval, in seconds.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// The config file exceeded [`MAX_CONFIG_FILE_SIZE`] or was not UTF-8.
    #[error("config file invalid: {0}")]
    Invalid(String),
    /// The config file could not be parsed as TOML.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Validation rejected the resolved configuration.
    #[error("config validation error: {0}")]
    Validation(String),
}

// ============================================================================
// SECTION: Root Configuration
// ============================================================================

/// Root ambient configuration for every Triage Gate binary.
///
/// # Invariants
/// - Every field has a default; a process with no config file and no
///   environment overrides still produces a loadable (if inert) config.
/// - Named `AppConfig`, not `Config`, to avoid colliding with
///   [`triage_gate_core::Config`] (the per-board-watch entity persisted by
///   the store).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Board provider client settings.
    pub board: BoardSettings,
    /// LLM analyzer settings.
    pub analyzer: AnalyzerConfig,
    /// SQLite persistence settings.
    pub persistence: PersistenceConfig,
    /// Grounding-store settings.
    pub grounding: GroundingConfig,
    /// HTTP edge bind settings.
    pub http: HttpConfig,
    /// In-process scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Secret used to encrypt provider credentials at rest, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crypto_secret_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            board: BoardSettings::default(),
            analyzer: AnalyzerConfig::default(),
            persistence: PersistenceConfig::default(),
            grounding: GroundingConfig::default(),
            http: HttpConfig::default(),
            scheduler: SchedulerConfig::default(),
            crypto_secret_key: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from an optional TOML file, then layers
    /// environment-variable overrides on top, then validates (§6.3).
    ///
    /// A missing `path` is not an error: the defaults are used as the base
    /// and environment overrides still apply. A `path` that does not exist
    /// or cannot be read *is* an error, since the caller named it explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, exceeds the size
    /// ceiling, is not valid UTF-8 TOML, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses a config file from disk without applying environment overrides.
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Overrides fields from the recognized environment variables (§6.3).
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("BOARD_API_KEY") {
            self.board.client.api_key = value;
        }
        if let Ok(value) = env::var("LLM_API_KEY") {
            self.analyzer.api_key = value;
        }
        if let Ok(value) = env::var("LLM_MODEL") {
            self.analyzer.model = value;
        }
        if let Ok(value) = env::var("DB_URL") {
            self.persistence.db_path = PathBuf::from(value);
        }
        if let Ok(value) = env::var("VECTOR_DB_PATH") {
            self.grounding.vector_db_path = PathBuf::from(value);
        }
        if let Ok(value) = env::var("VECTOR_COLLECTION") {
            self.grounding.vector_collection = value;
        }
        if let Ok(value) = env::var("UPLOAD_FOLDER") {
            self.grounding.upload_folder = PathBuf::from(value);
        }
        if let Ok(value) = env::var("MAX_CONTENT_LENGTH") {
            if let Ok(parsed) = value.parse::<u64>() {
                self.grounding.max_content_length = parsed;
            }
        }
        if let Ok(value) = env::var("CRYPTO_SECRET_KEY") {
            self.crypto_secret_key = Some(value);
        }
        if let Ok(value) = env::var("ANALYSIS_BATCH_SIZE") {
            if let Ok(parsed) = value.parse::<usize>() {
                self.scheduler.analysis_batch_size = parsed;
            }
        }
        if let Ok(value) = env::var("PORT") {
            if let Ok(parsed) = value.parse::<u16>() {
                self.http.port = parsed;
            }
        }
        if let Ok(value) = env::var("HOST") {
            self.http.host = value;
        }
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when any cross-field or
    /// per-section check fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.board.validate()?;
        self.persistence.validate()?;
        self.grounding.validate()?;
        self.http.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Board Settings
// ============================================================================

/// Board provider client settings, including the provider identifier and
/// credential that [`BoardClientConfig`] itself does not carry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BoardSettings {
    /// Transport and limits for the board client.
    pub client: BoardClientConfig,
    /// Board provider identifier stamped on fresh board scopes, e.g. `"trello"`.
    pub platform: String,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self { client: BoardClientConfig::default(), platform: DEFAULT_PLATFORM.to_string() }
    }
}

impl BoardSettings {
    /// Validates board settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.platform.trim().is_empty() {
            return Err(ConfigError::Validation("board.platform must not be empty".to_string()));
        }
        if self.client.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("board.client.base_url must not be empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Persistence Settings
// ============================================================================

/// SQLite persistence settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { db_path: PathBuf::from(DEFAULT_DB_URL) }
    }
}

impl PersistenceConfig {
    /// Validates persistence settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation("persistence.db_path must not be empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Grounding Store Settings
// ============================================================================

/// Grounding-store settings: the vector-backed document index and upload staging.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GroundingConfig {
    /// Path to the grounding store's SQLite database file.
    pub vector_db_path: PathBuf,
    /// Collection name the grounding store indexes under.
    pub vector_collection: String,
    /// Directory uploaded documents are staged into before ingest.
    pub upload_folder: PathBuf,
    /// Hard ceiling on a single uploaded document, in bytes.
    pub max_content_length: u64,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            vector_db_path: PathBuf::from(DEFAULT_VECTOR_DB_PATH),
            vector_collection: DEFAULT_VECTOR_COLLECTION.to_string(),
            upload_folder: PathBuf::from(DEFAULT_UPLOAD_FOLDER),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
        }
    }
}

impl GroundingConfig {
    /// Validates grounding-store settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_content_length == 0 {
            return Err(ConfigError::Validation(
                "grounding.max_content_length must be greater than zero".to_string(),
            ));
        }
        if self.vector_collection.trim().is_empty() {
            return Err(ConfigError::Validation(
                "grounding.vector_collection must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: HTTP Settings
// ============================================================================

/// HTTP edge bind settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { host: DEFAULT_HOST.to_string(), port: DEFAULT_PORT }
    }
}

impl HttpConfig {
    /// Validates HTTP bind settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Validation("http.host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Validation("http.port must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Returns the `host:port` bind address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============================================================================
// SECTION: Scheduler Settings
// ============================================================================

/// In-process poll scheduler settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of cards sent to the analyzer per batch.
    pub analysis_batch_size: usize,
    /// Maximum analyzer batches allowed in flight at once.
    pub max_concurrent_batches: usize,
    /// Interval between automatic `analyze_list` passes, in seconds.
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            analysis_batch_size: DEFAULT_ANALYSIS_BATCH_SIZE,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl SchedulerConfig {
    /// Validates scheduler settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis_batch_size == 0 {
            return Err(ConfigError::Validation(
                "scheduler.analysis_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_batches == 0 {
            return Err(ConfigError::Validation(
                "scheduler.max_concurrent_batches must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "scheduler.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]
mod tests {
    use std::io::Write as _;

    use super::AppConfig;
    use super::ConfigError;

    #[test]
    fn defaults_load_and_validate_with_no_file() {
        let config = AppConfig::load(None).expect("default config loads");
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.scheduler.analysis_batch_size, 8);
    }

    #[test]
    fn zero_batch_size_fails_validation() {
        let mut config = AppConfig::default();
        config.scheduler.analysis_batch_size = 0;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = AppConfig::load(Some(std::path::Path::new("/nonexistent/triage-gate.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn file_contents_layer_under_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[http]\nport = 1234\n").expect("write");
        let config = AppConfig::load(Some(file.path())).expect("loads from file");
        assert_eq!(config.http.port, 1234);
        assert_eq!(config.http.host, "0.0.0.0");
    }
}
