//! TOML-based configuration for Operator
//!
//! The server reads `operator.toml` once at startup. Secrets are never stored
//! in the file: providers name the environment variable that holds their key,
//! and [`OperatorConfig::provider_settings`] resolves it into a
//! [`ProviderSettings`] value that is passed down explicitly.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Root configuration structure loaded from operator.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3001".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            cors_origins: default_cors_origins(),
        }
    }
}

// ============= Database Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Local database path, or `:memory:`
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "./data/operator.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: OpenAIConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Environment variable containing the API key
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openai_base")]
    pub api_base: String,

    /// Model used by the conversational adapter
    #[serde(default = "default_openai_model")]
    pub chat_model: String,

    /// Model used by the extraction adapter
    #[serde(default = "default_openai_model")]
    pub extraction_model: String,
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4-1106-preview".to_string()
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            api_base: default_openai_base(),
            chat_model: default_openai_model(),
            extraction_model: default_openai_model(),
        }
    }
}

// ============= Dispatch Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on a single adapter call, fetch included
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// How many URLs a batch extraction works on at once
    #[serde(default = "default_extraction_concurrency")]
    pub extraction_concurrency: usize,

    /// Append a conversation record after every successful dispatch
    #[serde(default)]
    pub record_conversations: bool,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_extraction_concurrency() -> usize {
    1
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            extraction_concurrency: default_extraction_concurrency(),
            record_conversations: false,
        }
    }
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

// ============= Resolved Settings =============

/// Provider settings with secrets resolved. Built once at startup.
#[derive(Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    /// Name of the variable the key was looked up in, for error messages
    pub api_key_env: String,
    pub api_base: String,
    pub chat_model: String,
    pub extraction_model: String,
    pub timeout: Duration,
    pub fetch_timeout: Duration,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("api_base", &self.api_base)
            .field("chat_model", &self.chat_model)
            .field("extraction_model", &self.extraction_model)
            .field("timeout", &self.timeout)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(e: ConfigError) -> Self {
        crate::types::AppError::Configuration(e.to_string())
    }
}

impl OperatorConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "No configuration file found, using defaults");
            let config = OperatorConfig::default();
            config.validate()?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        let config: OperatorConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.server.log_format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "server.log_format must be 'pretty' or 'json', got '{}'",
                self.server.log_format
            )));
        }

        if self.dispatch.timeout_secs == 0 || self.dispatch.fetch_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch timeouts must be greater than zero".to_string(),
            ));
        }

        if self.dispatch.extraction_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.extraction_concurrency must be at least 1".to_string(),
            ));
        }

        let api_base = &self.providers.openai.api_base;
        match reqwest::Url::parse(api_base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "providers.openai.api_base is not an http(s) URL: {}",
                    api_base
                )));
            }
        }

        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve provider secrets from the process environment.
    pub fn provider_settings(&self) -> ProviderSettings {
        self.provider_settings_with(|name| std::env::var(name).ok())
    }

    /// Resolve provider secrets through the given lookup.
    pub fn provider_settings_with<F>(&self, lookup: F) -> ProviderSettings
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai = &self.providers.openai;
        ProviderSettings {
            api_key: lookup(&openai.api_key_env).filter(|key| !key.trim().is_empty()),
            api_key_env: openai.api_key_env.clone(),
            api_base: openai.api_base.trim_end_matches('/').to_string(),
            chat_model: openai.chat_model.clone(),
            extraction_model: openai.extraction_model.clone(),
            timeout: self.dispatch.timeout(),
            fetch_timeout: self.dispatch.fetch_timeout(),
        }
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Path of the database, or `None` for an in-memory database
    pub fn database_path(&self) -> Option<PathBuf> {
        match self.database.url.as_str() {
            ":memory:" => None,
            path => Some(PathBuf::from(path)),
        }
    }
}
