//! Configuration loading from anhelados.toml.

use policy::Policy;
use runtime::providers::{DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use runtime::DEFAULT_MAX_ITERATIONS;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::server::SessionLimits;

pub const CONFIG_FILE: &str = "anhelados.toml";

/// Environment variable consulted when `backend.api_key` is not set.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Statement policy (allow/deny/limits).
    #[serde(flatten)]
    pub policy: Policy,
}

/// Backend provider configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Provider name (currently only "openai" supported).
    pub provider: String,
    pub model: String,
    /// Any OpenAI-compatible endpoint.
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: 60,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./anhelados.db"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Web sessions idle this long are dropped.
    pub session_ttl_secs: u64,
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = SessionLimits::default();
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8501)),
            session_ttl_secs: limits.idle_ttl.as_secs(),
            max_sessions: limits.max_sessions,
        }
    }
}

impl ServerConfig {
    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            idle_ttl: Duration::from_secs(self.session_ttl_secs),
            max_sessions: self.max_sessions,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.provider != "openai" {
            return Err(ConfigError::UnsupportedProvider(
                self.backend.provider.clone(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        if self.server.session_ttl_secs == 0 || self.server.max_sessions == 0 {
            return Err(ConfigError::Invalid(
                "server.session_ttl_secs and server.max_sessions must be at least 1".into(),
            ));
        }
        self.policy
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// The API key from the file, else from the environment.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }

    fn resolve_api_key(&self, from_env: Option<String>) -> Result<String, ConfigError> {
        self.backend
            .api_key
            .clone()
            .or(from_env)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("unsupported provider '{0}': only \"openai\" is available")]
    UnsupportedProvider(String),

    #[error("API key not configured: set backend.api_key or {API_KEY_ENV}")]
    MissingApiKey,
}
