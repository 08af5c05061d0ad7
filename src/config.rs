//! Configuration loading and management.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub ai: AiConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Path handling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub database: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            database: default_db_path(),
        }
    }
}

/// AI adapter configuration. API keys are never stored here; they come from
/// the request or from per-provider environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Provider used when a request does not name one.
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Append every AI invocation to the ai_call_log table.
    #[serde(default)]
    pub log_calls: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            log_calls: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8210
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".task-forest/tasks.db")
}

fn default_provider() -> String {
    "gemini".to_string()
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from the default location or fall back to
    /// environment variables, then built-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::load(".task-forest/config.yaml") {
            return config;
        }

        let mut config = Self::default();

        if let Ok(db_path) = std::env::var("TASK_FOREST_DB_PATH") {
            config.paths.database = PathBuf::from(db_path);
        }

        if let Ok(host) = std::env::var("TASK_FOREST_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("TASK_FOREST_PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }

        if let Ok(provider) = std::env::var("TASK_FOREST_DEFAULT_PROVIDER") {
            config.ai.default_provider = provider;
        }

        if let Ok(log_calls) = std::env::var("TASK_FOREST_LOG_AI_CALLS") {
            if let Ok(log_calls) = log_calls.parse() {
                config.ai.log_calls = log_calls;
            }
        }

        config
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.paths.database.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
