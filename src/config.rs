//! Configuration management for trickshelf
//!
//! TOML configuration with per-environment defaults and validation.
//! Location: ~/.trickshelf/config.toml

use crate::errors::{Result, ShelfError};
use crate::progress::{Easing, ProgressOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable selecting the preset.
pub const ENV_VAR: &str = "TRICKSHELF_ENV";

/// Longest accepted storage TTL (one year).
pub const MAX_TTL_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Deployment environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(ShelfError::ConfigError(format!(
                "Unknown environment: {}",
                other
            ))),
        }
    }
}

impl Environment {
    /// Environment named by `TRICKSHELF_ENV`, development when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var(ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(Environment::Development),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

/// Complete configuration for trickshelf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub environment: Environment,
    pub server: ServerConfig,
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default = "default_progress")]
    pub progress: ProgressOptions,
}

/// Site the client talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub hostname: String,
    pub port: u16,
    /// Overrides `http://{hostname}:{port}` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSection {
    pub name: String,
}

/// Client-side cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Persist the cache here; in-memory only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub session_ttl_ms: u64,
    pub tricks_ttl_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_sec: u64,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "MonsterBattle".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            session_ttl_ms: 60_000,
            tricks_ttl_ms: 600_000,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_sec: 30 }
    }
}

/// Indicator options applied when a page boots.
fn default_progress() -> ProgressOptions {
    ProgressOptions {
        easing: Some(Easing::Ease),
        speed: Some(500),
        trickle: Some(false),
        ..ProgressOptions::default()
    }
}

impl ServerConfig {
    fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Development => Self {
                hostname: "localhost".to_string(),
                port: 3001,
                base_url: None,
            },
            Environment::Production => Self {
                hostname: std::env::var("HOSTNAME")
                    .ok()
                    .filter(|h| !h.trim().is_empty())
                    .unwrap_or_else(|| "127.0.0.1".to_string()),
                port: 3001,
                base_url: None,
            },
            Environment::Test => Self {
                hostname: "localhost".to_string(),
                port: 4001,
                base_url: None,
            },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::for_environment(Environment::Development)
    }
}

impl AppConfig {
    /// Built-in defaults for `env`
    pub fn for_environment(env: Environment) -> Self {
        Self {
            environment: env,
            server: ServerConfig::for_environment(env),
            app: AppSection::default(),
            storage: StorageConfig::default(),
            http: HttpConfig::default(),
            progress: default_progress(),
        }
    }

    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ShelfError::ConfigError(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)
            .map_err(|e| ShelfError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the standard location, or the preset for `TRICKSHELF_ENV`
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }
        Ok(Self::for_environment(Environment::from_env()?))
    }

    /// `~/.trickshelf/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".trickshelf").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.hostname.trim().is_empty() {
            return Err(ShelfError::ConfigError(
                "server.hostname must not be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ShelfError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        if let Some(base) = &self.server.base_url {
            let parsed = url::Url::parse(base).ok();
            if !parsed.is_some_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host()) {
                return Err(ShelfError::ConfigError(format!(
                    "server.base_url must be an http(s) URL: {}",
                    base
                )));
            }
        }

        for (name, ttl) in [
            ("storage.session_ttl_ms", self.storage.session_ttl_ms),
            ("storage.tricks_ttl_ms", self.storage.tricks_ttl_ms),
        ] {
            if ttl == 0 || ttl > MAX_TTL_MS {
                return Err(ShelfError::ConfigError(format!(
                    "{} must be between 1 and {}",
                    name, MAX_TTL_MS
                )));
            }
        }

        if self.http.timeout_sec == 0 {
            return Err(ShelfError::ConfigError(
                "http.timeout_sec must be greater than 0".to_string(),
            ));
        }

        self.progress.validate()?;
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ShelfError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ShelfError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| ShelfError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Site root without a trailing slash
    pub fn base_url(&self) -> String {
        match &self.server.base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.server.hostname, self.server.port),
        }
    }

    /// `{base_url}/api`
    pub fn api_base_url(&self) -> String {
        format!("{}/api", self.base_url())
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_millis(self.storage.session_ttl_ms)
    }

    pub fn tricks_ttl(&self) -> Duration {
        Duration::from_millis(self.storage.tricks_ttl_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_sec)
    }

    /// Storage file path with `~/` expanded
    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage.path.as_deref().map(Self::expand_path)
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }
}
