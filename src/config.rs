use crate::auth::token_digest;
use crate::error::{Result, ServiceError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the API from a browser (the admin front-end)
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_allowed_origins: vec!["http://localhost:4200".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            path: PathBuf::from("data/vehicles.db"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<ApiToken>,
}

/// A client allowed to call write routes. Only the SHA-256 hex digest of the
/// bearer token is kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiToken {
    pub name: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_name: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "vehicles-service.log".to_string(),
            json: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from `path`, or from `config.toml` when it exists,
    /// then apply `VEHICLES_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("VEHICLES_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("VEHICLES_PORT") {
            self.server.port = port.parse().map_err(|_| {
                ServiceError::Config(format!("VEHICLES_PORT is not a valid port: '{port}'"))
            })?;
        }
        if let Some(backend) = lookup("VEHICLES_DATABASE_BACKEND") {
            self.database.backend = match backend.to_ascii_lowercase().as_str() {
                "memory" => DatabaseBackend::Memory,
                "sqlite" => DatabaseBackend::Sqlite,
                other => {
                    return Err(ServiceError::Config(format!(
                        "VEHICLES_DATABASE_BACKEND must be 'memory' or 'sqlite', got '{other}'"
                    )))
                }
            };
        }
        if let Some(path) = lookup("VEHICLES_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("VEHICLES_LOG_DIR") {
            self.logging.directory = PathBuf::from(dir);
        }
        if let Some(token) = lookup("VEHICLES_API_TOKEN") {
            if !token.is_empty() {
                self.auth.tokens.push(ApiToken {
                    name: "env".to_string(),
                    sha256: token_digest(&token),
                });
            }
        }
        Ok(())
    }
}
