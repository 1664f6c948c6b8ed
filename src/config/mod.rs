use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file {0} not found")]
    Missing(PathBuf),

    #[error("Config file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Contents of `config.json`: admin credentials and the poll shown on the kiosk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub admin_username: String,
    pub admin_password: String,
    #[serde(default)]
    pub current_poll_id: Option<i64>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ConfigError::Missing(path.to_path_buf()),
            _ => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;

        serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let body = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: io::Error::other(e),
        })?;

        tokio::fs::write(path, body)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// The loaded config shared between requests.
///
/// Changing the current poll writes the file first, so memory never points at
/// a selection that was not persisted.
pub struct SharedConfig {
    path: PathBuf,
    inner: RwLock<Config>,
}

impl SharedConfig {
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            inner: RwLock::new(config),
        }
    }

    // Returns (username, password)
    pub async fn credentials(&self) -> (String, String) {
        let config = self.inner.read().await;
        (config.admin_username.clone(), config.admin_password.clone())
    }

    pub async fn current_poll_id(&self) -> Option<i64> {
        self.inner.read().await.current_poll_id
    }

    pub async fn set_current_poll(&self, poll_id: Option<i64>) -> Result<(), ConfigError> {
        let mut config = self.inner.write().await;
        let mut updated = config.clone();
        updated.current_poll_id = poll_id;
        updated.save(&self.path).await?;
        *config = updated;
        Ok(())
    }
}

/// Process settings taken from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub database_url: String,
    pub bind_address: String,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            config_path: PathBuf::from(try_load("POLL_KIOSK_CONFIG", "config.json".to_string())),
            database_url: try_load("DATABASE_URL", "sqlite:data/polls.db".to_string()),
            bind_address: try_load("BIND_ADDRESS", "0.0.0.0".to_string()),
            port: try_load("PORT", 5000),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Ok(raw) = env::var(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };

    raw.parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}
