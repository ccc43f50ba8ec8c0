//! Configuration management for the server.

use std::env;
use std::path::PathBuf;

/// Where the served tables live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// In-process maps, lost on restart
    Memory,
    /// One JSON file per record under the given directory
    File(PathBuf),
}

impl Storage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Storage::Memory => "memory",
            Storage::File(_) => "file",
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Path prefix in front of every table route, without slashes
    pub base_path: String,
    /// Backing store for the tables
    pub storage: Storage,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            base_path: "api".to_string(),
            storage: Storage::Memory,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let base_path = lookup("BASE_PATH")
            .unwrap_or_else(|| "api".to_string())
            .trim_matches('/')
            .to_string();

        let storage = match lookup("STORAGE").as_deref().unwrap_or("memory") {
            "memory" => Storage::Memory,
            "file" => {
                let dir = lookup("DATA_DIR").ok_or(ConfigError::MissingDataDir)?;
                Storage::File(PathBuf::from(dir))
            }
            other => return Err(ConfigError::InvalidStorage(other.to_string())),
        };

        Ok(Self {
            host,
            port,
            base_path,
            storage,
        })
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_matches('/').to_string();
        self
    }

    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid STORAGE value {0:?}, expected \"memory\" or \"file\"")]
    InvalidStorage(String),

    #[error("DATA_DIR environment variable is required when STORAGE=file")]
    MissingDataDir,
}
