//! Server configuration
//!
//! Loaded from an optional TOML file; the binary overrides individual fields
//! from command-line flags and environment variables.
//!
//! ```toml
//! dir = "/var/lib/chunkq"
//! instance = "moscow"
//! listen = "127.0.0.1:8080"
//! max_write_size = 20971520
//!
//! [storage]
//! max_chunk_size = 20971520
//! sync_on_write = false
//! ```

use std::path::{Path, PathBuf};

use chunkq_core::validate_category;
use chunkq_storage::StorageConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File created and removed in the data directory at startup.
pub const WRITE_PROBE_FILE: &str = "write_test";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("data directory is not set")]
    MissingDir,

    #[error("invalid instance name {0:?}")]
    InvalidInstance(String),

    #[error("max_chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("data directory {path} is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Root data directory, one subdirectory per category
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Instance name used to prefix chunk files
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Largest accepted write body
    #[serde(default = "default_max_write_size")]
    pub max_write_size: usize,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_instance() -> String {
    "local".to_string()
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_write_size() -> usize {
    20 * 1024 * 1024 // 20MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dir: None,
            instance: default_instance(),
            listen: default_listen(),
            max_write_size: default_max_write_size(),
            storage: StorageConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the fields that have no sensible default and return the data dir.
    pub fn validate(&self) -> Result<&Path, ConfigError> {
        let dir = self.dir.as_deref().ok_or(ConfigError::MissingDir)?;
        // The instance name is embedded in chunk file names.
        validate_category(&self.instance)
            .map_err(|_| ConfigError::InvalidInstance(self.instance.clone()))?;
        if self.storage.max_chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        Ok(dir)
    }
}

/// Create the data directory if needed and make sure files can be created in it.
pub async fn probe_data_dir(dir: &Path) -> Result<(), ConfigError> {
    let not_writable = |source| ConfigError::NotWritable {
        path: dir.to_path_buf(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(not_writable)?;
    let probe = dir.join(WRITE_PROBE_FILE);
    tokio::fs::write(&probe, b"").await.map_err(not_writable)?;
    tokio::fs::remove_file(&probe).await.map_err(not_writable)?;
    Ok(())
}
