//! Storage Configuration
//!
//! ## StorageConfig
//!
//! - **max_chunk_size**: rotate to a new chunk when an append would grow the
//!   open chunk past this size (default: 20MiB)
//! - **max_read_size**: upper bound on the bytes a single read allocates,
//!   whatever `max_size` the caller asks for (default: 16MiB)
//! - **sync_on_write**: `fdatasync` the open chunk after every append
//!   (default: false, the page cache is trusted)
//!
//! ```ignore
//! use chunkq_storage::StorageConfig;
//!
//! // Small chunks for tests
//! let config = StorageConfig {
//!     max_chunk_size: 1024,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Maximum chunk size in bytes before rotating (default: 20MiB)
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u64,

    /// Maximum number of bytes returned by a single read (default: 16MiB)
    #[serde(default = "default_max_read_size")]
    pub max_read_size: u64,

    /// Sync file data to disk after each write (default: false)
    #[serde(default)]
    pub sync_on_write: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            max_read_size: default_max_read_size(),
            sync_on_write: false,
        }
    }
}

fn default_max_chunk_size() -> u64 {
    20 * 1024 * 1024 // 20MiB
}

fn default_max_read_size() -> u64 {
    16 * 1024 * 1024 // 16MiB
}
