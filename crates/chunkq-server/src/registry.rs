//! Category Registry - One Chunk Store per Category
//!
//! `CategoryRegistry` maps category names to their [`ChunkStore`], creating
//! the category directory and the store on first reference and reusing the
//! same instance for the rest of the process lifetime.
//!
//! ```text
//! data/
//! ├── numbers/        ChunkStore("numbers")
//! │   ├── moscow-chunk0
//! │   └── moscow-chunk1
//! └── events/         ChunkStore("events")
//!     └── moscow-chunk0
//! ```
//!
//! ## Thread Safety
//!
//! - The map is an `RwLock<HashMap>`: lookups take the read lock, only the
//!   first reference to a category takes the write lock
//! - The lock is released before any store operation runs, so categories
//!   never serialize on each other
//! - Each store serializes its own writes

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chunkq_core::{validate_category, validate_chunk_name, Chunk, RECORD_TERMINATOR};
use chunkq_storage::{ChunkStore, StorageConfig, StorageHooks};
use tokio::io::AsyncWrite;
use tokio::sync::RwLock;

use crate::error::ApiError;

/// Type alias for the store map to reduce type complexity
type StoreMap = RwLock<HashMap<String, Arc<ChunkStore>>>;

pub struct CategoryRegistry {
    /// Root directory; each category is a subdirectory
    data_dir: PathBuf,

    /// Instance name used in the chunk names this process creates
    instance: String,

    hooks: Arc<dyn StorageHooks>,
    config: StorageConfig,
    stores: StoreMap,
}

impl CategoryRegistry {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        instance: impl Into<String>,
        hooks: Arc<dyn StorageHooks>,
        config: StorageConfig,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            instance: instance.into(),
            hooks,
            config,
            stores: RwLock::new(HashMap::new()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Get the store for `category`, creating it if it doesn't exist.
    pub async fn store(&self, category: &str) -> Result<Arc<ChunkStore>, ApiError> {
        validate_category(category).map_err(|_| ApiError::InvalidCategory(category.to_string()))?;

        // Fast path: read lock
        {
            let stores = self.stores.read().await;
            if let Some(store) = stores.get(category) {
                return Ok(Arc::clone(store));
            }
        }

        let mut stores = self.stores.write().await;

        // Double-check in case another task created it while we waited
        if let Some(store) = stores.get(category) {
            return Ok(Arc::clone(store));
        }

        let dir = self.data_dir.join(category);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| ApiError::CategoryDir {
                category: category.to_string(),
                source,
            })?;

        let store = Arc::new(
            ChunkStore::open(
                dir,
                category,
                self.instance.as_str(),
                Arc::clone(&self.hooks),
                self.config.clone(),
            )
            .await?,
        );
        stores.insert(category.to_string(), Arc::clone(&store));

        tracing::info!(category = %category, "Category store created");
        Ok(store)
    }

    /// Append whole records to `category`.
    pub async fn write(&self, category: &str, data: &[u8]) -> Result<(), ApiError> {
        let store = self.store(category).await?;
        if data.last().is_some_and(|&b| b != RECORD_TERMINATOR) {
            return Err(ApiError::IncompleteRecord);
        }
        store.write(data).await?;
        Ok(())
    }

    /// Framed read of `chunk` in `category` into `sink`.
    pub async fn read<W>(
        &self,
        category: &str,
        chunk: &str,
        offset: u64,
        max_size: u64,
        sink: &mut W,
    ) -> Result<u64, ApiError>
    where
        W: AsyncWrite + Unpin,
    {
        let store = self.store(category).await?;
        check_chunk_param(chunk)?;
        Ok(store.read(chunk, offset, max_size, sink).await?)
    }

    /// Acknowledge `chunk` in `category` as processed up to `size` bytes.
    pub async fn ack(&self, category: &str, chunk: &str, size: u64) -> Result<(), ApiError> {
        let store = self.store(category).await?;
        check_chunk_param(chunk)?;
        store.ack(chunk, size).await?;
        Ok(())
    }

    pub async fn list_chunks(&self, category: &str) -> Result<Vec<Chunk>, ApiError> {
        let store = self.store(category).await?;
        Ok(store.list_chunks().await?)
    }

    /// Number of categories referenced so far.
    pub async fn len(&self) -> usize {
        self.stores.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn check_chunk_param(chunk: &str) -> Result<(), ApiError> {
    if chunk.is_empty() {
        return Err(ApiError::missing("chunk"));
    }
    validate_chunk_name(chunk).map_err(|e| ApiError::BadParameter {
        param: "chunk",
        reason: e.to_string(),
    })
}
