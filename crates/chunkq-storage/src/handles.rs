//! Descriptor cache
//!
//! One file handle per chunk, opened on first use and shared by every later
//! read or write of that chunk. Handles are evicted exactly when their chunk
//! is acked and deleted.
//!
//! Write handles are opened with `create_new` so an existing file is never
//! reused for a new chunk, and in append mode so a reader seeking the same
//! handle never moves the write position.
//!
//! The cache lock is only held for the lookup, the open and the insert. I/O
//! on a handle happens under the handle's own mutex.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

pub(crate) type SharedFile = Arc<Mutex<File>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AccessMode {
    Read,
    Write,
}

struct CachedHandle {
    file: SharedFile,
    writable: bool,
}

pub(crate) struct HandleCache {
    dir: PathBuf,
    handles: Mutex<HashMap<String, CachedHandle>>,
}

impl HandleCache {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the cached handle for `chunk`, opening it if needed.
    ///
    /// Asking for a write handle when the file already exists (cached as a
    /// read handle or found on disk) is a naming collision.
    pub(crate) async fn get(&self, chunk: &str, mode: AccessMode) -> Result<SharedFile> {
        let mut handles = self.handles.lock().await;

        if let Some(cached) = handles.get(chunk) {
            if mode == AccessMode::Write && !cached.writable {
                return Err(Error::ChunkExists(chunk.to_string()));
            }
            return Ok(Arc::clone(&cached.file));
        }

        let path = self.dir.join(chunk);
        let opened = match mode {
            AccessMode::Read => File::open(&path).await,
            AccessMode::Write => {
                OpenOptions::new()
                    .read(true)
                    .append(true)
                    .create_new(true)
                    .open(&path)
                    .await
            }
        };

        let file = opened.map_err(|source| match source.kind() {
            ErrorKind::AlreadyExists => Error::ChunkExists(chunk.to_string()),
            ErrorKind::NotFound => Error::ChunkNotFound {
                chunk: chunk.to_string(),
                source,
            },
            _ => Error::Io {
                context: format!("open {}", path.display()),
                source,
            },
        })?;

        debug!(chunk = chunk, mode = ?mode, "Opened chunk file");

        let file = Arc::new(Mutex::new(file));
        handles.insert(
            chunk.to_string(),
            CachedHandle {
                file: Arc::clone(&file),
                writable: mode == AccessMode::Write,
            },
        );
        Ok(file)
    }

    /// Drop the cached handle. The file closes once in-flight users let go.
    pub(crate) async fn forget(&self, chunk: &str) -> bool {
        self.handles.lock().await.remove(chunk).is_some()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }
}
