//! Chunk Store - One Category's Chunked Log
//!
//! `ChunkStore` owns a category directory and everything in it:
//!
//! ```text
//! data/numbers/
//! ├── moscow-chunk0     complete, waiting for an ack
//! ├── moscow-chunk1     complete
//! └── moscow-chunk2     open: the only chunk accepting writes
//! ```
//!
//! ## Write path
//!
//! Writes are serialized by the write lock. When no chunk is open, or the
//! append would push the open chunk past `max_chunk_size`, the store rotates:
//! it names the next chunk, asks the replication hooks for permission, and
//! only then creates the file exclusively. An append that has started always
//! runs to completion, even if the caller goes away; a failed append is cut
//! back off the file. The file's presence and length are
//! the whole on-disk state, so a restart only needs to find the highest chunk
//! index of this instance to continue without reusing a name.
//!
//! ## Read path
//!
//! Reads take the descriptor cache lock for the handle lookup only, never the
//! write lock, so tailing the open chunk does not stall producers. A read
//! returns bytes up to the last complete record inside its window and never
//! waits for more data.
//!
//! ## Ack
//!
//! Deleting a chunk requires that it is closed and that the caller processed
//! at least as many bytes as the file holds.

use std::cmp::Ordering;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chunkq_core::{cut_to_last_message, validate_chunk_name, Chunk, ChunkName};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::handles::{AccessMode, HandleCache};
use crate::hooks::StorageHooks;

/// State guarded by the write lock.
struct WriteState {
    /// Chunk accepting writes, if one was created by this process
    open_chunk: Option<String>,

    /// Bytes appended to the open chunk
    open_chunk_size: u64,

    /// Index used for the next rotation
    next_index: u64,
}

/// Chunked append-only log of one category.
pub struct ChunkStore {
    dir: PathBuf,
    category: String,
    instance: String,
    config: StorageConfig,
    hooks: Arc<dyn StorageHooks>,

    write_state: Mutex<WriteState>,
    handles: HandleCache,
}

impl std::fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStore")
            .field("dir", &self.dir)
            .field("category", &self.category)
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

impl ChunkStore {
    /// Open the store for `category` in `dir`.
    ///
    /// The directory must exist. Chunks already in it stay readable and
    /// ackable; new chunks continue after the highest index of `instance`.
    pub async fn open(
        dir: impl Into<PathBuf>,
        category: impl Into<String>,
        instance: impl Into<String>,
        hooks: Arc<dyn StorageHooks>,
        config: StorageConfig,
    ) -> Result<Self> {
        let dir = dir.into();
        let category = category.into();
        let instance = instance.into();

        let next_index = scan_next_index(&dir, &instance).await?;

        info!(
            category = %category,
            dir = %dir.display(),
            next_index = next_index,
            "Chunk store opened"
        );

        Ok(Self {
            handles: HandleCache::new(dir.clone()),
            dir,
            category,
            instance,
            config,
            hooks,
            write_state: Mutex::new(WriteState {
                open_chunk: None,
                open_chunk_size: 0,
                next_index,
            }),
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Name of the chunk currently accepting writes.
    pub async fn open_chunk(&self) -> Option<String> {
        self.write_state.lock().await.open_chunk.clone()
    }

    /// Index the next rotation will use.
    pub async fn next_chunk_index(&self) -> u64 {
        self.write_state.lock().await.next_index
    }

    /// Append `data` to the open chunk, rotating first if needed.
    ///
    /// `data` should hold whole records; the store appends it as is.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut state = self.write_state.lock().await;
        let len = data.len() as u64;

        let chunk = match state.open_chunk.clone() {
            Some(chunk) if state.open_chunk_size + len <= self.config.max_chunk_size => chunk,
            _ => self.rotate(&mut state).await?,
        };

        let handle = match self.handles.get(&chunk, AccessMode::Write).await {
            Ok(handle) => handle,
            Err(e) => {
                // Never retry a name that could not be created.
                state.open_chunk = None;
                return Err(e);
            }
        };
        // The append runs in its own task holding the file lock, so dropping
        // this future never leaves half a record for the next write to extend.
        let file = handle.lock_owned().await;
        let start = state.open_chunk_size;
        state.open_chunk_size = start + len;
        let owned = data.to_vec();
        let sync = self.config.sync_on_write;
        let appended = tokio::spawn(async move {
            let mut file = file;
            let result = append(&mut file, &owned, sync).await;
            let rolled_back = result.is_err() && file.set_len(start).await.is_ok();
            (result, rolled_back)
        })
        .await;

        let (result, rolled_back) = match appended {
            Ok(outcome) => outcome,
            Err(join_error) => (Err(std::io::Error::other(join_error)), false),
        };
        if let Err(source) = result {
            if rolled_back {
                state.open_chunk_size = start;
            } else {
                warn!(
                    category = %self.category,
                    chunk = %chunk,
                    "Failed append left a partial record; retiring chunk"
                );
                state.open_chunk = None;
            }
            return Err(Error::io(format!("write {:?}", chunk))(source));
        }

        debug!(
            category = %self.category,
            chunk = %chunk,
            bytes = len,
            chunk_size = state.open_chunk_size,
            "Appended to chunk"
        );
        Ok(())
    }

    /// Name the next chunk and get the hooks' approval for it.
    ///
    /// The index is consumed even if the hooks refuse, so a name the hooks
    /// have seen is never handed out twice.
    async fn rotate(&self, state: &mut WriteState) -> Result<String> {
        let chunk = ChunkName::new(&self.instance, state.next_index).to_string();
        state.next_index += 1;

        if let Err(source) = self.hooks.before_creating_chunk(&self.category, &chunk).await {
            warn!(
                category = %self.category,
                chunk = %chunk,
                error = %source,
                "Replication hook rejected new chunk"
            );
            return Err(Error::Hook { chunk, source });
        }

        info!(
            category = %self.category,
            chunk = %chunk,
            previous = ?state.open_chunk,
            "Rotating to new chunk"
        );
        state.open_chunk = Some(chunk.clone());
        state.open_chunk_size = 0;
        Ok(chunk)
    }

    /// Copy up to `max_size` bytes of `chunk` starting at `offset` into
    /// `sink`, cut at the last complete record.
    ///
    /// Returns the number of bytes written to `sink`; zero means there is
    /// nothing new yet.
    pub async fn read<W>(&self, chunk: &str, offset: u64, max_size: u64, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        validate_chunk_name(chunk)?;

        let path = self.dir.join(chunk);
        let file_len = fs::metadata(&path)
            .await
            .map_err(|source| Error::ChunkNotFound {
                chunk: chunk.to_string(),
                source,
            })?
            .len();

        if offset >= file_len || max_size == 0 {
            return Ok(0);
        }

        let window = max_size
            .min(file_len - offset)
            .min(self.config.max_read_size) as usize;

        let handle = self.handles.get(chunk, AccessMode::Read).await?;
        let mut buf = vec![0u8; window];
        let n = {
            let mut file = handle.lock().await;
            read_at(&mut file, offset, &mut buf)
                .await
                .map_err(Error::io(format!("read {:?} at {}", chunk, offset)))?
        };

        if n == 0 {
            return Ok(0);
        }

        let complete = match cut_to_last_message(&buf[..n]) {
            Ok((complete, _)) => complete,
            // A record still being appended at the end of the file.
            Err(_) if offset + n as u64 >= file_len => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        sink.write_all(complete)
            .await
            .map_err(Error::io("write read result"))?;

        Ok(complete.len() as u64)
    }

    /// Delete `chunk` once the caller processed all `processed_size` bytes
    /// of it.
    pub async fn ack(&self, chunk: &str, processed_size: u64) -> Result<()> {
        validate_chunk_name(chunk)?;

        if self.is_open_chunk(chunk).await {
            return Err(Error::AckOpenChunk(chunk.to_string()));
        }

        let path = self.dir.join(chunk);
        let size = fs::metadata(&path)
            .await
            .map_err(|source| Error::ChunkNotFound {
                chunk: chunk.to_string(),
                source,
            })?
            .len();

        if size > processed_size {
            return Err(Error::NotFullyProcessed {
                chunk: chunk.to_string(),
                processed: processed_size,
                size,
            });
        }

        fs::remove_file(&path)
            .await
            .map_err(Error::io(format!("removing {:?}", chunk)))?;
        self.handles.forget(chunk).await;

        info!(category = %self.category, chunk = chunk, size = size, "Chunk acknowledged and deleted");
        Ok(())
    }

    /// List the chunks of this category, oldest first.
    pub async fn list_chunks(&self) -> Result<Vec<Chunk>> {
        let open_chunk = self.open_chunk().await;

        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(Error::io(format!("readdir {}", self.dir.display())))?;

        let mut chunks = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(Error::io("reading directory"))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if ChunkName::parse(&name).is_none() {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // Acked between readdir and stat.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::io("reading directory")(e)),
            };
            if !metadata.is_file() {
                continue;
            }

            chunks.push(Chunk {
                complete: open_chunk.as_deref() != Some(name.as_str()),
                size: metadata.len(),
                name,
            });
        }

        chunks.sort_by(|a, b| compare_chunk_names(&a.name, &b.name));
        Ok(chunks)
    }

    async fn is_open_chunk(&self, chunk: &str) -> bool {
        self.write_state.lock().await.open_chunk.as_deref() == Some(chunk)
    }
}

/// Order chunks by index, then by name so the order is total.
fn compare_chunk_names(a: &str, b: &str) -> Ordering {
    match (ChunkName::parse(a), ChunkName::parse(b)) {
        (Some(x), Some(y)) => x.index.cmp(&y.index).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

/// Index following the highest chunk of `instance` in `dir`.
async fn scan_next_index(dir: &Path, instance: &str) -> Result<u64> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(Error::io(format!("readdir {}", dir.display())))?;

    let mut next_index = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(Error::io(format!("readdir {}", dir.display())))?
    {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some(index) = ChunkName::parse_for_instance(name, instance) {
            next_index = next_index.max(index + 1);
        }
    }

    Ok(next_index)
}

async fn append(file: &mut File, data: &[u8], sync: bool) -> std::io::Result<()> {
    file.write_all(data).await?;
    file.flush().await?;
    if sync {
        file.sync_data().await?;
    }
    Ok(())
}

/// Fill `buf` from `offset`, stopping early only at end of file.
async fn read_at(file: &mut File, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
    file.seek(SeekFrom::Start(offset)).await?;

    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
