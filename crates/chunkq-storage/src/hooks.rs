//! Replication hooks
//!
//! The storage engine knows nothing about peers or consensus. It exposes a
//! single extension point, [`StorageHooks::before_creating_chunk`], which is
//! awaited while the category's write lock is held and before the new chunk
//! file exists:
//!
//! ```text
//! write() ──lock──► rotate? ──yes──► hooks.before_creating_chunk(category, chunk)
//!                                         │ Ok                 │ Err
//!                                         ▼                    ▼
//!                                   create chunk file     write fails,
//!                                   append bytes          nothing on disk
//! ```
//!
//! A slow hook backpressures writers of that category only. Dropping the
//! write future cancels the hook call along with it.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("chunk creation rejected: {0}")]
    Rejected(String),

    #[error("replication channel closed")]
    ChannelClosed,
}

/// Observe and possibly veto the creation of chunks.
#[async_trait]
pub trait StorageHooks: Send + Sync {
    async fn before_creating_chunk(&self, category: &str, chunk: &str) -> Result<(), HookError>;
}

/// Hooks for a single node without replication.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

#[async_trait]
impl StorageHooks for NoopHooks {
    async fn before_creating_chunk(&self, _category: &str, _chunk: &str) -> Result<(), HookError> {
        Ok(())
    }
}

/// Announcement of a chunk that is about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkCreated {
    pub category: String,
    pub chunk: String,
}

/// Publishes every chunk creation to a bounded channel.
///
/// A replication worker drains the receiver. When the channel is full the
/// writer waits; when the receiver is gone chunk creation is vetoed.
#[derive(Debug, Clone)]
pub struct ChannelHooks {
    tx: mpsc::Sender<ChunkCreated>,
}

impl ChannelHooks {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ChunkCreated>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl StorageHooks for ChannelHooks {
    async fn before_creating_chunk(&self, category: &str, chunk: &str) -> Result<(), HookError> {
        debug!(category = category, chunk = chunk, "Announcing new chunk");
        self.tx
            .send(ChunkCreated {
                category: category.to_string(),
                chunk: chunk.to_string(),
            })
            .await
            .map_err(|_| HookError::ChannelClosed)
    }
}
