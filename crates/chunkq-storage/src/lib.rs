//! chunkq Storage Layer
//!
//! This crate implements the on-disk storage engine: one [`ChunkStore`] per
//! category, each owning a directory of append-only chunk files.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────┐
//! │  Producers  │
//! └──────┬──────┘
//!        │ newline-terminated records
//!        ▼
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │ ChunkStore::write    │─────►│ StorageHooks         │
//! │ - single writer      │      │ before_creating_chunk│
//! │ - rotates at 20MiB   │◄─────│ (veto / backpressure)│
//! └────────┬─────────────┘      └──────────────────────┘
//!          │ append
//!          ▼
//! ┌──────────────────────┐
//! │ <dir>/<instance>-    │
//! │        chunk<N>      │
//! └────────┬─────────────┘
//!          │ framed reads
//!          ▼
//! ┌──────────────────────┐
//! │ ChunkStore::read     │  never returns a partial record
//! │ ChunkStore::ack      │  deletes fully processed chunks
//! └────────┬─────────────┘
//!          ▼
//! ┌─────────────┐
//! │  Consumers  │
//! └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use chunkq_storage::{ChunkStore, NoopHooks, StorageConfig};
//!
//! let store = ChunkStore::open(
//!     "./data/numbers",
//!     "numbers",
//!     "moscow",
//!     Arc::new(NoopHooks),
//!     StorageConfig::default(),
//! )
//! .await?;
//!
//! store.write(b"1\n2\n3\n").await?;
//!
//! for chunk in store.list_chunks().await? {
//!     let mut buf = Vec::new();
//!     store.read(&chunk.name, 0, chunk.size, &mut buf).await?;
//!     if chunk.complete {
//!         store.ack(&chunk.name, chunk.size).await?;
//!     }
//! }
//! ```

pub mod config;
pub mod error;
mod handles;
pub mod hooks;
pub mod store;

pub use chunkq_core::Chunk;
pub use config::StorageConfig;
pub use error::{Error, Result};
pub use hooks::{ChannelHooks, ChunkCreated, HookError, NoopHooks, StorageHooks};
pub use store::ChunkStore;
