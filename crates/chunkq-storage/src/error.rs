//! Storage Error Types
//!
//! Every storage operation returns `Result<T>`, aliased to
//! `Result<T, Error>`, and fails synchronously: the engine never retries.
//!
//! ## Error Categories
//!
//! ### Caller errors
//! - `InvalidName`: chunk name is not a single path component
//! - `ChunkNotFound`: the chunk file does not exist (stat failed)
//! - `AckOpenChunk`: attempted to delete the chunk still accepting writes
//! - `NotFullyProcessed`: ack size is smaller than the file on disk
//! - `Framing`: the read window cannot hold a single record
//!
//! ### Engine errors
//! - `ChunkExists`: exclusive creation found a file with the same name
//! - `Hook`: the replication hook vetoed a new chunk
//! - `Io`: any other file system failure

use std::io;

use chunkq_core::{FramingError, NameError};
use thiserror::Error;

use crate::hooks::HookError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidName(#[from] NameError),

    #[error("stat {chunk:?}: {source}")]
    ChunkNotFound {
        chunk: String,
        #[source]
        source: io::Error,
    },

    #[error("chunk {0:?} already exists on disk")]
    ChunkExists(String),

    #[error("could not delete incomplete chunk {0:?}")]
    AckOpenChunk(String),

    #[error("chunk {chunk:?} was not fully processed: the supplied processed size {processed} is smaller than the chunk file size {size}")]
    NotFullyProcessed {
        chunk: String,
        processed: u64,
        size: u64,
    },

    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error("before creating chunk {chunk:?}: {source}")]
    Hook {
        chunk: String,
        #[source]
        source: HookError,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| Error::Io { context, source }
    }
}
