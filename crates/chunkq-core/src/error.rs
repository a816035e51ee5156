//! Error types shared across chunkq crates.
//!
//! Framing errors are not transient: [`FramingError::FrameTooLarge`] means the
//! caller's buffer cannot hold a single record and must be grown before
//! retrying. Name errors are caller mistakes and map to bad requests at the
//! transport boundary.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("the buffer of {buffer_len} bytes is too small to contain a single message")]
    FrameTooLarge { buffer_len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("invalid category name {0:?}")]
    InvalidCategory(String),

    #[error("invalid chunk name {0:?}")]
    InvalidChunk(String),
}
