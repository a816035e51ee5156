//! Chunks
//!
//! A chunk is one append-only file segment of a category's log. Its file name
//! is `<instance>-chunk<N>`: `instance` names the server that created it and
//! `N` is a per-instance index that only ever grows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A chunk as reported by a listing.
///
/// `complete` is false only for the chunk currently accepting writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub name: String,
    pub complete: bool,
    pub size: u64,
}

/// Parsed form of a `<instance>-chunk<N>` file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkName {
    pub instance: String,
    pub index: u64,
}

impl ChunkName {
    const MARKER: &'static str = "-chunk";

    pub fn new(instance: impl Into<String>, index: u64) -> Self {
        Self {
            instance: instance.into(),
            index,
        }
    }

    /// Parse a file name. Returns `None` for anything that is not a chunk.
    pub fn parse(file_name: &str) -> Option<Self> {
        let pos = file_name.rfind(Self::MARKER)?;
        let (instance, rest) = file_name.split_at(pos);
        let digits = &rest[Self::MARKER.len()..];
        if instance.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let index = digits.parse().ok()?;
        Some(Self::new(instance, index))
    }

    /// Parse a file name, accepting it only if it belongs to `instance`.
    pub fn parse_for_instance(file_name: &str, instance: &str) -> Option<u64> {
        Self::parse(file_name)
            .filter(|name| name.instance == instance)
            .map(|name| name.index)
    }
}

impl fmt::Display for ChunkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.instance, Self::MARKER, self.index)
    }
}
