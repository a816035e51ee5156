//! chunkq core types
//!
//! Everything in this crate is shared between the storage engine, the HTTP
//! server and the clients:
//!
//! - [`framing`]: cutting a byte window at the last complete record
//! - [`chunk`]: the `Chunk` listing type and `<instance>-chunk<N>` names
//! - [`names`]: validation of category and chunk names
//!
//! A record is any sequence of bytes terminated by `\n`. Consumers must only
//! ever see whole records, so every component that hands a bounded window of
//! bytes to a consumer runs it through [`framing::cut_to_last_message`].

pub mod chunk;
pub mod error;
pub mod framing;
pub mod names;

pub use chunk::{Chunk, ChunkName};
pub use error::{FramingError, NameError};
pub use framing::{cut_to_last_message, records, RECORD_TERMINATOR};
pub use names::{validate_category, validate_chunk_name};
