//! chunkq Client - Producer and Consumer APIs
//!
//! - [`SimpleClient`]: writes to and tails categories of a chunkq server over
//!   HTTP, with a read cursor per category
//! - [`BasicClient`]: single-stream in-memory buffering with the same framing
//!   rule, for tests and embedding
//! - [`FrameReader`]: whole-record reads over any async byte stream
//!
//! # Examples
//!
//! ## Producer
//!
//! ```ignore
//! use chunkq_client::SimpleClient;
//!
//! let client = SimpleClient::new(vec!["http://127.0.0.1:8080".to_string()])?;
//! client.send("numbers", "1\n2\n3\n").await?;
//! ```
//!
//! ## Consumer
//!
//! ```ignore
//! use chunkq_client::{ClientError, RecordError, SimpleClient};
//!
//! let mut scratch = Vec::with_capacity(1024 * 1024);
//! loop {
//!     match client.process("numbers", &mut scratch, |record| handle(record)).await {
//!         Ok(_) => {}
//!         Err(ClientError::NoNewData) => tokio::time::sleep(poll_interval).await,
//!         Err(e) if e.is_transient_record() => {}
//!         Err(e) => return Err(e),
//!     }
//! }
//! ```

pub mod basic;
pub mod error;
pub mod framed;
pub mod retry;
pub mod simple;

pub use basic::BasicClient;
pub use error::{ClientError, RecordError, Result};
pub use framed::FrameReader;
pub use retry::{retry_with_jittered_backoff, PollBackoff, RetryPolicy};
pub use simple::{Processed, SimpleClient, SimpleClientBuilder, DEFAULT_SCRATCH_SIZE};
