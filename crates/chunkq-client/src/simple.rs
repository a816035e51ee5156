//! Category-aware HTTP client.
//!
//! `SimpleClient` writes records to a chunkq server and tails categories
//! with a read cursor per category.
//!
//! ## Cursor
//!
//! ```text
//! numbers/  moscow-chunk1 (complete)  moscow-chunk2 (open)
//!           ^ cursor: chunk=moscow-chunk1, offset=24
//! ```
//!
//! - No cursor yet: the oldest listed chunk is selected at offset 0
//! - A batch is read at the cursor, every record is handed to the callback,
//!   and the offset advances by the batch size only once all records succeed
//! - An empty read of a complete chunk means it is drained: the chunk is
//!   acknowledged with the processed size and the cursor moves on
//! - An empty read of the open chunk means the consumer is caught up, unless
//!   the listing shows the chunk grew since it was last listed
//!
//! Each category has its own cursor lock, so categories are processed
//! independently on one client.
//!
//! Delivery is at least once: a failing callback gets the whole batch again.
//!
//! ## Examples
//!
//! ```ignore
//! use chunkq_client::{RecordError, SimpleClient};
//!
//! let client = SimpleClient::new(vec!["http://127.0.0.1:8080".to_string()])?;
//! client.send("numbers", "1\n2\n3\n").await?;
//!
//! let (done_tx, done_rx) = tokio::sync::watch::channel(true);
//! let mut scratch = Vec::with_capacity(64 * 1024);
//! client
//!     .process_until("numbers", &mut scratch, &done_rx, |record| {
//!         println!("{}", String::from_utf8_lossy(record));
//!         Ok::<(), RecordError>(())
//!     })
//!     .await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chunkq_core::{records, Chunk, RECORD_TERMINATOR};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::error::{ClientError, RecordError, Result};
use crate::retry::{retry_with_jittered_backoff, PollBackoff, RetryPolicy};

/// Read window used when `process` gets a scratch buffer without capacity.
pub const DEFAULT_SCRATCH_SIZE: usize = 64 * 1024;

/// Number of records handed to the callback by one `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Processed(pub usize);

#[derive(Debug, Clone)]
struct ReadCursor {
    /// Server the chunk lives on
    addr: String,
    chunk: String,
    complete: bool,
    offset: u64,
    /// Chunk size in the listing that preceded the latest read
    listed_size: u64,
}

type CursorSlot = Arc<Mutex<Option<ReadCursor>>>;

enum Step {
    Processed(usize),
    CaughtUp,
    /// The chunk was acknowledged; select the next one
    ChunkDone,
    /// The chunk grew since it was last listed
    Reread,
}

#[derive(Serialize)]
struct ReadQuery<'a> {
    category: &'a str,
    chunk: &'a str,
    off: u64,
    #[serde(rename = "maxSize")]
    max_size: u64,
}

#[derive(Serialize)]
struct AckQuery<'a> {
    category: &'a str,
    chunk: &'a str,
    size: u64,
}

/// Builder for [`SimpleClient`].
#[derive(Debug, Clone)]
pub struct SimpleClientBuilder {
    addrs: Vec<String>,
    retry_policy: RetryPolicy,
    poll_backoff: PollBackoff,
    request_timeout: Duration,
}

impl Default for SimpleClientBuilder {
    fn default() -> Self {
        Self {
            addrs: Vec::new(),
            retry_policy: RetryPolicy::default(),
            poll_backoff: PollBackoff::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl SimpleClientBuilder {
    /// Server base URLs, e.g. `http://127.0.0.1:8080`.
    pub fn addrs(mut self, addrs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.addrs = addrs.into_iter().map(Into::into).collect();
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Wait schedule of `process_until` while caught up.
    pub fn poll_backoff(mut self, poll: PollBackoff) -> Self {
        self.poll_backoff = poll;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<SimpleClient> {
        if self.addrs.is_empty() {
            return Err(ClientError::Config("at least one address is required".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(SimpleClient {
            addrs: self
                .addrs
                .into_iter()
                .map(|a| a.trim_end_matches('/').to_string())
                .collect(),
            http,
            retry_policy: self.retry_policy,
            poll_backoff: self.poll_backoff,
            next_addr: AtomicUsize::new(0),
            cursors: Mutex::new(HashMap::new()),
        })
    }
}

pub struct SimpleClient {
    addrs: Vec<String>,
    http: reqwest::Client,
    retry_policy: RetryPolicy,
    poll_backoff: PollBackoff,
    next_addr: AtomicUsize,
    cursors: Mutex<HashMap<String, CursorSlot>>,
}

impl SimpleClient {
    pub fn builder() -> SimpleClientBuilder {
        SimpleClientBuilder::default()
    }

    /// Client with default retry and polling settings.
    pub fn new(addrs: Vec<String>) -> Result<Self> {
        Self::builder().addrs(addrs).build()
    }

    /// Round robin over the configured addresses.
    fn pick_addr(&self) -> &str {
        let idx = self.next_addr.fetch_add(1, Ordering::Relaxed) % self.addrs.len();
        &self.addrs[idx]
    }

    /// Current `(chunk, offset)` of the read cursor for `category`.
    pub async fn cursor(&self, category: &str) -> Option<(String, u64)> {
        let slot = self.cursors.lock().await.get(category).cloned()?;
        let cursor = slot.lock().await;
        cursor.as_ref().map(|c| (c.chunk.clone(), c.offset))
    }

    async fn cursor_slot(&self, category: &str) -> CursorSlot {
        let mut cursors = self.cursors.lock().await;
        Arc::clone(cursors.entry(category.to_string()).or_default())
    }

    /// Append `data` to `category`. `data` must consist of whole records.
    pub async fn send(&self, category: &str, data: impl Into<Bytes>) -> Result<()> {
        let body: Bytes = data.into();
        let url = format!("{}/write", self.pick_addr());

        retry_with_jittered_backoff(&self.retry_policy, || {
            let request = self
                .http
                .post(&url)
                .query(&[("category", category)])
                .body(body.clone());
            let url = &url;
            async move {
                let response = request.send().await.map_err(|e| http_error(url, e))?;
                check_status(response).await.map(|_| ())
            }
        })
        .await?;

        debug!(category = %category, bytes = body.len(), "Sent");
        Ok(())
    }

    /// Process the next batch of `category`.
    ///
    /// Reads at most `scratch.capacity()` bytes at the cursor and calls
    /// `on_record` for every record, terminator stripped. Returns
    /// [`ClientError::NoNewData`] when there is nothing past the cursor. If
    /// `on_record` fails the cursor stays where it was.
    pub async fn process<F>(
        &self,
        category: &str,
        scratch: &mut Vec<u8>,
        mut on_record: F,
    ) -> Result<Processed>
    where
        F: FnMut(&[u8]) -> std::result::Result<(), RecordError>,
    {
        if scratch.capacity() == 0 {
            scratch.reserve(DEFAULT_SCRATCH_SIZE);
        }
        let max_size = scratch.capacity() as u64;

        let slot = self.cursor_slot(category).await;
        let mut slot = slot.lock().await;
        loop {
            if slot.is_none() {
                *slot = self.oldest_chunk(category).await?;
            }
            let Some(cursor) = slot.as_mut() else {
                return Err(ClientError::NoNewData);
            };

            match self
                .step(cursor, category, scratch, max_size, &mut on_record)
                .await?
            {
                Step::Processed(n) => return Ok(Processed(n)),
                Step::CaughtUp => return Err(ClientError::NoNewData),
                Step::ChunkDone => {
                    *slot = None;
                }
                Step::Reread => {}
            }
        }
    }

    /// Process `category` until the producer reports it has finished and
    /// everything written before that has been processed.
    ///
    /// `finished` is checked before every attempt, so a `true` observed
    /// together with [`ClientError::NoNewData`] means nothing is left.
    /// Transient callback failures are retried right away; idle polls back
    /// off. Other errors end the loop.
    pub async fn process_until<F>(
        &self,
        category: &str,
        scratch: &mut Vec<u8>,
        finished: &watch::Receiver<bool>,
        mut on_record: F,
    ) -> Result<()>
    where
        F: FnMut(&[u8]) -> std::result::Result<(), RecordError>,
    {
        let mut poll = self.poll_backoff.clone();

        loop {
            let producer_done = *finished.borrow();

            match self.process(category, scratch, &mut on_record).await {
                Ok(_) => poll.reset(),
                Err(e) if e.is_transient_record() => {
                    debug!(category = %category, error = %e, "Retrying batch");
                }
                Err(ClientError::NoNewData) => {
                    if producer_done {
                        info!(category = %category, "Processing finished");
                        return Ok(());
                    }
                    poll.wait().await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn step<F>(
        &self,
        cursor: &mut ReadCursor,
        category: &str,
        scratch: &mut Vec<u8>,
        max_size: u64,
        on_record: &mut F,
    ) -> Result<Step>
    where
        F: FnMut(&[u8]) -> std::result::Result<(), RecordError>,
    {
        self.read_into(cursor, category, max_size, scratch).await?;

        if scratch.is_empty() {
            if !cursor.complete {
                let chunks = self.list_chunks_at(&cursor.addr, category).await?;
                let Some(listed) = chunks.iter().find(|c| c.name == cursor.chunk) else {
                    // Acknowledged by someone else.
                    return Ok(Step::ChunkDone);
                };
                cursor.complete = listed.complete;
                let grown = listed.size > cursor.listed_size;
                cursor.listed_size = listed.size;
                if grown && listed.size > cursor.offset {
                    return Ok(Step::Reread);
                }
                // Anything past the offset is a record still being appended.
                if !cursor.complete {
                    return Ok(Step::CaughtUp);
                }
            }

            self.ack_at(&cursor.addr, category, &cursor.chunk, cursor.offset)
                .await?;
            info!(
                category = %category,
                chunk = %cursor.chunk,
                size = cursor.offset,
                "Chunk processed"
            );
            return Ok(Step::ChunkDone);
        }

        let mut count = 0;
        for record in records(scratch) {
            let record = record.strip_suffix(&[RECORD_TERMINATOR]).unwrap_or(record);
            on_record(record)?;
            count += 1;
        }
        cursor.offset += scratch.len() as u64;

        Ok(Step::Processed(count))
    }

    async fn oldest_chunk(&self, category: &str) -> Result<Option<ReadCursor>> {
        let addr = self.pick_addr().to_string();
        let chunks = self.list_chunks_at(&addr, category).await?;

        // Listing is ordered by chunk index.
        Ok(chunks.into_iter().next().map(|chunk| {
            debug!(category = %category, chunk = %chunk.name, "Selected chunk");
            ReadCursor {
                addr,
                chunk: chunk.name,
                complete: chunk.complete,
                offset: 0,
                listed_size: chunk.size,
            }
        }))
    }

    /// List the chunks of `category` on the next server.
    pub async fn list_chunks(&self, category: &str) -> Result<Vec<Chunk>> {
        let addr = self.pick_addr().to_string();
        self.list_chunks_at(&addr, category).await
    }

    async fn list_chunks_at(&self, addr: &str, category: &str) -> Result<Vec<Chunk>> {
        let url = format!("{}/listChunks", addr);

        retry_with_jittered_backoff(&self.retry_policy, || {
            let request = self.http.get(&url).query(&[("category", category)]);
            let url = &url;
            async move {
                let response = request.send().await.map_err(|e| http_error(url, e))?;
                check_status(response)
                    .await?
                    .json::<Vec<Chunk>>()
                    .await
                    .map_err(|e| http_error(url, e))
            }
        })
        .await
    }

    async fn read_into(
        &self,
        cursor: &ReadCursor,
        category: &str,
        max_size: u64,
        scratch: &mut Vec<u8>,
    ) -> Result<()> {
        let url = format!("{}/read", cursor.addr);
        let query = ReadQuery {
            category,
            chunk: &cursor.chunk,
            off: cursor.offset,
            max_size,
        };

        let mut response = retry_with_jittered_backoff(&self.retry_policy, || {
            let request = self.http.get(&url).query(&query);
            let url = &url;
            async move {
                let response = request.send().await.map_err(|e| http_error(url, e))?;
                check_status(response).await
            }
        })
        .await?;

        scratch.clear();
        while let Some(bytes) = response.chunk().await.map_err(|e| http_error(&url, e))? {
            scratch.extend_from_slice(&bytes);
        }
        Ok(())
    }

    async fn ack_at(&self, addr: &str, category: &str, chunk: &str, size: u64) -> Result<()> {
        let url = format!("{}/ack", addr);
        let query = AckQuery {
            category,
            chunk,
            size,
        };

        retry_with_jittered_backoff(&self.retry_policy, || {
            let request = self.http.post(&url).query(&query);
            let url = &url;
            async move {
                let response = request.send().await.map_err(|e| http_error(url, e))?;
                check_status(response).await.map(|_| ())
            }
        })
        .await
    }
}

fn http_error(url: &str, source: reqwest::Error) -> ClientError {
    ClientError::Http {
        url: url.to_string(),
        source,
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ClientError::Server { status, message })
}
