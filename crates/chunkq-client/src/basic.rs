//! Single-stream in-memory client.
//!
//! `BasicClient` buffers everything sent to it and hands it back through
//! fixed-size receive windows, applying the same framing rule as the server:
//! a receive only returns whole records and holds back the partial record at
//! the end of the window for the next call.

use bytes::{Buf, BytesMut};
use chunkq_core::{cut_to_last_message, FramingError};

use crate::error::{ClientError, Result};

#[derive(Debug, Default)]
pub struct BasicClient {
    /// Bytes sent but not yet received
    pending: BytesMut,
    /// Partial record held back by the last receive
    rest: BytesMut,
}

impl BasicClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, records: &[u8]) {
        self.pending.extend_from_slice(records);
    }

    /// Fill `scratch` with the held-back bytes followed by pending bytes and
    /// return its complete-record prefix.
    ///
    /// Returns [`ClientError::NoNewData`] when no complete record is
    /// available yet, and a framing error when a single record does not fit
    /// `scratch`. Neither loses buffered bytes.
    pub fn receive<'s>(&mut self, scratch: &'s mut [u8]) -> Result<&'s [u8]> {
        let held = self.rest.len();
        if held > 0 && held >= scratch.len() {
            return Err(FramingError::FrameTooLarge {
                buffer_len: scratch.len(),
            }
            .into());
        }
        if self.pending.is_empty() {
            return Err(ClientError::NoNewData);
        }

        scratch[..held].copy_from_slice(&self.rest);
        let n = self.pending.len().min(scratch.len() - held);
        scratch[held..held + n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);

        let filled = held + n;
        let complete_len = match cut_to_last_message(&scratch[..filled]) {
            Ok((complete, remainder)) => {
                self.rest.clear();
                self.rest.extend_from_slice(remainder);
                complete.len()
            }
            Err(err) => {
                self.rest.clear();
                self.rest.extend_from_slice(&scratch[..filled]);
                if filled == scratch.len() {
                    return Err(err.into());
                }
                return Err(ClientError::NoNewData);
            }
        };

        Ok(&scratch[..complete_len])
    }
}
