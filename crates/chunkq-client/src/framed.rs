//! Record framing over an async byte stream.
//!
//! `FrameReader` applies the hold-back rule of [`crate::BasicClient`] to any
//! [`AsyncRead`]: each call returns whole records only, carrying a trailing
//! partial record over to the next call.

use bytes::BytesMut;
use chunkq_core::{cut_to_last_message, FramingError};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

pub struct FrameReader<R> {
    inner: R,
    rest: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            rest: BytesMut::new(),
        }
    }

    /// Read the next run of complete records into `scratch`.
    ///
    /// Returns `Ok(None)` at end of stream. Bytes of an unterminated final
    /// record stay available through [`FrameReader::remainder`].
    pub async fn next_records<'s>(&mut self, scratch: &'s mut [u8]) -> Result<Option<&'s [u8]>> {
        let complete_len = loop {
            let held = self.rest.len();
            if held >= scratch.len() {
                return Err(FramingError::FrameTooLarge {
                    buffer_len: scratch.len(),
                }
                .into());
            }

            scratch[..held].copy_from_slice(&self.rest);
            let n = self.inner.read(&mut scratch[held..]).await?;
            if n == 0 {
                return Ok(None);
            }

            let filled = held + n;
            match cut_to_last_message(&scratch[..filled]) {
                Ok((complete, remainder)) => {
                    self.rest.clear();
                    self.rest.extend_from_slice(remainder);
                    break complete.len();
                }
                Err(_) => {
                    // No terminator yet; keep reading behind what we have.
                    self.rest.clear();
                    self.rest.extend_from_slice(&scratch[..filled]);
                }
            }
        };

        Ok(Some(&scratch[..complete_len]))
    }

    /// Bytes of the record currently being assembled.
    pub fn remainder(&self) -> &[u8] {
        &self.rest
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_records_split_across_reads() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(rx);
        let mut scratch = [0u8; 32];

        tx.write_all(b"100\n10").await.unwrap();
        assert_eq!(reader.next_records(&mut scratch).await.unwrap(), Some(&b"100\n"[..]));
        assert_eq!(reader.remainder(), b"10");

        tx.write_all(b"0\n7\n").await.unwrap();
        assert_eq!(reader.next_records(&mut scratch).await.unwrap(), Some(&b"100\n7\n"[..]));

        drop(tx);
        assert_eq!(reader.next_records(&mut scratch).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unterminated_tail_at_end_of_stream() {
        let mut reader = FrameReader::new(&b"1\n2\n3"[..]);
        let mut scratch = [0u8; 16];

        assert_eq!(reader.next_records(&mut scratch).await.unwrap(), Some(&b"1\n2\n"[..]));
        assert_eq!(reader.next_records(&mut scratch).await.unwrap(), None);
        assert_eq!(reader.remainder(), b"3");
    }

    #[tokio::test]
    async fn test_record_larger_than_scratch() {
        let mut reader = FrameReader::new(&b"1234567890\n"[..]);
        let mut scratch = [0u8; 4];

        let err = reader.next_records(&mut scratch).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Framing(FramingError::FrameTooLarge { buffer_len: 4 })
        ));
    }
}
