//! Error types for chunkq client operations.
//!
//! ## Error Handling Strategy
//!
//! - **Caught up**: `NoNewData` is returned by `process` when there is nothing
//!   past the cursor. It is a polling signal, not a failure.
//! - **Retryable**: connection failures, timeouts and 502/503/504 responses
//!   (see [`ClientError::is_retryable`])
//! - **Record callbacks**: `Record(RecordError::Transient)` leaves the cursor
//!   where it was so the same batch is delivered again
//! - **Fatal**: everything else
//!
//! ## Examples
//!
//! ```ignore
//! use chunkq_client::{ClientError, RecordError};
//!
//! match client.process("numbers", &mut scratch, handle_record).await {
//!     Ok(processed) => println!("processed {:?}", processed),
//!     Err(ClientError::NoNewData) => tokio::time::sleep(poll).await,
//!     Err(ClientError::Record(RecordError::Transient(_))) => {}
//!     Err(e) => return Err(e),
//! }
//! ```

use chunkq_core::FramingError;
use reqwest::StatusCode;
use thiserror::Error;

/// Convenience type alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure reported by a record callback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Retry the same batch later; the cursor is not advanced.
    #[error("transient record failure: {0}")]
    Transient(String),

    /// Stop processing.
    #[error("record processing failed: {0}")]
    Fatal(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// Nothing to process past the cursor.
    #[error("no new data")]
    NoNewData,

    /// Request could not be sent or its response could not be read.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Server { status: StatusCode, message: String },

    /// A record does not fit the receive buffer.
    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Record(#[from] RecordError),

    /// Reading an underlying byte stream failed.
    #[error("stream read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether sending the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http { source, .. } => {
                source.is_connect() || source.is_timeout() || source.is_request()
            }
            ClientError::Server { status, .. } => matches!(
                *status,
                StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            ),
            _ => false,
        }
    }

    /// A transient record callback failure.
    pub fn is_transient_record(&self) -> bool {
        matches!(self, ClientError::Record(RecordError::Transient(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_status_retryability() {
        let unavailable = ClientError::Server {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "restarting".to_string(),
        };
        assert!(unavailable.is_retryable());

        let bad_request = ClientError::Server {
            status: StatusCode::BAD_REQUEST,
            message: "invalid category name \"..\"".to_string(),
        };
        assert!(!bad_request.is_retryable());

        let internal = ClientError::Server {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "disk full".to_string(),
        };
        assert!(!internal.is_retryable());
    }

    #[test]
    fn test_non_transport_errors_are_not_retryable() {
        assert!(!ClientError::NoNewData.is_retryable());
        assert!(!ClientError::Config("no addresses".to_string()).is_retryable());
        assert!(!ClientError::from(RecordError::Transient("busy".to_string())).is_retryable());
    }

    #[test]
    fn test_transient_record() {
        assert!(ClientError::from(RecordError::Transient("busy".to_string())).is_transient_record());
        assert!(!ClientError::from(RecordError::Fatal("bad".to_string())).is_transient_record());
        assert!(!ClientError::NoNewData.is_transient_record());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::Server {
            status: StatusCode::BAD_REQUEST,
            message: "bad `off` parameter: invalid digit found in string".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "server returned 400 Bad Request: bad `off` parameter: invalid digit found in string"
        );
    }
}
