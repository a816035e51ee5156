//! API error types
//!
//! Every failure of a request maps to one of two classes:
//!
//! - **400 Bad Request**: invalid category, missing or malformed request
//!   parameters, a write body that does not end with a record terminator
//! - **500 Internal Server Error**: anything the storage engine reports,
//!   including category directory creation failures
//!
//! The response body is the plain-text error message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid category name {0:?}")]
    InvalidCategory(String),

    #[error("bad `{param}` parameter: {reason}")]
    BadParameter { param: &'static str, reason: String },

    #[error("write body must end with a complete record")]
    IncompleteRecord,

    #[error("creating directory for category {category:?} failed: {source}")]
    CategoryDir {
        category: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] chunkq_storage::Error),
}

impl ApiError {
    pub(crate) fn missing(param: &'static str) -> Self {
        ApiError::BadParameter {
            param,
            reason: format!("{} must be provided", param),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidCategory(_)
            | ApiError::BadParameter { .. }
            | ApiError::IncompleteRecord => StatusCode::BAD_REQUEST,
            ApiError::CategoryDir { .. } | ApiError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Rejected request");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_and_server_errors_are_distinct() {
        assert_eq!(
            ApiError::InvalidCategory("..".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::missing("chunk").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Storage(chunkq_storage::Error::AckOpenChunk("moscow-chunk0".to_string()))
                .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_parameter_message() {
        assert_eq!(
            ApiError::missing("chunk").to_string(),
            "bad `chunk` parameter: chunk must be provided"
        );
    }
}
