//! API models for HTTP endpoints
//!
//! Query parameters are kept as optional strings so that missing and
//! malformed values are reported by the handlers with the parameter name.

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct WriteParams {
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadParams {
    pub category: Option<String>,
    pub chunk: Option<String>,
    pub off: Option<String>,
    pub max_size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AckParams {
    pub category: Option<String>,
    pub chunk: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListChunksParams {
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
