//! chunkq HTTP API Server
//!
//! Exposes the per-category chunk stores over HTTP.
//!
//! ## Endpoints
//!
//! | route             | params                                | body                    |
//! |-------------------|---------------------------------------|-------------------------|
//! | `POST /write`     | `category`                            | records to append       |
//! | `GET /read`       | `category`, `chunk`, `off`, `maxSize` | whole records           |
//! | `POST /ack`       | `category`, `chunk`, `size`           | -                       |
//! | `GET /listChunks` | `category`                            | `[{name,complete,size}]`|
//! | `GET /health`     | -                                     | `{"status":"ok"}`       |
//!
//! Client errors are answered with 400 and a plain-text message, storage
//! failures with 500.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod shutdown;

pub use config::{probe_data_dir, ConfigError, ServerConfig};
pub use error::ApiError;
pub use registry::CategoryRegistry;
pub use shutdown::{serve_with_shutdown, shutdown_signal, ShutdownSignal};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CategoryRegistry>,
    /// Largest accepted write body in bytes
    pub max_write_size: usize,
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/write", post(handlers::chunks::write))
        .route("/read", get(handlers::chunks::read))
        .route("/ack", post(handlers::chunks::ack))
        .route("/listChunks", get(handlers::chunks::list_chunks))
        .route("/health", get(handlers::health::health_check))
        .layer(DefaultBodyLimit::max(state.max_write_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
