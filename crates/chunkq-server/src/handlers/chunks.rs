//! Chunk endpoints: write, read, ack and listChunks

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use chunkq_core::Chunk;

use super::{required, required_u64};
use crate::{error::ApiError, models::*, AppState};

/// Append the request body to a category.
///
/// The body must consist of whole records. An empty body is accepted and
/// does nothing.
pub async fn write(
    State(state): State<AppState>,
    Query(params): Query<WriteParams>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let category = required(&params.category, "category")?;

    state.registry.write(category, &body).await?;

    tracing::debug!(category = %category, bytes = body.len(), "Write accepted");
    Ok(StatusCode::OK)
}

/// Read whole records from a chunk starting at `off`, at most `maxSize` bytes.
///
/// An empty body means there is no complete record past `off` yet.
pub async fn read(
    State(state): State<AppState>,
    Query(params): Query<ReadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let category = required(&params.category, "category")?;
    let chunk = required(&params.chunk, "chunk")?;
    let offset = required_u64(&params.off, "off")?;
    let max_size = required_u64(&params.max_size, "maxSize")?;

    let mut body = Vec::new();
    state
        .registry
        .read(category, chunk, offset, max_size, &mut body)
        .await?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        body,
    ))
}

/// Delete a fully processed chunk.
pub async fn ack(
    State(state): State<AppState>,
    Query(params): Query<AckParams>,
) -> Result<StatusCode, ApiError> {
    let category = required(&params.category, "category")?;
    let chunk = required(&params.chunk, "chunk")?;
    let size = required_u64(&params.size, "size")?;

    state.registry.ack(category, chunk, size).await?;

    tracing::info!(category = %category, chunk = %chunk, size, "Chunk acknowledged");
    Ok(StatusCode::OK)
}

pub async fn list_chunks(
    State(state): State<AppState>,
    Query(params): Query<ListChunksParams>,
) -> Result<Json<Vec<Chunk>>, ApiError> {
    let category = required(&params.category, "category")?;
    let chunks = state.registry.list_chunks(category).await?;
    Ok(Json(chunks))
}
