//! Document processing handlers

use axum::{
    extract::{Path, State},
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use lendscope_common::errors::{AppError, Result};
use lendscope_ingestion::IndexRequest;

/// Document processing request
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    /// Vision path for image pages when true
    #[serde(default = "default_multimodal")]
    pub use_multimodal: bool,

    /// Base64-encoded PNG page images, one per page
    #[serde(default)]
    pub images: Option<Vec<String>>,

    /// Plain text with page-break sentinels
    #[serde(default)]
    pub text_content: Option<String>,
}

fn default_multimodal() -> bool {
    true
}

#[derive(Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub document_id: Uuid,
    pub chunks_created: usize,
    pub pages: Vec<PageResult>,
}

#[derive(Serialize)]
pub struct PageResult {
    pub page_number: i32,
    pub output_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Index a document's pages into embedded chunks
pub async fn process_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>> {
    let images = match request.images {
        Some(encoded) => Some(decode_images(&encoded)?),
        None => None,
    };

    let outcome = state
        .indexer
        .index_document(IndexRequest {
            document_id,
            use_multimodal: request.use_multimodal,
            images,
            text_content: request.text_content,
        })
        .await?;

    Ok(Json(ProcessResponse {
        success: true,
        document_id: outcome.document_id,
        chunks_created: outcome.chunks_created,
        pages: outcome
            .pages
            .into_iter()
            .map(|p| PageResult {
                page_number: p.page_number,
                output_len: p.output_len,
                error: p.error,
            })
            .collect(),
    }))
}

fn decode_images(encoded: &[String]) -> Result<Vec<Vec<u8>>> {
    encoded
        .iter()
        .enumerate()
        .map(|(i, image)| {
            base64::engine::general_purpose::STANDARD
                .decode(image)
                .map_err(|e| {
                    AppError::invalid_input(format!("image {} is not valid base64: {}", i + 1, e))
                })
        })
        .collect()
}

#[derive(Serialize)]
pub struct DeleteChunksResponse {
    pub success: bool,
    pub document_id: Uuid,
    pub chunks_removed: u64,
}

/// Remove a document's chunks ahead of a re-index
pub async fn delete_chunks(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DeleteChunksResponse>> {
    let removed = state.indexer.delete_chunks(document_id).await?;
    Ok(Json(DeleteChunksResponse {
        success: true,
        document_id,
        chunks_removed: removed,
    }))
}
