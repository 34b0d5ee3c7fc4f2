//! RAG query handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use lendscope_common::errors::{AppError, Result};

/// RAG query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    pub review_project_id: Uuid,

    #[validate(length(min = 1, max = 2000))]
    pub question: String,

    /// Defaults to the configured top_k
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub answer: String,
    /// Which retrieval path ran: "vector" or "scored_fallback"
    pub retrieval_path: &'static str,
    pub sources: Vec<SourceItem>,
}

#[derive(Serialize)]
pub struct SourceItem {
    pub document_id: Uuid,
    pub document_name: String,
    pub page_number: i32,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

/// Answer a single question over a project's indexed documents
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let k = request.top_k.unwrap_or(state.config.retrieval.top_k);

    let retrieval = state
        .retriever
        .retrieve(request.review_project_id, &request.question, k)
        .await?;

    let generated = state
        .answerer
        .generate(&request.question, &retrieval.sources)
        .await?;

    Ok(Json(QueryResponse {
        success: true,
        answer: generated.answer,
        retrieval_path: retrieval.path.as_str(),
        sources: generated
            .sources
            .into_iter()
            .map(|s| SourceItem {
                document_id: s.document_id,
                document_name: s.document_name,
                page_number: s.page_number,
                excerpt: s.excerpt,
                relevance_score: s.relevance_score,
            })
            .collect(),
    }))
}
