//! Review and working-paper handlers

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use lendscope_common::db::models::{AnswerRecord, WorkingPaper};
use lendscope_common::errors::Result;

/// Checklist review request
#[derive(Debug, Deserialize)]
pub struct RunReviewRequest {
    pub review_project_id: Uuid,
    pub checklist_id: Uuid,
}

#[derive(Serialize)]
pub struct WorkingPaperResponse {
    pub success: bool,
    pub working_paper: WorkingPaperView,
}

#[derive(Serialize)]
pub struct WorkingPaperView {
    pub id: Uuid,
    pub review_project_id: Uuid,
    pub checklist_id: Uuid,
    pub title: String,
    pub status: String,
    pub answers: Vec<AnswerRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    pub updated_at: DateTime<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<FixedOffset>>,
}

impl From<WorkingPaper> for WorkingPaperView {
    fn from(paper: WorkingPaper) -> Self {
        let answers = paper.parse_content();
        Self {
            id: paper.id,
            review_project_id: paper.review_project_id,
            checklist_id: paper.checklist_id,
            title: paper.title,
            status: paper.status,
            answers,
            submission_id: paper.submission_id,
            updated_at: paper.updated_at,
            submitted_at: paper.submitted_at,
        }
    }
}

/// Run a checklist against a project's documents
pub async fn run_review(
    State(state): State<AppState>,
    Json(request): Json<RunReviewRequest>,
) -> Result<Json<WorkingPaperResponse>> {
    let paper = state
        .orchestrator
        .run_review(request.review_project_id, request.checklist_id)
        .await?;

    Ok(Json(WorkingPaperResponse {
        success: true,
        working_paper: paper.into(),
    }))
}

/// Finalize request
#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    /// Submit to the external transformer before marking reviewed
    #[serde(default)]
    pub submit: bool,
}

/// Finalize a working paper, optionally submitting it externally
pub async fn finalize(
    State(state): State<AppState>,
    Path(working_paper_id): Path<Uuid>,
    Json(request): Json<FinalizeRequest>,
) -> Result<Json<WorkingPaperResponse>> {
    let paper = state
        .orchestrator
        .finalize(working_paper_id, request.submit)
        .await?;

    Ok(Json(WorkingPaperResponse {
        success: true,
        working_paper: paper.into(),
    }))
}
