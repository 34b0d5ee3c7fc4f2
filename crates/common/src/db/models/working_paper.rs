//! Working paper entity - the persisted result of running a checklist
//! against a project's documents

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Working paper status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkingPaperStatus {
    Draft,
    Reviewed,
    Submitted,
}

impl From<String> for WorkingPaperStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "reviewed" => WorkingPaperStatus::Reviewed,
            "submitted" => WorkingPaperStatus::Submitted,
            _ => WorkingPaperStatus::Draft,
        }
    }
}

impl From<WorkingPaperStatus> for String {
    fn from(status: WorkingPaperStatus) -> Self {
        match status {
            WorkingPaperStatus::Draft => "draft".to_string(),
            WorkingPaperStatus::Reviewed => "reviewed".to_string(),
            WorkingPaperStatus::Submitted => "submitted".to_string(),
        }
    }
}

/// Citation attached to an answer: a weak reference into a document by
/// name and page, lookup only
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub document_id: Uuid,
    pub document_name: String,
    pub page_number: i32,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

/// One question's result within a working paper
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: Uuid,
    /// Question text snapshotted at review time
    pub question: String,
    pub answer: String,
    /// Set when retrieval or generation failed for this question
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "working_papers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub review_project_id: Uuid,

    pub checklist_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Ordered json array of AnswerRecord (checklist question order)
    pub content: Json,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    /// Identifier returned by the external transformer on submission
    #[sea_orm(column_type = "Text", nullable)]
    pub submission_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,

    pub submitted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::checklist::Entity",
        from = "Column::ChecklistId",
        to = "super::checklist::Column::Id"
    )]
    Checklist,
}

impl Related<super::checklist::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Checklist.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Get the status as an enum
    pub fn paper_status(&self) -> WorkingPaperStatus {
        WorkingPaperStatus::from(self.status.clone())
    }

    /// Parse the ordered answer list
    pub fn parse_content(&self) -> Vec<AnswerRecord> {
        serde_json::from_value(self.content.clone()).unwrap_or_default()
    }

    /// Flatten answers into the unstructured text representation used for
    /// the external transformer hand-off
    pub fn to_unstructured_text(&self) -> String {
        self.parse_content()
            .iter()
            .map(|item| {
                let mut text = format!("Question: {}\n", item.question);
                text.push_str(&format!("Answer: {}\n", item.answer));
                if !item.sources.is_empty() {
                    text.push_str("Sources:\n");
                    for source in &item.sources {
                        text.push_str(&format!(
                            "- {}, Page {}\n",
                            source.document_name, source.page_number
                        ));
                    }
                }
                text
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
