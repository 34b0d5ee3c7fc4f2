//! Document chunk entity - one page's worth of extracted, embedded text

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How a page's content was turned into text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMethod {
    /// Vision-capable model transcribed a rendered page image
    MultimodalVision,
    /// Plain text ran through the table-detection heuristic
    TextWithTableDetection,
    /// Plain text embedded as-is
    PlainText,
}

impl ProcessingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMethod::MultimodalVision => "multimodal_vision",
            ProcessingMethod::TextWithTableDetection => "text_with_table_detection",
            ProcessingMethod::PlainText => "plain_text",
        }
    }
}

/// Per-chunk processing metadata, stored in the `metadata` json column
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub processing_method: ProcessingMethod,
    pub has_tables: bool,
    pub has_images: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document_chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub document_id: Uuid,

    /// 0-based, contiguous per document over successfully processed pages
    pub chunk_index: i32,

    /// 1-based source page number
    pub page_number: i32,

    #[sea_orm(column_type = "Text")]
    pub chunk_text: String,

    /// pgvector embedding stored as text for SeaORM compatibility.
    /// Actual vector operations are done via raw SQL.
    #[sea_orm(column_type = "Text", nullable)]
    pub embedding: Option<String>,

    pub metadata: Json,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document::Entity",
        from = "Column::DocumentId",
        to = "super::document::Column::Id",
        on_delete = "Cascade"
    )]
    Document,
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parse embedding from the stored text format to Vec<f32>
    pub fn parse_embedding(&self) -> Option<Vec<f32>> {
        self.embedding.as_ref().and_then(|s| {
            // Format: "[1.0,2.0,3.0,...]"
            let inner = s.trim_start_matches('[').trim_end_matches(']');
            inner
                .split(',')
                .map(|v| v.trim().parse::<f32>().ok())
                .collect()
        })
    }

    /// Parse the metadata json column
    pub fn chunk_metadata(&self) -> Option<ChunkMetadata> {
        serde_json::from_value(self.metadata.clone()).ok()
    }
}
