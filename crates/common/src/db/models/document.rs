//! Document entity - one uploaded file belonging to a review project

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub review_project_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub file_name: String,

    /// Path within the object store bucket
    #[sea_orm(column_type = "Text")]
    pub file_path: String,

    /// MIME type as supplied at upload
    #[sea_orm(column_type = "Text")]
    pub file_type: String,

    pub file_size: i64,

    /// Null until indexing completes; then the number of chunks created
    pub page_count: Option<i32>,

    pub uploaded_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::chunk::Entity")]
    Chunk,
}

impl Related<super::chunk::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chunk.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether indexing has completed for this document
    pub fn is_indexed(&self) -> bool {
        self.page_count.is_some()
    }
}
