//! Checklist entity - a named, ordered set of review questions

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One review question within a checklist.
/// Snapshotted into working papers when a review runs; never re-fetched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub question: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checklists")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Ordered json array of Question
    pub questions: Json,

    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parse the ordered question list
    pub fn parse_questions(&self) -> Vec<Question> {
        serde_json::from_value(self.questions.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_questions_preserves_order() {
        let model = Model {
            id: Uuid::new_v4(),
            name: "Credit Review".into(),
            description: None,
            questions: serde_json::json!([
                { "id": Uuid::new_v4(), "question": "What is the loan amount?" },
                { "id": Uuid::new_v4(), "question": "Who is the borrower?", "required": true },
            ]),
            is_active: true,
            created_at: chrono::Utc::now().into(),
        };

        let questions = model.parse_questions();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question, "What is the loan amount?");
        assert!(questions[1].required);
    }
}
