//! SeaORM-backed implementation of the review store
//!
//! All vector operations go through raw SQL statements since the embedding
//! column is a pgvector type; everything else uses SeaORM entities.

use crate::db::models::*;
use crate::db::store::{MatchedChunk, NewChunk, NewWorkingPaper, ReviewStore};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
    vector_search_enabled: bool,
}

/// Format an embedding in pgvector text form: "[1.0,2.0,...]"
fn embedding_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool, vector_search_enabled: bool) -> Self {
        Self {
            pool,
            vector_search_enabled,
        }
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    /// Create a document record (upload bookkeeping)
    pub async fn create_document(
        &self,
        review_project_id: Uuid,
        file_name: String,
        file_path: String,
        file_type: String,
        file_size: i64,
    ) -> Result<Document> {
        let document = DocumentActiveModel {
            id: Set(Uuid::new_v4()),
            review_project_id: Set(review_project_id),
            file_name: Set(file_name),
            file_path: Set(file_path),
            file_type: Set(file_type),
            file_size: Set(file_size),
            page_count: Set(None),
            uploaded_at: Set(Utc::now().into()),
        };

        document.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Get chunks for a document ordered by chunk index
    pub async fn get_chunks_by_document(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        ChunkEntity::find()
            .filter(ChunkColumn::DocumentId.eq(document_id))
            .order_by_asc(ChunkColumn::ChunkIndex)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Map document ids to file names for a set of chunks
    async fn document_names(&self, document_ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
        let documents = DocumentEntity::find()
            .filter(DocumentColumn::Id.is_in(document_ids.to_vec()))
            .all(self.read_conn())
            .await?;
        Ok(documents.into_iter().map(|d| (d.id, d.file_name)).collect())
    }
}

#[async_trait]
impl ReviewStore for Repository {
    async fn find_document(&self, id: Uuid) -> Result<Option<Document>> {
        DocumentEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn set_document_page_count(&self, id: Uuid, page_count: Option<i32>) -> Result<()> {
        let mut document: DocumentActiveModel = DocumentEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("document", id.to_string()))?
            .into();

        document.page_count = Set(page_count);
        document.update(self.write_conn()).await?;
        Ok(())
    }

    async fn list_project_document_ids(&self, review_project_id: Uuid) -> Result<Vec<Uuid>> {
        let documents = DocumentEntity::find()
            .filter(DocumentColumn::ReviewProjectId.eq(review_project_id))
            .all(self.read_conn())
            .await?;
        Ok(documents.into_iter().map(|d| d.id).collect())
    }

    async fn count_chunks(&self, document_id: Uuid) -> Result<u64> {
        ChunkEntity::find()
            .filter(ChunkColumn::DocumentId.eq(document_id))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn insert_chunks(&self, document_id: Uuid, chunks: Vec<NewChunk>) -> Result<Vec<Uuid>> {
        let mut chunk_ids = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let chunk_id = Uuid::new_v4();
            let metadata = serde_json::to_value(&chunk.metadata)?;

            // Raw SQL for the pgvector column
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO document_chunks (
                    id, document_id, chunk_index, page_number, chunk_text,
                    embedding, metadata, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6::vector, $7, NOW())
                "#,
                vec![
                    chunk_id.into(),
                    document_id.into(),
                    chunk.chunk_index.into(),
                    chunk.page_number.into(),
                    chunk.chunk_text.into(),
                    embedding_literal(&chunk.embedding).into(),
                    metadata.into(),
                ],
            );

            self.write_conn().execute(stmt).await?;
            chunk_ids.push(chunk_id);
        }

        Ok(chunk_ids)
    }

    async fn delete_chunks(&self, document_id: Uuid) -> Result<u64> {
        let result = ChunkEntity::delete_many()
            .filter(ChunkColumn::DocumentId.eq(document_id))
            .exec(self.write_conn())
            .await?;
        Ok(result.rows_affected)
    }

    fn is_vector_search_available(&self) -> bool {
        self.vector_search_enabled
    }

    async fn match_chunks(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        k: usize,
        document_ids: &[Uuid],
    ) -> Result<Vec<MatchedChunk>> {
        let embedding = embedding_literal(query_embedding);

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT
                c.id as chunk_id,
                c.document_id,
                d.file_name as document_name,
                c.page_number,
                c.chunk_text,
                1 - (c.embedding <=> $1::vector) as similarity
            FROM document_chunks c
            JOIN documents d ON c.document_id = d.id
            WHERE c.document_id = ANY($2)
              AND c.embedding IS NOT NULL
              AND 1 - (c.embedding <=> $1::vector) >= $3
            ORDER BY c.embedding <=> $1::vector
            LIMIT $4
            "#,
            vec![
                embedding.into(),
                document_ids.to_vec().into(),
                (threshold as f64).into(),
                (k as i64).into(),
            ],
        );

        let rows = self.read_conn().query_all(stmt).await?;

        let results = rows
            .into_iter()
            .filter_map(|row| {
                Some(MatchedChunk {
                    chunk_id: row.try_get("", "chunk_id").ok()?,
                    document_id: row.try_get("", "document_id").ok()?,
                    document_name: row.try_get("", "document_name").ok()?,
                    page_number: row.try_get("", "page_number").ok()?,
                    chunk_text: row.try_get("", "chunk_text").ok()?,
                    similarity: row
                        .try_get::<f64>("", "similarity")
                        .ok()
                        .map(|s| s as f32),
                })
            })
            .collect();

        Ok(results)
    }

    async fn fetch_chunks(&self, document_ids: &[Uuid], limit: usize) -> Result<Vec<MatchedChunk>> {
        let chunks = ChunkEntity::find()
            .filter(ChunkColumn::DocumentId.is_in(document_ids.to_vec()))
            .limit(limit as u64)
            .all(self.read_conn())
            .await?;

        let names = self.document_names(document_ids).await?;

        Ok(chunks
            .into_iter()
            .map(|chunk| MatchedChunk {
                chunk_id: chunk.id,
                document_id: chunk.document_id,
                document_name: names.get(&chunk.document_id).cloned().unwrap_or_default(),
                page_number: chunk.page_number,
                chunk_text: chunk.chunk_text,
                similarity: None,
            })
            .collect())
    }

    async fn find_checklist(&self, id: Uuid) -> Result<Option<Checklist>> {
        ChecklistEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_working_paper(&self, id: Uuid) -> Result<Option<WorkingPaper>> {
        WorkingPaperEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_latest_working_paper(
        &self,
        review_project_id: Uuid,
    ) -> Result<Option<WorkingPaper>> {
        WorkingPaperEntity::find()
            .filter(WorkingPaperColumn::ReviewProjectId.eq(review_project_id))
            .order_by_desc(WorkingPaperColumn::UpdatedAt)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn insert_working_paper(&self, paper: NewWorkingPaper) -> Result<WorkingPaper> {
        let now = Utc::now();

        let model = WorkingPaperActiveModel {
            id: Set(Uuid::new_v4()),
            review_project_id: Set(paper.review_project_id),
            checklist_id: Set(paper.checklist_id),
            title: Set(paper.title),
            content: Set(serde_json::to_value(&paper.content)?),
            status: Set(String::from(paper.status)),
            submission_id: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            submitted_at: Set(None),
        };

        model.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn update_working_paper_content(
        &self,
        id: Uuid,
        checklist_id: Uuid,
        title: &str,
        content: &[AnswerRecord],
    ) -> Result<WorkingPaper> {
        let mut paper: WorkingPaperActiveModel = WorkingPaperEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("working paper", id.to_string()))?
            .into();

        paper.checklist_id = Set(checklist_id);
        paper.title = Set(title.to_string());
        paper.content = Set(serde_json::to_value(content)?);
        paper.status = Set(String::from(WorkingPaperStatus::Draft));
        paper.updated_at = Set(Utc::now().into());

        paper.update(self.write_conn()).await.map_err(Into::into)
    }

    async fn set_working_paper_status(
        &self,
        id: Uuid,
        status: WorkingPaperStatus,
        submission_id: Option<String>,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<WorkingPaper> {
        let mut paper: WorkingPaperActiveModel = WorkingPaperEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("working paper", id.to_string()))?
            .into();

        paper.status = Set(String::from(status));
        if let Some(submission_id) = submission_id {
            paper.submission_id = Set(Some(submission_id));
        }
        if let Some(submitted_at) = submitted_at {
            paper.submitted_at = Set(Some(submitted_at.into()));
        }
        paper.updated_at = Set(Utc::now().into());

        paper.update(self.write_conn()).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_literal() {
        assert_eq!(embedding_literal(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
        assert_eq!(embedding_literal(&[]), "[]");
    }
}
