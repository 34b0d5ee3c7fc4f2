//! Review-store seam
//!
//! The relational store is consumed through the `ReviewStore` trait so the
//! pipeline components take injected providers instead of global clients.
//! Vector-search availability is an explicit capability flag, not
//! error-driven control flow: callers branch on `is_vector_search_available`
//! before choosing between `match_chunks` and the scored fallback.

use crate::db::models::{
    AnswerRecord, Checklist, Chunk, ChunkMetadata, Document, Question, WorkingPaper,
    WorkingPaperStatus,
};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// A chunk row ready for insertion
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: i32,
    pub page_number: i32,
    pub chunk_text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A chunk returned from similarity search or the fallback candidate fetch
#[derive(Debug, Clone)]
pub struct MatchedChunk {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub document_name: String,
    pub page_number: i32,
    pub chunk_text: String,
    /// Cosine similarity; None for fallback candidates (scored later)
    pub similarity: Option<f32>,
}

/// A working paper ready for insertion
#[derive(Debug, Clone)]
pub struct NewWorkingPaper {
    pub review_project_id: Uuid,
    pub checklist_id: Uuid,
    pub title: String,
    pub content: Vec<AnswerRecord>,
    pub status: WorkingPaperStatus,
}

/// Data access operations required by the ingestion and review pipelines
#[async_trait]
pub trait ReviewStore: Send + Sync {
    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>>;

    /// Set (or clear) the document's page count
    async fn set_document_page_count(&self, id: Uuid, page_count: Option<i32>) -> Result<()>;

    /// Identifiers of every document belonging to a review project
    async fn list_project_document_ids(&self, review_project_id: Uuid) -> Result<Vec<Uuid>>;

    // ------------------------------------------------------------------
    // Chunks
    // ------------------------------------------------------------------

    async fn count_chunks(&self, document_id: Uuid) -> Result<u64>;

    async fn insert_chunks(&self, document_id: Uuid, chunks: Vec<NewChunk>) -> Result<Vec<Uuid>>;

    /// Delete all chunks for a document; returns the number removed
    async fn delete_chunks(&self, document_id: Uuid) -> Result<u64>;

    // ------------------------------------------------------------------
    // Similarity search
    // ------------------------------------------------------------------

    /// Whether the stored-procedure style similarity search is installed
    fn is_vector_search_available(&self) -> bool;

    /// Top-k chunks by cosine similarity above `threshold`, restricted to
    /// `document_ids`, ordered by descending similarity
    async fn match_chunks(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        k: usize,
        document_ids: &[Uuid],
    ) -> Result<Vec<MatchedChunk>>;

    /// Up to `limit` chunks belonging to the document set, no ordering
    /// guarantee (fallback candidate set)
    async fn fetch_chunks(&self, document_ids: &[Uuid], limit: usize) -> Result<Vec<MatchedChunk>>;

    // ------------------------------------------------------------------
    // Checklists
    // ------------------------------------------------------------------

    async fn find_checklist(&self, id: Uuid) -> Result<Option<Checklist>>;

    // ------------------------------------------------------------------
    // Working papers
    // ------------------------------------------------------------------

    async fn find_working_paper(&self, id: Uuid) -> Result<Option<WorkingPaper>>;

    /// Most recently updated working paper for a project, if any
    async fn find_latest_working_paper(
        &self,
        review_project_id: Uuid,
    ) -> Result<Option<WorkingPaper>>;

    async fn insert_working_paper(&self, paper: NewWorkingPaper) -> Result<WorkingPaper>;

    /// Replace a working paper's checklist reference, title, and content;
    /// resets status to draft and stamps updated_at
    async fn update_working_paper_content(
        &self,
        id: Uuid,
        checklist_id: Uuid,
        title: &str,
        content: &[AnswerRecord],
    ) -> Result<WorkingPaper>;

    /// Advance a working paper's status, optionally recording the external
    /// submission identifier and timestamp
    async fn set_working_paper_status(
        &self,
        id: Uuid,
        status: WorkingPaperStatus,
        submission_id: Option<String>,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<WorkingPaper>;
}

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Default)]
struct MemoryState {
    documents: HashMap<Uuid, Document>,
    chunks: Vec<MemoryChunk>,
    checklists: HashMap<Uuid, Checklist>,
    working_papers: HashMap<Uuid, WorkingPaper>,
}

#[derive(Clone)]
struct MemoryChunk {
    id: Uuid,
    document_id: Uuid,
    chunk_index: i32,
    page_number: i32,
    chunk_text: String,
    embedding: Vec<f32>,
    metadata: ChunkMetadata,
}

/// In-memory `ReviewStore` for tests and local development.
///
/// Similarity search mirrors the database's `match_document_chunks`
/// procedure (cosine similarity, threshold, descending order); the
/// availability toggle lets tests exercise the retriever's fallback path.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    vector_search_available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            vector_search_available: AtomicBool::new(true),
        }
    }

    /// Toggle similarity-search availability (drives the retriever fallback)
    pub fn set_vector_search_available(&self, available: bool) {
        self.vector_search_available
            .store(available, Ordering::SeqCst);
    }

    /// Seed a document record
    pub fn add_document(
        &self,
        review_project_id: Uuid,
        file_name: &str,
        file_path: &str,
    ) -> Document {
        let document = Document {
            id: Uuid::new_v4(),
            review_project_id,
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            file_type: "application/pdf".to_string(),
            file_size: 0,
            page_count: None,
            uploaded_at: Utc::now().into(),
        };
        self.state
            .lock()
            .unwrap()
            .documents
            .insert(document.id, document.clone());
        document
    }

    /// Seed a checklist record
    pub fn add_checklist(&self, name: &str, questions: Vec<Question>) -> Checklist {
        let checklist = Checklist {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            questions: serde_json::to_value(questions).unwrap_or_default(),
            is_active: true,
            created_at: Utc::now().into(),
        };
        self.state
            .lock()
            .unwrap()
            .checklists
            .insert(checklist.id, checklist.clone());
        checklist
    }

    /// Flip a checklist's active flag
    pub fn set_checklist_active(&self, id: Uuid, active: bool) {
        if let Some(checklist) = self.state.lock().unwrap().checklists.get_mut(&id) {
            checklist.is_active = active;
        }
    }

    /// Chunk rows for a document, ordered by chunk index (for assertions)
    pub fn chunks_for(&self, document_id: Uuid) -> Vec<Chunk> {
        let state = self.state.lock().unwrap();
        let mut chunks: Vec<_> = state
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        chunks
            .into_iter()
            .map(|c| Chunk {
                id: c.id,
                document_id: c.document_id,
                chunk_index: c.chunk_index,
                page_number: c.page_number,
                chunk_text: c.chunk_text,
                embedding: Some(format!(
                    "[{}]",
                    c.embedding
                        .iter()
                        .map(|f| f.to_string())
                        .collect::<Vec<_>>()
                        .join(",")
                )),
                metadata: serde_json::to_value(&c.metadata).unwrap_or_default(),
                created_at: Utc::now().into(),
            })
            .collect()
    }

    fn matched(state: &MemoryState, chunk: &MemoryChunk, similarity: Option<f32>) -> MatchedChunk {
        let document_name = state
            .documents
            .get(&chunk.document_id)
            .map(|d| d.file_name.clone())
            .unwrap_or_default();
        MatchedChunk {
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            document_name,
            page_number: chunk.page_number,
            chunk_text: chunk.chunk_text.clone(),
            similarity,
        }
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn find_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.state.lock().unwrap().documents.get(&id).cloned())
    }

    async fn set_document_page_count(&self, id: Uuid, page_count: Option<i32>) -> Result<()> {
        if let Some(document) = self.state.lock().unwrap().documents.get_mut(&id) {
            document.page_count = page_count;
        }
        Ok(())
    }

    async fn list_project_document_ids(&self, review_project_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .documents
            .values()
            .filter(|d| d.review_project_id == review_project_id)
            .map(|d| d.id)
            .collect())
    }

    async fn count_chunks(&self, document_id: Uuid) -> Result<u64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .count() as u64)
    }

    async fn insert_chunks(&self, document_id: Uuid, chunks: Vec<NewChunk>) -> Result<Vec<Uuid>> {
        let mut state = self.state.lock().unwrap();
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let id = Uuid::new_v4();
            state.chunks.push(MemoryChunk {
                id,
                document_id,
                chunk_index: chunk.chunk_index,
                page_number: chunk.page_number,
                chunk_text: chunk.chunk_text,
                embedding: chunk.embedding,
                metadata: chunk.metadata,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn delete_chunks(&self, document_id: Uuid) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.chunks.len();
        state.chunks.retain(|c| c.document_id != document_id);
        Ok((before - state.chunks.len()) as u64)
    }

    fn is_vector_search_available(&self) -> bool {
        self.vector_search_available.load(Ordering::SeqCst)
    }

    async fn match_chunks(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        k: usize,
        document_ids: &[Uuid],
    ) -> Result<Vec<MatchedChunk>> {
        let state = self.state.lock().unwrap();
        let mut matches: Vec<MatchedChunk> = state
            .chunks
            .iter()
            .filter(|c| document_ids.contains(&c.document_id))
            .filter_map(|c| {
                let similarity = cosine_similarity(query_embedding, &c.embedding);
                (similarity >= threshold).then(|| Self::matched(&state, c, Some(similarity)))
            })
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k);
        Ok(matches)
    }

    async fn fetch_chunks(&self, document_ids: &[Uuid], limit: usize) -> Result<Vec<MatchedChunk>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .chunks
            .iter()
            .filter(|c| document_ids.contains(&c.document_id))
            .take(limit)
            .map(|c| Self::matched(&state, c, None))
            .collect())
    }

    async fn find_checklist(&self, id: Uuid) -> Result<Option<Checklist>> {
        Ok(self.state.lock().unwrap().checklists.get(&id).cloned())
    }

    async fn find_working_paper(&self, id: Uuid) -> Result<Option<WorkingPaper>> {
        Ok(self.state.lock().unwrap().working_papers.get(&id).cloned())
    }

    async fn find_latest_working_paper(
        &self,
        review_project_id: Uuid,
    ) -> Result<Option<WorkingPaper>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .working_papers
            .values()
            .filter(|wp| wp.review_project_id == review_project_id)
            .max_by_key(|wp| wp.updated_at)
            .cloned())
    }

    async fn insert_working_paper(&self, paper: NewWorkingPaper) -> Result<WorkingPaper> {
        let now = Utc::now();
        let model = WorkingPaper {
            id: Uuid::new_v4(),
            review_project_id: paper.review_project_id,
            checklist_id: paper.checklist_id,
            title: paper.title,
            content: serde_json::to_value(&paper.content)?,
            status: String::from(paper.status),
            submission_id: None,
            created_at: now.into(),
            updated_at: now.into(),
            submitted_at: None,
        };
        self.state
            .lock()
            .unwrap()
            .working_papers
            .insert(model.id, model.clone());
        Ok(model)
    }

    async fn update_working_paper_content(
        &self,
        id: Uuid,
        checklist_id: Uuid,
        title: &str,
        content: &[AnswerRecord],
    ) -> Result<WorkingPaper> {
        let content = serde_json::to_value(content)?;
        let mut state = self.state.lock().unwrap();
        let paper = state
            .working_papers
            .get_mut(&id)
            .ok_or_else(|| crate::AppError::not_found("working paper", id.to_string()))?;
        paper.checklist_id = checklist_id;
        paper.title = title.to_string();
        paper.content = content;
        paper.status = String::from(WorkingPaperStatus::Draft);
        paper.updated_at = Utc::now().into();
        Ok(paper.clone())
    }

    async fn set_working_paper_status(
        &self,
        id: Uuid,
        status: WorkingPaperStatus,
        submission_id: Option<String>,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<WorkingPaper> {
        let mut state = self.state.lock().unwrap();
        let paper = state
            .working_papers
            .get_mut(&id)
            .ok_or_else(|| crate::AppError::not_found("working paper", id.to_string()))?;
        paper.status = String::from(status);
        if let Some(submission_id) = submission_id {
            paper.submission_id = Some(submission_id);
        }
        if let Some(submitted_at) = submitted_at {
            paper.submitted_at = Some(submitted_at.into());
        }
        paper.updated_at = Utc::now().into();
        Ok(paper.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ProcessingMethod;

    fn plain_metadata() -> ChunkMetadata {
        ChunkMetadata {
            processing_method: ProcessingMethod::PlainText,
            has_tables: false,
            has_images: false,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn test_match_chunks_orders_by_similarity() {
        let store = MemoryStore::new();
        let project = Uuid::new_v4();
        let document = store.add_document(project, "report.pdf", "docs/report.pdf");

        store
            .insert_chunks(
                document.id,
                vec![
                    NewChunk {
                        chunk_index: 0,
                        page_number: 1,
                        chunk_text: "weak match".into(),
                        embedding: vec![0.6, 0.8],
                        metadata: plain_metadata(),
                    },
                    NewChunk {
                        chunk_index: 1,
                        page_number: 2,
                        chunk_text: "strong match".into(),
                        embedding: vec![1.0, 0.0],
                        metadata: plain_metadata(),
                    },
                ],
            )
            .await
            .unwrap();

        let matches = store
            .match_chunks(&[1.0, 0.0], 0.5, 5, &[document.id])
            .await
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].chunk_text, "strong match");
        assert_eq!(matches[0].document_name, "report.pdf");
        assert!(matches[0].similarity.unwrap() > matches[1].similarity.unwrap());
    }

    #[tokio::test]
    async fn test_match_chunks_applies_threshold() {
        let store = MemoryStore::new();
        let project = Uuid::new_v4();
        let document = store.add_document(project, "report.pdf", "docs/report.pdf");

        store
            .insert_chunks(
                document.id,
                vec![NewChunk {
                    chunk_index: 0,
                    page_number: 1,
                    chunk_text: "orthogonal".into(),
                    embedding: vec![0.0, 1.0],
                    metadata: plain_metadata(),
                }],
            )
            .await
            .unwrap();

        let matches = store
            .match_chunks(&[1.0, 0.0], 0.7, 5, &[document.id])
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_latest_working_paper_wins() {
        let store = MemoryStore::new();
        let project = Uuid::new_v4();
        let checklist_id = Uuid::new_v4();

        let first = store
            .insert_working_paper(NewWorkingPaper {
                review_project_id: project,
                checklist_id,
                title: "First".into(),
                content: vec![],
                status: WorkingPaperStatus::Draft,
            })
            .await
            .unwrap();

        store
            .insert_working_paper(NewWorkingPaper {
                review_project_id: project,
                checklist_id,
                title: "Second".into(),
                content: vec![],
                status: WorkingPaperStatus::Draft,
            })
            .await
            .unwrap();

        // Touch the first paper so it becomes the most recently updated
        store
            .update_working_paper_content(first.id, checklist_id, "First (updated)", &[])
            .await
            .unwrap();

        let latest = store
            .find_latest_working_paper(project)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, first.id);
        assert_eq!(latest.title, "First (updated)");
    }
}
