//! Chunk retrieval
//!
//! Two paths to the same shape of result: database similarity search when
//! the vector extension is installed, and a per-chunk LLM relevance rating
//! otherwise. The choice is driven by the store's capability flag, never by
//! probing for errors; which path ran is reported to the caller.

use futures::stream::{self, StreamExt};
use lendscope_common::db::{MatchedChunk, ReviewStore};
use lendscope_common::errors::{AppError, Result};
use lendscope_common::llm::{CompletionOptions, LanguageModel};
use lendscope_common::metrics::record_retrieval;
use lendscope_common::Embedder;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const EXCERPT_LEN: usize = 200;
const SCORING_SNIPPET_LEN: usize = 500;

/// Retrieval tuning knobs
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Default number of chunks to return
    pub top_k: usize,

    /// Minimum cosine similarity for vector-search matches
    pub similarity_threshold: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.7,
        }
    }
}

/// Which retrieval path produced the results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalPath {
    /// Database cosine-similarity search
    Vector,
    /// Per-chunk LLM relevance rating
    ScoredFallback,
}

impl RetrievalPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalPath::Vector => "vector",
            RetrievalPath::ScoredFallback => "scored_fallback",
        }
    }
}

/// One retrieved chunk, ready for citation and context assembly
#[derive(Debug, Clone)]
pub struct RetrievedSource {
    pub document_id: Uuid,
    pub document_name: String,
    pub page_number: i32,

    /// First 200 chars of the chunk, for display
    pub excerpt: String,

    /// LLM relevance rating; only set on the fallback path
    pub relevance_score: Option<f32>,

    /// Full chunk text, for context assembly
    pub chunk_text: String,
}

/// Retrieval result
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub path: RetrievalPath,
    pub sources: Vec<RetrievedSource>,
}

/// Retriever over injected providers
pub struct Retriever<S: ReviewStore> {
    store: Arc<S>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    config: RetrieverConfig,
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn to_source(chunk: MatchedChunk, relevance_score: Option<f32>) -> RetrievedSource {
    let excerpt = format!("{}...", truncate_chars(&chunk.chunk_text, EXCERPT_LEN));
    RetrievedSource {
        document_id: chunk.document_id,
        document_name: chunk.document_name,
        page_number: chunk.page_number,
        excerpt,
        relevance_score,
        chunk_text: chunk.chunk_text,
    }
}

impl<S: ReviewStore> Retriever<S> {
    pub fn new(
        store: Arc<S>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            config,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Retrieve up to `k` chunks relevant to `query` across the project's
    /// documents. NotFound when the project has no documents, or when the
    /// fallback path finds no candidate chunks at all.
    #[instrument(skip(self, query), fields(review_project_id = %review_project_id))]
    pub async fn retrieve(
        &self,
        review_project_id: Uuid,
        query: &str,
        k: usize,
    ) -> Result<Retrieval> {
        let started = Instant::now();

        // The embedder already reports its failures as Dependency("embedding")
        let query_embedding = self.embedder.embed(query).await?;

        let document_ids = self.store.list_project_document_ids(review_project_id).await?;
        if document_ids.is_empty() {
            return Err(AppError::not_found(
                "project documents",
                review_project_id.to_string(),
            ));
        }

        let retrieval = if self.store.is_vector_search_available() {
            let matches = self
                .store
                .match_chunks(
                    &query_embedding,
                    self.config.similarity_threshold,
                    k,
                    &document_ids,
                )
                .await?;
            debug!(matches = matches.len(), "Vector search complete");
            Retrieval {
                path: RetrievalPath::Vector,
                sources: matches.into_iter().map(|c| to_source(c, None)).collect(),
            }
        } else {
            self.scored_fallback(query, k, &document_ids).await?
        };

        record_retrieval(
            started.elapsed().as_secs_f64(),
            retrieval.path.as_str(),
            retrieval.sources.len(),
        );
        Ok(retrieval)
    }

    /// Rate every candidate chunk against the question and keep the best k
    async fn scored_fallback(
        &self,
        query: &str,
        k: usize,
        document_ids: &[Uuid],
    ) -> Result<Retrieval> {
        let candidates = self.store.fetch_chunks(document_ids, k).await?;
        if candidates.is_empty() {
            return Err(AppError::not_found("relevant chunks", query.to_string()));
        }

        let mut scored: Vec<(f32, MatchedChunk)> = stream::iter(candidates)
            .map(|chunk| async move {
                let score = self.score_chunk(query, &chunk).await;
                (score, chunk)
            })
            .buffered(4)
            .collect()
            .await;

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(Retrieval {
            path: RetrievalPath::ScoredFallback,
            sources: scored
                .into_iter()
                .map(|(score, chunk)| to_source(chunk, Some(score)))
                .collect(),
        })
    }

    async fn score_chunk(&self, query: &str, chunk: &MatchedChunk) -> f32 {
        let prompt = format!(
            "Rate the relevance of this document chunk to the question from 0-1. \
             Return only a number.\n\nQuestion: {}\n\nChunk: {}",
            query,
            truncate_chars(&chunk.chunk_text, SCORING_SNIPPET_LEN)
        );

        match self.llm.complete(&prompt, &CompletionOptions::default()).await {
            Ok(reply) => reply.trim().parse::<f32>().unwrap_or(0.0),
            Err(e) => {
                warn!(chunk_id = %chunk.chunk_id, error = %e, "Relevance scoring failed");
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendscope_common::db::models::{ChunkMetadata, ProcessingMethod};
    use lendscope_common::db::{MemoryStore, NewChunk};
    use lendscope_common::embeddings::MockEmbedder;
    use lendscope_common::llm::MockLanguageModel;

    fn metadata() -> ChunkMetadata {
        ChunkMetadata {
            processing_method: ProcessingMethod::PlainText,
            has_tables: false,
            has_images: false,
        }
    }

    fn chunk(index: i32, page: i32, text: &str, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            chunk_index: index,
            page_number: page,
            chunk_text: text.to_string(),
            embedding,
            metadata: metadata(),
        }
    }

    fn retriever(
        store: Arc<MemoryStore>,
        llm: Arc<MockLanguageModel>,
    ) -> Retriever<MemoryStore> {
        Retriever::new(
            store,
            Arc::new(MockEmbedder::new(8)),
            llm,
            RetrieverConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_empty_project_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let retriever = retriever(store, Arc::new(MockLanguageModel::new()));

        let err = retriever
            .retrieve(Uuid::new_v4(), "any question", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fallback_only_when_capability_absent() {
        let store = Arc::new(MemoryStore::new());
        let project = Uuid::new_v4();
        let document = store.add_document(project, "report.pdf", "docs/report.pdf");
        store
            .insert_chunks(
                document.id,
                vec![chunk(0, 1, "some content", vec![0.0; 8])],
            )
            .await
            .unwrap();

        let llm = Arc::new(MockLanguageModel::with_responder(|_| "0.5".to_string()));
        let retriever = retriever(store.clone(), llm.clone());

        // Zero embeddings score 0 similarity, so vector search returns
        // nothing, but the path must still be Vector: empty results never
        // trigger the fallback.
        let retrieval = retriever.retrieve(project, "question", 5).await.unwrap();
        assert_eq!(retrieval.path, RetrievalPath::Vector);
        assert!(retrieval.sources.is_empty());
        assert!(llm.recorded_prompts().is_empty());

        store.set_vector_search_available(false);
        let retrieval = retriever.retrieve(project, "question", 5).await.unwrap();
        assert_eq!(retrieval.path, RetrievalPath::ScoredFallback);
        assert_eq!(retrieval.sources.len(), 1);
        assert!(!llm.recorded_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_sorts_by_score() {
        let store = Arc::new(MemoryStore::new());
        store.set_vector_search_available(false);
        let project = Uuid::new_v4();
        let document = store.add_document(project, "report.pdf", "docs/report.pdf");
        store
            .insert_chunks(
                document.id,
                vec![
                    chunk(0, 1, "office lease details", vec![0.0; 8]),
                    chunk(1, 2, "revenue figures for 2024", vec![0.0; 8]),
                ],
            )
            .await
            .unwrap();

        let llm = Arc::new(MockLanguageModel::with_responder(|prompt| {
            if prompt.contains("revenue") {
                "0.9".to_string()
            } else {
                "0.2".to_string()
            }
        }));
        let retriever = retriever(store, llm);

        let retrieval = retriever
            .retrieve(project, "What was the company revenue?", 5)
            .await
            .unwrap();

        assert_eq!(retrieval.sources.len(), 2);
        assert!(retrieval.sources[0].chunk_text.contains("revenue"));
        assert_eq!(retrieval.sources[0].relevance_score, Some(0.9));
        assert_eq!(retrieval.sources[1].relevance_score, Some(0.2));
    }

    #[tokio::test]
    async fn test_fallback_nonnumeric_score_is_zero() {
        let store = Arc::new(MemoryStore::new());
        store.set_vector_search_available(false);
        let project = Uuid::new_v4();
        let document = store.add_document(project, "report.pdf", "docs/report.pdf");
        store
            .insert_chunks(document.id, vec![chunk(0, 1, "content", vec![0.0; 8])])
            .await
            .unwrap();

        let llm = Arc::new(MockLanguageModel::with_responder(|_| {
            "I would say it is quite relevant".to_string()
        }));
        let retriever = retriever(store, llm);

        let retrieval = retriever.retrieve(project, "question", 5).await.unwrap();
        assert_eq!(retrieval.sources[0].relevance_score, Some(0.0));
    }

    #[tokio::test]
    async fn test_fallback_without_chunks_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        store.set_vector_search_available(false);
        let project = Uuid::new_v4();
        store.add_document(project, "report.pdf", "docs/report.pdf");

        let retriever = retriever(store, Arc::new(MockLanguageModel::new()));
        let err = retriever.retrieve(project, "question", 5).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_embedder_failure_surfaces_unwrapped() {
        let store = Arc::new(MemoryStore::new());
        let project = Uuid::new_v4();
        store.add_document(project, "report.pdf", "docs/report.pdf");

        struct OutageEmbedder;
        #[async_trait::async_trait]
        impl Embedder for OutageEmbedder {
            async fn embed(&self, _text: &str) -> lendscope_common::Result<Vec<f32>> {
                Err(AppError::dependency("embedding", "API error 500"))
            }
            async fn embed_batch(
                &self,
                _texts: &[String],
            ) -> lendscope_common::Result<Vec<Vec<f32>>> {
                Err(AppError::dependency("embedding", "API error 500"))
            }
            fn model_name(&self) -> &str {
                "outage"
            }
            fn dimension(&self) -> usize {
                8
            }
        }

        let retriever = Retriever::new(
            store,
            Arc::new(OutageEmbedder),
            Arc::new(MockLanguageModel::new()),
            RetrieverConfig::default(),
        );

        let err = retriever.retrieve(project, "question", 5).await.unwrap_err();
        match err {
            AppError::Dependency { service, message } => {
                assert_eq!(service, "embedding");
                // The provider's message passes through without re-wrapping
                assert_eq!(message, "API error 500");
            }
            other => panic!("expected dependency error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_excerpt_is_truncated() {
        let store = Arc::new(MemoryStore::new());
        let project = Uuid::new_v4();
        let document = store.add_document(project, "report.pdf", "docs/report.pdf");
        let long_text = "x".repeat(400);
        store
            .insert_chunks(document.id, vec![chunk(0, 1, &long_text, vec![1.0; 8])])
            .await
            .unwrap();

        // Embed the same direction as the stored chunk so it matches
        struct UniformEmbedder;
        #[async_trait::async_trait]
        impl Embedder for UniformEmbedder {
            async fn embed(&self, _text: &str) -> lendscope_common::Result<Vec<f32>> {
                Ok(vec![1.0; 8])
            }
            async fn embed_batch(
                &self,
                texts: &[String],
            ) -> lendscope_common::Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![1.0; 8]).collect())
            }
            fn model_name(&self) -> &str {
                "uniform"
            }
            fn dimension(&self) -> usize {
                8
            }
        }

        let retriever = Retriever::new(
            store,
            Arc::new(UniformEmbedder),
            Arc::new(MockLanguageModel::new()),
            RetrieverConfig::default(),
        );

        let retrieval = retriever.retrieve(project, "question", 5).await.unwrap();
        assert_eq!(retrieval.sources[0].excerpt.len(), 203);
        assert!(retrieval.sources[0].excerpt.ends_with("..."));
        assert_eq!(retrieval.sources[0].chunk_text.len(), 400);
    }
}
