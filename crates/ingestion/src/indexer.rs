//! Document indexing
//!
//! Drives the full ingestion pipeline for one document: chunk, extract,
//! embed, persist. Page failures are isolated; one bad page must never
//! cost the pages around it.

use crate::chunker::{split_pages, Page, PageContent, PageSource};
use crate::extractor::{Extraction, MultimodalExtractor};
use futures::stream::{self, StreamExt};
use lendscope_common::db::{NewChunk, ReviewStore};
use lendscope_common::errors::{AppError, Result};
use lendscope_common::metrics::record_indexing;
use lendscope_common::storage::ObjectStore;
use lendscope_common::Embedder;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Options for an indexing run
#[derive(Debug, Clone)]
pub struct IndexRequest {
    pub document_id: Uuid,

    /// Vision path for image pages when true
    pub use_multimodal: bool,

    /// Rendered page images (PNG), one per page
    pub images: Option<Vec<Vec<u8>>>,

    /// Plain text with page-break sentinels
    pub text_content: Option<String>,
}

/// Per-page result within an indexing run
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub page_number: i32,

    /// Length of the extracted text; 0 when the page failed
    pub output_len: usize,

    /// Failure description; the page produced no chunk when set
    pub error: Option<String>,
}

/// Summary of an indexing run
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub document_id: Uuid,
    pub chunks_created: usize,
    pub pages: Vec<PageOutcome>,
}

/// Indexing pipeline over injected providers
pub struct DocumentIndexer<S: ReviewStore> {
    store: Arc<S>,
    objects: Arc<dyn ObjectStore>,
    extractor: Arc<MultimodalExtractor>,
    embedder: Arc<dyn Embedder>,
    page_concurrency: usize,
}

impl<S: ReviewStore> DocumentIndexer<S> {
    pub fn new(
        store: Arc<S>,
        objects: Arc<dyn ObjectStore>,
        extractor: Arc<MultimodalExtractor>,
        embedder: Arc<dyn Embedder>,
        page_concurrency: usize,
    ) -> Self {
        Self {
            store,
            objects,
            extractor,
            embedder,
            page_concurrency: page_concurrency.max(1),
        }
    }

    /// Index a document: extract every page, embed, and persist chunks.
    ///
    /// Documents that already have chunks are rejected; callers re-index by
    /// deleting first. Individual page failures are reported per page and
    /// never abort the run.
    #[instrument(skip(self, request), fields(document_id = %request.document_id))]
    pub async fn index_document(&self, request: IndexRequest) -> Result<IndexOutcome> {
        let started = Instant::now();
        let document_id = request.document_id;

        let document = self
            .store
            .find_document(document_id)
            .await?
            .ok_or_else(|| AppError::not_found("document", document_id.to_string()))?;

        // Images are only a valid source on the multimodal path; without it
        // the run falls back to whatever text accompanied the upload.
        let source = match (&request.images, &request.text_content) {
            (Some(images), _) if request.use_multimodal && !images.is_empty() => {
                PageSource::Images(images.clone())
            }
            (_, Some(text)) if !text.trim().is_empty() => PageSource::Text(text.clone()),
            _ => {
                return Err(AppError::invalid_input(
                    "no page images or text content supplied",
                ))
            }
        };

        // Confirms the upload actually landed before anything is written.
        // An absent object is a storage failure here, not a lookup miss.
        self.objects
            .download(&document.file_path)
            .await
            .map_err(|e| match e {
                AppError::NotFound { .. } => AppError::Storage {
                    message: format!("uploaded file missing at {}", document.file_path),
                },
                other => other,
            })?;

        if self.store.count_chunks(document_id).await? > 0 {
            return Err(AppError::Conflict {
                message: format!("document {} already has chunks", document_id),
            });
        }

        let pages = split_pages(source);
        let page_count = pages.len();

        let results: Vec<(i32, std::result::Result<(Extraction, Vec<f32>), AppError>)> =
            stream::iter(pages)
                .map(|page| self.process_page(page, request.use_multimodal))
                .buffered(self.page_concurrency)
                .collect()
                .await;

        let mut outcomes = Vec::with_capacity(page_count);
        let mut rows = Vec::new();

        for (page_number, result) in results {
            match result {
                Ok((extraction, embedding)) => {
                    outcomes.push(PageOutcome {
                        page_number,
                        output_len: extraction.text.len(),
                        error: None,
                    });
                    rows.push(NewChunk {
                        // Contiguous over successes, assigned in page order
                        chunk_index: rows.len() as i32,
                        page_number,
                        chunk_text: extraction.text,
                        embedding,
                        metadata: extraction.metadata,
                    });
                }
                Err(e) => {
                    warn!(page_number, error = %e, "Page failed, skipping");
                    outcomes.push(PageOutcome {
                        page_number,
                        output_len: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let chunks_created = rows.len();
        if chunks_created > 0 {
            self.store.insert_chunks(document_id, rows).await?;
        }
        self.store
            .set_document_page_count(document_id, Some(chunks_created as i32))
            .await?;

        let failed = page_count - chunks_created;
        record_indexing(started.elapsed().as_secs_f64(), chunks_created, failed);
        info!(
            document_id = %document_id,
            chunks_created,
            pages_failed = failed,
            "Document indexed"
        );

        Ok(IndexOutcome {
            document_id,
            chunks_created,
            pages: outcomes,
        })
    }

    async fn process_page(
        &self,
        page: Page,
        use_multimodal: bool,
    ) -> (i32, std::result::Result<(Extraction, Vec<f32>), AppError>) {
        let page_number = page.number;
        let result = async {
            let extraction = match page.content {
                PageContent::Image(image) if use_multimodal => {
                    self.extractor.extract_from_image(&image).await?
                }
                PageContent::Image(_) => {
                    return Err(AppError::invalid_input(
                        "image page requires multimodal processing",
                    ))
                }
                PageContent::Text(text) => self.extractor.extract_from_text(&text).await?,
            };
            let embedding = self.embedder.embed(&extraction.text).await?;
            Ok((extraction, embedding))
        }
        .await;
        (page_number, result)
    }

    /// Remove a document's chunks ahead of a re-index; clears page_count
    #[instrument(skip(self))]
    pub async fn delete_chunks(&self, document_id: Uuid) -> Result<u64> {
        self.store
            .find_document(document_id)
            .await?
            .ok_or_else(|| AppError::not_found("document", document_id.to_string()))?;

        let removed = self.store.delete_chunks(document_id).await?;
        self.store.set_document_page_count(document_id, None).await?;
        info!(document_id = %document_id, removed, "Chunks deleted");
        Ok(removed)
    }
}
