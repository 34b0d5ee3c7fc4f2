//! Lendscope ingestion pipeline
//!
//! Turns an uploaded document into embedded, page-aligned chunks:
//! chunking splits the input into pages, extraction produces searchable
//! text per page (vision transcription for images, table restructuring for
//! text), and the indexer embeds and persists the results.

pub mod chunker;
pub mod extractor;
pub mod indexer;

pub use chunker::{split_pages, Page, PageContent, PageSource};
pub use extractor::{Extraction, MultimodalExtractor};
pub use indexer::{DocumentIndexer, IndexOutcome, IndexRequest, PageOutcome};
