//! Lendscope Common Library
//!
//! Shared code for all Lendscope services including:
//! - Database models, repository, and the review-store seam
//! - Embedding and language-model provider abstractions
//! - Object-store and external-transformer clients
//! - Error types and handling
//! - Configuration management
//! - Metrics

pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod storage;
pub mod transformer;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{MemoryStore, Repository, ReviewStore};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::LanguageModel;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Default embedding dimension (text-embedding-ada-002)
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Sentinel delimiting pages within a single plain-text blob.
/// Chosen to never occur in ordinary document text.
pub const PAGE_BREAK: &str = "\n\n---PAGE_BREAK---\n\n";
