//! Configuration management for Lendscope services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{env}.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Object storage configuration
    pub storage: StorageConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Language model configuration
    pub llm: LlmConfig,

    /// Indexing configuration
    pub indexing: IndexingConfig,

    /// Retrieval configuration
    pub retrieval: RetrievalConfig,

    /// Review orchestration configuration
    pub review: ReviewConfig,

    /// External transformer configuration
    pub transformer: TransformerConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Whether the `match_document_chunks` similarity search is installed.
    /// When false the retriever uses per-chunk LLM scoring instead.
    #[serde(default = "default_vector_search")]
    pub vector_search_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Object store base URL
    pub base_url: String,

    /// Bucket holding uploaded documents
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Service key for authenticated downloads
    pub service_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// API key for the embedding provider
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// API key
    pub api_key: Option<String>,

    /// Chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Model for text completion and table structuring
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Vision-capable model for page-image extraction
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Maximum output tokens
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexingConfig {
    /// Concurrent page tasks per document
    #[serde(default = "default_page_concurrency")]
    pub page_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Default number of chunks to retrieve per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum cosine similarity for vector search matches
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReviewConfig {
    /// Concurrent question tasks per checklist run
    #[serde(default = "default_question_concurrency")]
    pub question_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransformerConfig {
    /// External transformer endpoint
    pub api_url: Option<String>,

    /// Bearer token for the transformer
    pub api_token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_transformer_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_shutdown_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    50
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    300
}
fn default_vector_search() -> bool {
    true
}
fn default_bucket() -> String {
    "documents".to_string()
}
fn default_storage_timeout() -> u64 {
    30
}
fn default_embedding_model() -> String {
    crate::DEFAULT_EMBEDDING_MODEL.to_string()
}
fn default_embedding_dimension() -> usize {
    crate::DEFAULT_EMBEDDING_DIMENSION
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_embedding_retries() -> u32 {
    3
}
fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_vision_model() -> String {
    "gpt-4o".to_string()
}
fn default_llm_max_tokens() -> usize {
    4096
}
fn default_llm_timeout() -> u64 {
    60
}
fn default_page_concurrency() -> usize {
    4
}
fn default_top_k() -> usize {
    5
}
fn default_similarity_threshold() -> f32 {
    0.7
}
fn default_question_concurrency() -> usize {
    4
}
fn default_transformer_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_json_logging() -> bool {
    true
}
fn default_service_name() -> String {
    "lendscope".to_string()
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/lendscope".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                vector_search_enabled: default_vector_search(),
            },
            storage: StorageConfig {
                base_url: "http://localhost:54321/storage/v1".to_string(),
                bucket: default_bucket(),
                service_key: None,
                timeout_secs: default_storage_timeout(),
            },
            embedding: EmbeddingConfig {
                api_key: None,
                api_base: None,
                model: default_embedding_model(),
                dimension: default_embedding_dimension(),
                timeout_secs: default_embedding_timeout(),
                max_retries: default_embedding_retries(),
            },
            llm: LlmConfig {
                api_key: None,
                endpoint: default_llm_endpoint(),
                model: default_llm_model(),
                vision_model: default_vision_model(),
                max_tokens: default_llm_max_tokens(),
                timeout_secs: default_llm_timeout(),
            },
            indexing: IndexingConfig {
                page_concurrency: default_page_concurrency(),
            },
            retrieval: RetrievalConfig {
                top_k: default_top_k(),
                similarity_threshold: default_similarity_threshold(),
            },
            review: ReviewConfig {
                question_concurrency: default_question_concurrency(),
            },
            transformer: TransformerConfig {
                api_url: None,
                api_token: None,
                timeout_secs: default_transformer_timeout(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                service_name: default_service_name(),
            },
        }
    }
}
