//! Lendscope API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Document processing (chunk, extract, embed, index)
//! - RAG queries over indexed documents
//! - Checklist reviews and working-paper life cycle
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    routing::{delete, get, post},
    Router,
};
use lendscope_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    embeddings::create_embedder,
    llm::create_language_model,
    metrics,
    storage::HttpObjectStore,
    transformer::{HttpTransformer, Transformer},
};
use lendscope_ingestion::{DocumentIndexer, MultimodalExtractor};
use lendscope_review::{AnswerGenerator, Retriever, RetrieverConfig, ReviewOrchestrator};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<Repository>,
    pub indexer: Arc<DocumentIndexer<Repository>>,
    pub retriever: Arc<Retriever<Repository>>,
    pub answerer: Arc<AnswerGenerator>,
    pub orchestrator: Arc<ReviewOrchestrator<Repository>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting Lendscope API Gateway v{}", lendscope_common::VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let pool = DbPool::connect(&config.database).await?;
    let store = Arc::new(Repository::new(
        pool,
        config.database.vector_search_enabled,
    ));

    // Providers
    let objects = Arc::new(HttpObjectStore::new(&config.storage)?);
    let embedder = create_embedder(&config.embedding)?;
    let llm = create_language_model(&config.llm)?;
    let transformer: Option<Arc<dyn Transformer>> = HttpTransformer::from_config(&config.transformer)?
        .map(|t| Arc::new(t) as Arc<dyn Transformer>);

    // Pipelines
    let extractor = Arc::new(MultimodalExtractor::new(llm.clone()));
    let indexer = Arc::new(DocumentIndexer::new(
        store.clone(),
        objects,
        extractor,
        embedder.clone(),
        config.indexing.page_concurrency,
    ));

    let retriever_config = RetrieverConfig {
        top_k: config.retrieval.top_k,
        similarity_threshold: config.retrieval.similarity_threshold,
    };
    let retriever = Arc::new(Retriever::new(
        store.clone(),
        embedder.clone(),
        llm.clone(),
        retriever_config.clone(),
    ));
    let answerer = Arc::new(AnswerGenerator::new(llm.clone()));
    let orchestrator = Arc::new(ReviewOrchestrator::new(
        store.clone(),
        Retriever::new(store.clone(), embedder, llm.clone(), retriever_config),
        AnswerGenerator::new(llm),
        transformer,
        config.review.question_concurrency,
    ));

    // Create app state
    let state = AppState {
        config: config.clone(),
        store,
        indexer,
        retriever,
        answerer,
        orchestrator,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Document processing endpoints
        .route(
            "/documents/{id}/process",
            post(handlers::documents::process_document),
        )
        .route(
            "/documents/{id}/chunks",
            delete(handlers::documents::delete_chunks),
        )
        // RAG endpoints
        .route("/rag/query", post(handlers::rag::query))
        // Review endpoints
        .route("/reviews", post(handlers::working_papers::run_review))
        .route(
            "/working-papers/{id}/finalize",
            post(handlers::working_papers::finalize),
        );

    // Compose the app
    Router::new()
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::metrics::track_requests))
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
