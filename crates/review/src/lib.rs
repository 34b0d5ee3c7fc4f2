//! Lendscope review pipeline
//!
//! Answers checklist questions over a project's indexed documents:
//! the retriever finds supporting chunks (vector search, or an LLM-scored
//! fallback when similarity search is unavailable), the answerer generates
//! a grounded, cited answer, and the orchestrator runs whole checklists
//! into working papers and hands finalized papers to the external
//! transformer.

pub mod answerer;
pub mod orchestrator;
pub mod retriever;

pub use answerer::{build_context, AnswerGenerator, GeneratedAnswer};
pub use orchestrator::ReviewOrchestrator;
pub use retriever::{Retrieval, RetrievalPath, RetrievedSource, Retriever, RetrieverConfig};
