//! Grounded answer generation
//!
//! Builds a context block from retrieved sources and asks the model to
//! answer strictly from it, citing document names and page numbers. One
//! shot: a model failure surfaces as a dependency error, retries belong to
//! the caller.

use crate::retriever::RetrievedSource;
use lendscope_common::db::models::SourceRef;
use lendscope_common::errors::{AppError, Result};
use lendscope_common::llm::{CompletionOptions, LanguageModel};
use std::sync::Arc;
use tracing::instrument;

/// A generated answer with its supporting citations
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Assemble the context block, in retrieval order
pub fn build_context(sources: &[RetrievedSource]) -> String {
    sources
        .iter()
        .map(|s| {
            format!(
                "[Document: {}, Page {}]\n{}",
                s.document_name, s.page_number, s.chunk_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Answer generator over a language model
pub struct AnswerGenerator {
    llm: Arc<dyn LanguageModel>,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Generate a grounded answer to `question` from `sources`
    #[instrument(skip(self, question, sources))]
    pub async fn generate(
        &self,
        question: &str,
        sources: &[RetrievedSource],
    ) -> Result<GeneratedAnswer> {
        let context = build_context(sources);

        let prompt = format!(
            "You are a document review assistant. Answer questions based on the provided \
             document excerpts. The excerpts may contain tables, structured data, or images \
             that were converted to text. Always cite the document name and page number in \
             your answer. When referencing tables or numerical data, be precise and include \
             the exact values.\n\n\
             Question: {}\n\n\
             Context:\n{}\n\n\
             Answer the question based on the context above. If the context contains tables \
             or structured data, extract and reference the specific values. Always include \
             document name and page number references.",
            question, context
        );

        let answer = self
            .llm
            .complete(&prompt, &CompletionOptions::default())
            .await
            .map_err(|e| AppError::dependency("llm", e.to_string()))?;

        Ok(GeneratedAnswer {
            answer,
            sources: sources
                .iter()
                .map(|s| SourceRef {
                    document_id: s.document_id,
                    document_name: s.document_name.clone(),
                    page_number: s.page_number,
                    excerpt: s.excerpt.clone(),
                    relevance_score: s.relevance_score,
                })
                .collect(),
        })
    }
}
