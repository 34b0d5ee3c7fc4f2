//! End-to-end review flow over the in-memory store: index a document,
//! run a checklist, and walk the working-paper life cycle.

use async_trait::async_trait;
use lendscope_common::db::models::{Question, WorkingPaperStatus};
use lendscope_common::db::MemoryStore;
use lendscope_common::errors::{AppError, Result};
use lendscope_common::llm::{CompletionOptions, LanguageModel, MockLanguageModel};
use lendscope_common::storage::MemoryObjectStore;
use lendscope_common::transformer::MockTransformer;
use lendscope_common::{Embedder, PAGE_BREAK};
use lendscope_ingestion::{DocumentIndexer, IndexRequest, MultimodalExtractor};
use lendscope_review::{AnswerGenerator, Retriever, RetrieverConfig, ReviewOrchestrator};
use std::sync::Arc;
use uuid::Uuid;

/// Deterministic embedder: revenue-flavored text lands near [0, 1],
/// everything else near [1, 0]
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("$600,000") {
            Ok(vec![0.0, 1.0])
        } else if text.to_lowercase().contains("revenue") {
            Ok(vec![0.1, 0.9])
        } else {
            Ok(vec![1.0, 0.0])
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        "keyword-embedding"
    }

    fn dimension(&self) -> usize {
        2
    }
}

/// Echoes the question back; slow for the first question, and failing for
/// questions marked FAILME
struct EchoLlm;

#[async_trait]
impl LanguageModel for EchoLlm {
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String> {
        if prompt.contains("FAILME") {
            return Err(AppError::dependency("llm", "synthetic outage"));
        }
        if prompt.contains("Question: Alpha") {
            // Give later questions a head start to prove order is preserved
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        let question = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Question: "))
            .unwrap_or("unknown");
        Ok(format!("answer to: {}", question))
    }

    async fn complete_with_image(
        &self,
        prompt: &str,
        _image_png: &[u8],
        options: &CompletionOptions,
    ) -> Result<String> {
        self.complete(prompt, options).await
    }

    fn model_name(&self) -> &str {
        "echo-llm"
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    objects: Arc<MemoryObjectStore>,
    transformer: Arc<MockTransformer>,
    orchestrator: ReviewOrchestrator<MemoryStore>,
}

fn harness(llm: Arc<dyn LanguageModel>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder);
    let transformer = Arc::new(MockTransformer::new());

    let retriever = Retriever::new(
        store.clone(),
        embedder,
        llm.clone(),
        RetrieverConfig::default(),
    );
    let orchestrator = ReviewOrchestrator::new(
        store.clone(),
        retriever,
        AnswerGenerator::new(llm),
        Some(transformer.clone()),
        4,
    );

    Harness {
        store,
        objects,
        transformer,
        orchestrator,
    }
}

async fn index_financials(h: &Harness, llm: Arc<dyn LanguageModel>, project: Uuid) -> Uuid {
    let document = h
        .store
        .add_document(project, "financials.pdf", "docs/financials.pdf");
    h.objects.put("docs/financials.pdf", vec![0]);

    let indexer = DocumentIndexer::new(
        h.store.clone(),
        h.objects.clone(),
        Arc::new(MultimodalExtractor::new(llm)),
        Arc::new(KeywordEmbedder),
        2,
    );

    let text = format!(
        "Alpha narrative overview of the borrower.{}Q2 Revenue: $600,000",
        PAGE_BREAK
    );
    let outcome = indexer
        .index_document(IndexRequest {
            document_id: document.id,
            use_multimodal: true,
            images: None,
            text_content: Some(text),
        })
        .await
        .unwrap();
    assert_eq!(outcome.chunks_created, 2);

    document.id
}

fn question(text: &str) -> Question {
    Question {
        id: Uuid::new_v4(),
        question: text.to_string(),
        category: None,
        required: false,
    }
}

#[tokio::test]
async fn end_to_end_review_cites_the_right_page() {
    let llm = Arc::new(MockLanguageModel::with_responder(|_| {
        "Q2 revenue was $600,000 (financials.pdf, page 2).".to_string()
    }));
    let h = harness(llm.clone());
    let project = Uuid::new_v4();
    index_financials(&h, llm.clone(), project).await;

    let checklist = h
        .store
        .add_checklist("Credit Review", vec![question("What was the Q2 revenue?")]);

    let paper = h.orchestrator.run_review(project, checklist.id).await.unwrap();

    assert_eq!(paper.paper_status(), WorkingPaperStatus::Draft);
    assert_eq!(paper.title, "Credit Review - Review");

    let content = paper.parse_content();
    assert_eq!(content.len(), 1);
    assert!(content[0].error.is_none());
    assert!(content[0].answer.contains("$600,000"));
    assert_eq!(content[0].sources.len(), 1);
    assert_eq!(content[0].sources[0].page_number, 2);
    assert_eq!(content[0].sources[0].document_name, "financials.pdf");

    // The answer prompt was grounded in the page-2 chunk, not page 1
    let answer_prompt = llm
        .recorded_prompts()
        .into_iter()
        .find(|p| p.contains("Context:"))
        .expect("answer prompt recorded");
    assert!(answer_prompt.contains("[Document: financials.pdf, Page 2]\nQ2 Revenue: $600,000"));
    assert!(!answer_prompt.contains("Page 1"));
}

#[tokio::test]
async fn answers_keep_checklist_order_under_concurrency() {
    let llm: Arc<dyn LanguageModel> = Arc::new(EchoLlm);
    let h = harness(llm.clone());
    let project = Uuid::new_v4();
    index_financials(&h, llm.clone(), project).await;

    let checklist = h.store.add_checklist(
        "Ordering",
        vec![
            question("Alpha question about the borrower?"),
            question("What was the revenue?"),
            question("Any other revenue details?"),
        ],
    );

    let paper = h.orchestrator.run_review(project, checklist.id).await.unwrap();
    let content = paper.parse_content();

    assert_eq!(content.len(), 3);
    assert!(content[0].question.starts_with("Alpha"));
    assert!(content[0].answer.contains("Alpha"));
    assert_eq!(content[1].question, "What was the revenue?");
    assert_eq!(content[2].question, "Any other revenue details?");
}

#[tokio::test]
async fn failed_question_keeps_its_slot() {
    let llm: Arc<dyn LanguageModel> = Arc::new(EchoLlm);
    let h = harness(llm.clone());
    let project = Uuid::new_v4();
    index_financials(&h, llm.clone(), project).await;

    let checklist = h.store.add_checklist(
        "Partial",
        vec![
            question("FAILME revenue question?"),
            question("What was the revenue?"),
        ],
    );

    let paper = h.orchestrator.run_review(project, checklist.id).await.unwrap();
    let content = paper.parse_content();

    assert_eq!(content.len(), 2);
    assert!(content[0].error.is_some());
    assert!(content[0].answer.is_empty());
    assert!(content[0].sources.is_empty());
    assert!(content[1].error.is_none());
    assert!(content[1].answer.contains("answer to:"));
}

#[tokio::test]
async fn inactive_checklist_is_rejected() {
    let llm: Arc<dyn LanguageModel> = Arc::new(EchoLlm);
    let h = harness(llm.clone());
    let project = Uuid::new_v4();

    let checklist = h.store.add_checklist("Dormant", vec![question("Q?")]);
    h.store.set_checklist_active(checklist.id, false);

    let err = h
        .orchestrator
        .run_review(project, checklist.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput { .. }));

    let empty = h.store.add_checklist("Empty", vec![]);
    let err = h.orchestrator.run_review(project, empty.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput { .. }));

    let err = h
        .orchestrator
        .run_review(project, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[tokio::test]
async fn rerun_overwrites_latest_working_paper() {
    let llm: Arc<dyn LanguageModel> = Arc::new(EchoLlm);
    let h = harness(llm.clone());
    let project = Uuid::new_v4();
    index_financials(&h, llm.clone(), project).await;

    let checklist = h
        .store
        .add_checklist("Credit Review", vec![question("What was the revenue?")]);

    let first = h.orchestrator.run_review(project, checklist.id).await.unwrap();
    let second = h.orchestrator.run_review(project, checklist.id).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.paper_status(), WorkingPaperStatus::Draft);
}

#[tokio::test]
async fn finalize_without_submission_marks_reviewed() {
    let llm: Arc<dyn LanguageModel> = Arc::new(EchoLlm);
    let h = harness(llm.clone());
    let project = Uuid::new_v4();
    index_financials(&h, llm.clone(), project).await;

    let checklist = h
        .store
        .add_checklist("Credit Review", vec![question("What was the revenue?")]);
    let paper = h.orchestrator.run_review(project, checklist.id).await.unwrap();

    let finalized = h.orchestrator.finalize(paper.id, false).await.unwrap();
    assert_eq!(finalized.paper_status(), WorkingPaperStatus::Reviewed);
    assert!(finalized.submission_id.is_none());
    assert!(finalized.submitted_at.is_none());
    assert!(h.transformer.submitted_texts().is_empty());
}

#[tokio::test]
async fn finalize_with_submission_marks_submitted() {
    let llm: Arc<dyn LanguageModel> = Arc::new(EchoLlm);
    let h = harness(llm.clone());
    let project = Uuid::new_v4();
    index_financials(&h, llm.clone(), project).await;

    let checklist = h
        .store
        .add_checklist("Credit Review", vec![question("What was the revenue?")]);
    let paper = h.orchestrator.run_review(project, checklist.id).await.unwrap();

    let finalized = h.orchestrator.finalize(paper.id, true).await.unwrap();
    assert_eq!(finalized.paper_status(), WorkingPaperStatus::Submitted);
    assert_eq!(finalized.submission_id.as_deref(), Some("sub-1"));
    assert!(finalized.submitted_at.is_some());

    let submitted = h.transformer.submitted_texts();
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0].contains("Question: What was the revenue?"));
    assert!(submitted[0].contains("Sources:\n- financials.pdf, Page"));
}

#[tokio::test]
async fn submission_failure_degrades_to_reviewed() {
    let llm: Arc<dyn LanguageModel> = Arc::new(EchoLlm);
    let h = harness(llm.clone());
    let project = Uuid::new_v4();
    index_financials(&h, llm.clone(), project).await;

    let checklist = h
        .store
        .add_checklist("Credit Review", vec![question("What was the revenue?")]);
    let paper = h.orchestrator.run_review(project, checklist.id).await.unwrap();

    h.transformer.set_failing(true);
    let finalized = h.orchestrator.finalize(paper.id, true).await.unwrap();
    assert_eq!(finalized.paper_status(), WorkingPaperStatus::Reviewed);
    assert!(finalized.submission_id.is_none());
}

#[tokio::test]
async fn fallback_path_is_capability_driven() {
    let llm = Arc::new(MockLanguageModel::with_responder(|prompt| {
        if prompt.starts_with("Rate the relevance") {
            if prompt.contains("$600,000") {
                "0.95".to_string()
            } else {
                "0.1".to_string()
            }
        } else {
            "Q2 revenue was $600,000.".to_string()
        }
    }));
    let h = harness(llm.clone());
    let project = Uuid::new_v4();
    index_financials(&h, llm.clone(), project).await;
    h.store.set_vector_search_available(false);

    let checklist = h
        .store
        .add_checklist("Credit Review", vec![question("What was the Q2 revenue?")]);
    let paper = h.orchestrator.run_review(project, checklist.id).await.unwrap();

    let content = paper.parse_content();
    assert!(content[0].error.is_none());
    // Fallback carries its LLM ratings through to the stored citations
    assert_eq!(content[0].sources[0].relevance_score, Some(0.95));
    assert_eq!(content[0].sources[0].page_number, 2);
}
