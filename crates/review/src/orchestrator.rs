//! Checklist review orchestration
//!
//! Runs every checklist question through retrieval and answer generation,
//! persists the result as a working paper, and handles the finalize /
//! submit life cycle. A failed question keeps its slot with the error
//! recorded; the review always completes.

use crate::answerer::AnswerGenerator;
use crate::retriever::Retriever;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use lendscope_common::db::models::{AnswerRecord, Question, WorkingPaper, WorkingPaperStatus};
use lendscope_common::db::{NewWorkingPaper, ReviewStore};
use lendscope_common::errors::{AppError, Result};
use lendscope_common::metrics::record_review;
use lendscope_common::transformer::Transformer;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Review pipeline over injected providers
pub struct ReviewOrchestrator<S: ReviewStore> {
    store: Arc<S>,
    retriever: Retriever<S>,
    answerer: AnswerGenerator,
    transformer: Option<Arc<dyn Transformer>>,
    question_concurrency: usize,
}

impl<S: ReviewStore> ReviewOrchestrator<S> {
    pub fn new(
        store: Arc<S>,
        retriever: Retriever<S>,
        answerer: AnswerGenerator,
        transformer: Option<Arc<dyn Transformer>>,
        question_concurrency: usize,
    ) -> Self {
        Self {
            store,
            retriever,
            answerer,
            transformer,
            question_concurrency: question_concurrency.max(1),
        }
    }

    /// Run a checklist against a project's documents and persist the result
    /// as a draft working paper.
    ///
    /// The project's most recently updated working paper is overwritten when
    /// one exists; otherwise a new one is created.
    #[instrument(skip(self), fields(review_project_id = %review_project_id, checklist_id = %checklist_id))]
    pub async fn run_review(
        &self,
        review_project_id: Uuid,
        checklist_id: Uuid,
    ) -> Result<WorkingPaper> {
        let started = Instant::now();

        let checklist = self
            .store
            .find_checklist(checklist_id)
            .await?
            .ok_or_else(|| AppError::not_found("checklist", checklist_id.to_string()))?;

        if !checklist.is_active {
            return Err(AppError::invalid_input(format!(
                "checklist {} is not active",
                checklist_id
            )));
        }

        let questions = checklist.parse_questions();
        if questions.is_empty() {
            return Err(AppError::invalid_input(format!(
                "checklist {} has no questions",
                checklist_id
            )));
        }

        let question_count = questions.len();
        let answers: Vec<AnswerRecord> = stream::iter(questions)
            .map(|question| self.answer_question(review_project_id, question))
            .buffered(self.question_concurrency)
            .collect()
            .await;

        let failed = answers.iter().filter(|a| a.error.is_some()).count();
        let title = format!("{} - Review", checklist.name);

        let paper = match self.store.find_latest_working_paper(review_project_id).await? {
            Some(existing) => {
                self.store
                    .update_working_paper_content(existing.id, checklist_id, &title, &answers)
                    .await?
            }
            None => {
                self.store
                    .insert_working_paper(NewWorkingPaper {
                        review_project_id,
                        checklist_id,
                        title,
                        content: answers,
                        status: WorkingPaperStatus::Draft,
                    })
                    .await?
            }
        };

        record_review(started.elapsed().as_secs_f64(), question_count, failed);
        info!(
            working_paper_id = %paper.id,
            questions = question_count,
            failed,
            "Review complete"
        );

        Ok(paper)
    }

    /// Answer one question; failures are recorded, never thrown
    async fn answer_question(&self, review_project_id: Uuid, question: Question) -> AnswerRecord {
        let k = self.retriever.config().top_k;

        let result = async {
            let retrieval = self
                .retriever
                .retrieve(review_project_id, &question.question, k)
                .await?;
            self.answerer
                .generate(&question.question, &retrieval.sources)
                .await
        }
        .await;

        match result {
            Ok(generated) => AnswerRecord {
                question_id: question.id,
                question: question.question,
                answer: generated.answer,
                error: None,
                sources: generated.sources,
            },
            Err(e) => {
                warn!(question_id = %question.id, error = %e, "Question failed");
                AnswerRecord {
                    question_id: question.id,
                    question: question.question,
                    answer: String::new(),
                    error: Some(e.to_string()),
                    sources: Vec::new(),
                }
            }
        }
    }

    /// Mark a working paper reviewed, optionally submitting it to the
    /// external transformer first.
    ///
    /// A transformer failure degrades the result to reviewed; the local
    /// write always succeeds.
    #[instrument(skip(self))]
    pub async fn finalize(
        &self,
        working_paper_id: Uuid,
        submit_externally: bool,
    ) -> Result<WorkingPaper> {
        let paper = self
            .store
            .find_working_paper(working_paper_id)
            .await?
            .ok_or_else(|| AppError::not_found("working paper", working_paper_id.to_string()))?;

        if submit_externally {
            if let Some(transformer) = &self.transformer {
                let text = paper.to_unstructured_text();
                match transformer.transform(&text).await {
                    Ok(receipt) => {
                        info!(
                            working_paper_id = %working_paper_id,
                            submission_id = %receipt.submission_id,
                            "Working paper submitted"
                        );
                        return self
                            .store
                            .set_working_paper_status(
                                working_paper_id,
                                WorkingPaperStatus::Submitted,
                                Some(receipt.submission_id),
                                Some(Utc::now()),
                            )
                            .await;
                    }
                    Err(e) => {
                        warn!(
                            working_paper_id = %working_paper_id,
                            error = %e,
                            "External submission failed, keeping paper reviewed"
                        );
                    }
                }
            } else {
                warn!(
                    working_paper_id = %working_paper_id,
                    "No transformer configured, keeping paper reviewed"
                );
            }
        }

        self.store
            .set_working_paper_status(working_paper_id, WorkingPaperStatus::Reviewed, None, None)
            .await
    }
}
