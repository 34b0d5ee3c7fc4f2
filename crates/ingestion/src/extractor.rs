//! Multimodal page extraction
//!
//! Produces searchable text for one page. Image pages are transcribed by a
//! vision model; text pages run through a table heuristic and, when it
//! fires, a temperature-0 restructuring pass so tabular figures survive as
//! markdown instead of collapsing into word soup.

use lendscope_common::db::models::{ChunkMetadata, ProcessingMethod};
use lendscope_common::errors::Result;
use lendscope_common::llm::{CompletionOptions, LanguageModel};
use regex_lite::Regex;
use std::sync::Arc;

const VISION_PROMPT: &str = "Extract all text, tables, and structured data from this document page. \
     Format tables as markdown. Include all numerical data, labels, and context. \
     Be thorough and accurate.";

const RESTRUCTURE_PROMPT: &str = "Extract and structure all tables and data from this text. \
     Convert tables to markdown format. Preserve all numerical values and labels.";

/// Extraction result for one page
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Page-level extractor over a language model
pub struct MultimodalExtractor {
    llm: Arc<dyn LanguageModel>,
    number_rows: Regex,
}

impl MultimodalExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            // Three or more numbers separated by whitespace reads like a table row
            number_rows: Regex::new(r"\d+\s+\d+\s+\d+").expect("static regex"),
        }
    }

    /// Whether a text page looks like it contains tabular data
    pub fn looks_tabular(&self, text: &str) -> bool {
        text.contains('|') || self.number_rows.is_match(text)
    }

    /// Transcribe a page image into searchable text
    pub async fn extract_from_image(&self, image_png: &[u8]) -> Result<Extraction> {
        let text = self
            .llm
            .complete_with_image(VISION_PROMPT, image_png, &CompletionOptions::default())
            .await?;

        let has_tables = text.contains('|') || text.contains("Table");

        Ok(Extraction {
            text,
            metadata: ChunkMetadata {
                processing_method: ProcessingMethod::MultimodalVision,
                has_tables,
                has_images: true,
            },
        })
    }

    /// Process a text page, restructuring tables when the heuristic fires
    pub async fn extract_from_text(&self, page_text: &str) -> Result<Extraction> {
        if !self.looks_tabular(page_text) {
            return Ok(Extraction {
                text: page_text.to_string(),
                metadata: ChunkMetadata {
                    processing_method: ProcessingMethod::PlainText,
                    has_tables: false,
                    has_images: false,
                },
            });
        }

        let prompt = format!("{}\n\n{}", RESTRUCTURE_PROMPT, page_text);
        let options = CompletionOptions {
            temperature: Some(0.0),
            ..Default::default()
        };
        let text = self.llm.complete(&prompt, &options).await?;

        Ok(Extraction {
            text,
            metadata: ChunkMetadata {
                processing_method: ProcessingMethod::TextWithTableDetection,
                has_tables: true,
                has_images: false,
            },
        })
    }
}
