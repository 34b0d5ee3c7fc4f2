//! Language model abstraction
//!
//! Chat-completions client used for page transcription (vision), table
//! restructuring, relevance scoring, and answer generation. The mock keeps
//! a transcript of prompts so tests can assert on exactly what was sent.

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Per-call completion options
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// Sampling temperature; provider default when None
    pub temperature: Option<f32>,

    /// Maximum output tokens; config default when None
    pub max_tokens: Option<usize>,
}

/// Trait for chat-completion generation
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a text-only prompt
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;

    /// Complete a prompt accompanied by a page image (PNG bytes)
    async fn complete_with_image(
        &self,
        prompt: &str,
        image_png: &[u8],
        options: &CompletionOptions,
    ) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI chat-completions client
pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    vision_model: String,
    default_max_tokens: usize,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiChatModel {
    /// Create a new chat client from config
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "llm.api_key is required".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            vision_model: config.vision_model.clone(),
            default_max_tokens: config.max_tokens,
        })
    }

    async fn send(&self, request: &ChatRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::dependency("llm", format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::dependency(
                "llm",
                format!("API error {}: {}", status, body),
            ));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::dependency("llm", format!("Failed to parse response: {}", e)))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::dependency("llm", "Empty response"))
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: json!(prompt),
            }],
            max_tokens: options.max_tokens.unwrap_or(self.default_max_tokens),
            temperature: options.temperature,
        };

        self.send(&request).await
    }

    async fn complete_with_image(
        &self,
        prompt: &str,
        image_png: &[u8],
        options: &CompletionOptions,
    ) -> Result<String> {
        let data_url = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(image_png)
        );

        let request = ChatRequest {
            model: self.vision_model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: json!([
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ]),
            }],
            max_tokens: options.max_tokens.unwrap_or(self.default_max_tokens),
            temperature: options.temperature,
        };

        self.send(&request).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

type Responder = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Mock language model for testing
///
/// Replies from a scripted queue, or via a responder closure when replies
/// should depend on the prompt. Every prompt is recorded for assertions.
pub struct MockLanguageModel {
    responses: Mutex<VecDeque<String>>,
    responder: Option<Responder>,
    prompts: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            responder: None,
            prompts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Mock whose reply is computed from the prompt
    pub fn with_responder(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(f)),
            prompts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Queue a scripted reply
    pub fn push_response(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push_back(response.into());
    }

    /// Make every subsequent call fail
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Prompts received so far, in call order
    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn reply(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::dependency("llm", "mock failure"));
        }

        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return Ok(response);
        }

        if let Some(responder) = &self.responder {
            return Ok(responder(prompt));
        }

        Ok("mock response".to_string())
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String> {
        self.reply(prompt)
    }

    async fn complete_with_image(
        &self,
        prompt: &str,
        _image_png: &[u8],
        _options: &CompletionOptions,
    ) -> Result<String> {
        self.reply(prompt)
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}

/// Create a language model based on configuration
pub fn create_language_model(config: &LlmConfig) -> Result<std::sync::Arc<dyn LanguageModel>> {
    match config.api_key {
        Some(_) => Ok(std::sync::Arc::new(OpenAiChatModel::new(config)?)),
        None => {
            tracing::warn!("No LLM API key configured, using mock language model");
            Ok(std::sync::Arc::new(MockLanguageModel::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_scripted_replies_in_order() {
        let model = MockLanguageModel::new();
        model.push_response("first");
        model.push_response("second");

        let options = CompletionOptions::default();
        assert_eq!(model.complete("a", &options).await.unwrap(), "first");
        assert_eq!(model.complete("b", &options).await.unwrap(), "second");
        assert_eq!(model.recorded_prompts(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_mock_failure_flag() {
        let model = MockLanguageModel::new();
        model.set_failing(true);
        let err = model
            .complete("a", &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("llm"));
    }

    #[tokio::test]
    async fn test_mock_responder_sees_prompt() {
        let model = MockLanguageModel::with_responder(|prompt| {
            if prompt.contains("revenue") {
                "0.9".to_string()
            } else {
                "0.1".to_string()
            }
        });
        let options = CompletionOptions::default();
        assert_eq!(
            model.complete("rate the revenue", &options).await.unwrap(),
            "0.9"
        );
        assert_eq!(model.complete("other", &options).await.unwrap(), "0.1");
    }
}
