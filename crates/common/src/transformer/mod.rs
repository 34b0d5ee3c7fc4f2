//! External transformer hand-off
//!
//! Finalized working papers are submitted as unstructured text to an
//! external structuring service. The caller treats submission as optional:
//! a transformer failure degrades the outcome, it never fails the request.

use crate::config::TransformerConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Receipt returned by the transformer
#[derive(Debug, Clone)]
pub struct TransformSubmission {
    pub submission_id: String,
}

/// Trait for submitting text to the external transformer
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(&self, text: &str) -> Result<TransformSubmission>;
}

/// HTTP client for the transformer service
pub struct HttpTransformer {
    client: reqwest::Client,
    api_url: String,
    api_token: Option<String>,
}

impl HttpTransformer {
    /// Create a client; None when no endpoint is configured
    pub fn from_config(config: &TransformerConfig) -> Result<Option<Self>> {
        let Some(api_url) = config.api_url.clone() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Some(Self {
            client,
            api_url,
            api_token: config.api_token.clone(),
        }))
    }

    fn extract_submission_id(value: &serde_json::Value) -> String {
        value
            .get("id")
            .or_else(|| value.get("submission_id"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

#[async_trait]
impl Transformer for HttpTransformer {
    async fn transform(&self, text: &str) -> Result<TransformSubmission> {
        let mut request = self.client.post(&self.api_url).json(&json!({ "text": text }));
        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::dependency("transformer", format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::dependency(
                "transformer",
                format!("API error {}: {}", status, body),
            ));
        }

        // Some deployments reply with text/plain that is still JSON
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("application/json"))
            .unwrap_or(false);

        let value: serde_json::Value = if is_json {
            response.json().await.map_err(|e| {
                AppError::dependency("transformer", format!("Failed to parse response: {}", e))
            })?
        } else {
            let body = response.text().await.unwrap_or_default();
            serde_json::from_str(&body).map_err(|e| {
                AppError::dependency(
                    "transformer",
                    format!("Unparseable response body: {}", e),
                )
            })?
        };

        Ok(TransformSubmission {
            submission_id: Self::extract_submission_id(&value),
        })
    }
}

/// Mock transformer for testing
#[derive(Default)]
pub struct MockTransformer {
    submissions: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl MockTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Texts submitted so far, in call order
    pub fn submitted_texts(&self) -> Vec<String> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transformer for MockTransformer {
    async fn transform(&self, text: &str) -> Result<TransformSubmission> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::dependency("transformer", "mock failure"));
        }
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(text.to_string());
        Ok(TransformSubmission {
            submission_id: format!("sub-{}", submissions.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_id_fallbacks() {
        assert_eq!(
            HttpTransformer::extract_submission_id(&json!({ "id": "abc" })),
            "abc"
        );
        assert_eq!(
            HttpTransformer::extract_submission_id(&json!({ "submission_id": "def" })),
            "def"
        );
        assert_eq!(
            HttpTransformer::extract_submission_id(&json!({ "other": 1 })),
            "unknown"
        );
    }

    async fn serve(body: &'static str) -> HttpTransformer {
        use axum::{routing::post, Router};

        let app = Router::new().route("/", post(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        HttpTransformer::from_config(&TransformerConfig {
            api_url: Some(format!("http://{}", addr)),
            api_token: None,
            timeout_secs: 5,
        })
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    async fn test_plain_text_reply_holding_json_still_parses() {
        let transformer = serve(r#"{"id":"abc-123"}"#).await;
        let receipt = transformer.transform("some text").await.unwrap();
        assert_eq!(receipt.submission_id, "abc-123");
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_a_hard_failure() {
        let transformer = serve("OK - received your text").await;
        let err = transformer.transform("some text").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Dependency {
                service: "transformer",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_mock_transformer_records_text() {
        let transformer = MockTransformer::new();
        let receipt = transformer.transform("Question: a\nAnswer: b").await.unwrap();
        assert_eq!(receipt.submission_id, "sub-1");
        assert_eq!(transformer.submitted_texts().len(), 1);
    }
}
