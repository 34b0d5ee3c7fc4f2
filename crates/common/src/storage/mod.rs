//! Object storage access
//!
//! Documents are uploaded to a Supabase-style storage service; the indexer
//! only ever needs authenticated downloads by path.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Trait for reading stored objects
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download an object's bytes by its storage path
    async fn download(&self, path: &str) -> Result<Vec<u8>>;
}

/// HTTP client for a Supabase-style storage API
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    service_key: Option<String>,
}

impl HttpObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            service_key: config.service_key.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, path);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.service_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| AppError::Storage {
            message: format!("Download failed: {}", e),
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(AppError::not_found("object", path.to_string())),
            status if !status.is_success() => Err(AppError::Storage {
                message: format!("Download failed with status {}", status),
            }),
            _ => {
                let bytes = response.bytes().await.map_err(|e| AppError::Storage {
                    message: format!("Failed to read body: {}", e),
                })?;
                Ok(bytes.to_vec())
            }
        }
    }
}

/// In-memory object store for tests
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object
    pub fn put(&self, path: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(path.to_string(), bytes);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::not_found("object", path.to_string()))
    }
}
