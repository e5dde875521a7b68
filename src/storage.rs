use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetStoreError {
    #[error("asset store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("asset store returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("asset store response malformed: {0}")]
    Malformed(String),
}

/// Durable home for accepted check-in/out images and registration reference
/// images. Transient verification artifacts never go here.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        filename: &str,
    ) -> Result<String, AssetStoreError>;
}

pub struct HttpAssetStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

impl HttpAssetStore {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        filename: &str,
    ) -> Result<String, AssetStoreError> {
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(filename.to_string()))
            .text("folder", folder.to_string());

        let resp = self
            .http
            .post(format!("{}/upload", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AssetStoreError::Status(resp.status()));
        }

        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| AssetStoreError::Malformed(e.to_string()))?;

        if body.url.is_empty() {
            return Err(AssetStoreError::Malformed("empty url in response".into()));
        }

        Ok(body.url)
    }
}
