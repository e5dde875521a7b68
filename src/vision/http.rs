use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{FaceComparison, FaceDetection, FaceScan, VisionError, derive_match};

/// HTTP client for the face service. Constructed once at startup from
/// `Config` and injected wherever detection/comparison is needed, so tests
/// can substitute a double.
pub struct HttpVisionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct DetectResponse {
    faces: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct CompareResponse {
    matches: Vec<CompareMatch>,
}

#[derive(Deserialize)]
struct CompareMatch {
    similarity: f32,
}

impl HttpVisionClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn image_part(bytes: &[u8]) -> Part {
        Part::bytes(bytes.to_vec()).file_name("image")
    }
}

#[async_trait]
impl FaceScan for HttpVisionClient {
    async fn detect_faces(&self, image: &[u8]) -> Result<FaceDetection, VisionError> {
        let form = Form::new().part("image", Self::image_part(image));

        let resp = self
            .http
            .post(format!("{}/detect", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(VisionError::Status(resp.status()));
        }

        let body: DetectResponse = resp
            .json()
            .await
            .map_err(|e| VisionError::Malformed(e.to_string()))?;

        Ok(FaceDetection {
            face_count: body.faces.len(),
        })
    }

    async fn compare_faces(
        &self,
        source: &[u8],
        target: &[u8],
        threshold: f32,
    ) -> Result<FaceComparison, VisionError> {
        let form = Form::new()
            .part("source", Self::image_part(source))
            .part("target", Self::image_part(target))
            .text("threshold", threshold.to_string());

        let resp = self
            .http
            .post(format!("{}/compare", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(VisionError::Status(resp.status()));
        }

        let body: CompareResponse = resp
            .json()
            .await
            .map_err(|e| VisionError::Malformed(e.to_string()))?;

        // No match entry at all means the service found nothing comparable.
        let similarity = body.matches.first().map(|m| m.similarity).unwrap_or(0.0);

        Ok(FaceComparison {
            similarity,
            is_match: derive_match(similarity, threshold),
        })
    }
}
