pub mod http;

pub use http::HttpVisionClient;

use async_trait::async_trait;
use thiserror::Error;

/// Failures talking to the remote face service. Callers map these to a
/// rejection, never to an implicit accept.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("face service request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("face service returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("face service response malformed: {0}")]
    Malformed(String),
}

/// Normalized detection result. The gateway makes no accept/reject decision:
/// registration and verification apply different policies to the count.
#[derive(Debug, Clone, Copy)]
pub struct FaceDetection {
    pub face_count: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct FaceComparison {
    /// 0-100 likeness score from the remote service.
    pub similarity: f32,
    /// Re-derived locally (`similarity >= threshold`) so the decision never
    /// silently depends on the remote default.
    pub is_match: bool,
}

/// Boundary to the external vision capability.
#[async_trait]
pub trait FaceScan: Send + Sync {
    async fn detect_faces(&self, image: &[u8]) -> Result<FaceDetection, VisionError>;

    async fn compare_faces(
        &self,
        source: &[u8],
        target: &[u8],
        threshold: f32,
    ) -> Result<FaceComparison, VisionError>;
}

/// Inclusive on the boundary: a score exactly at the threshold matches.
pub fn derive_match(similarity: f32, threshold: f32) -> bool {
    similarity >= threshold
}

#[cfg(test)]
mod tests {
    use super::derive_match;

    #[test]
    fn score_equal_to_threshold_matches() {
        assert!(derive_match(90.0, 90.0));
    }

    #[test]
    fn score_below_threshold_does_not_match() {
        assert!(!derive_match(89.99, 90.0));
        assert!(!derive_match(0.0, 90.0));
    }
}
