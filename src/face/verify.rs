use std::sync::Arc;

use tracing::{info, warn};

use crate::model::subject::FaceSubject;
use crate::utils::reference_cache;
use crate::vision::FaceScan;

use super::{RejectReason, TempAsset, image_check};

/// Outcome of one verification attempt. The similarity score is carried even
/// on rejection so the subject can gauge near-misses.
#[derive(Debug, Clone, Copy)]
pub struct VerificationResult {
    pub accepted: bool,
    pub similarity: f32,
    pub reason: Option<RejectReason>,
}

impl VerificationResult {
    fn accept(similarity: f32) -> Self {
        Self {
            accepted: true,
            similarity,
            reason: None,
        }
    }

    fn reject(reason: RejectReason) -> Self {
        Self::reject_scored(reason, 0.0)
    }

    fn reject_scored(reason: RejectReason, similarity: f32) -> Self {
        Self {
            accepted: false,
            similarity,
            reason: Some(reason),
        }
    }

    pub fn message(&self) -> String {
        match self.reason {
            Some(RejectReason::LowSimilarity) => format!(
                "Face verification failed. Similarity: {:.2}%",
                self.similarity
            ),
            Some(reason) => reason.message().to_string(),
            None => format!(
                "Face verification successful! Similarity: {:.2}%",
                self.similarity
            ),
        }
    }
}

/// Composes the quality gate, the detection gateway and the comparison
/// gateway into a single decision for a (stored reference, candidate) pair.
/// Shared by every subject type: employee attendance, admin/manager face
/// login.
pub struct FaceVerifier {
    vision: Arc<dyn FaceScan>,
    http: reqwest::Client,
    threshold: f32,
}

impl FaceVerifier {
    pub fn new(vision: Arc<dyn FaceScan>, http: reqwest::Client, threshold: f32) -> Self {
        Self {
            vision,
            http,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Rejects with `FACE_NOT_REGISTERED` before any I/O when the subject
    /// never registered a reference image.
    pub async fn verify_subject(
        &self,
        subject: &dyn FaceSubject,
        candidate: &TempAsset,
    ) -> VerificationResult {
        let reference = match subject.reference_image() {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => {
                info!(
                    subject_id = subject.subject_id(),
                    "verification refused: no reference image registered"
                );
                return VerificationResult::reject(RejectReason::FaceNotRegistered);
            }
        };

        self.verify(&reference, candidate).await
    }

    /// One complete verification attempt. Fixed order: local quality gate,
    /// reference resolution, detection on both images, comparison. Earlier
    /// steps are cheaper; detection runs per image so the caller can tell the
    /// user which one to retake.
    pub async fn verify(&self, reference: &str, candidate: &TempAsset) -> VerificationResult {
        if let Err(reason) = image_check::check_image(candidate.path()) {
            return VerificationResult::reject(reason);
        }

        let reference_bytes = match self.load_reference(reference).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, reference, "failed to load reference image");
                return VerificationResult::reject(RejectReason::ReferenceUnavailable);
            }
        };

        let candidate_bytes = match std::fs::read(candidate.path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to read candidate image back from temp storage");
                return VerificationResult::reject(RejectReason::ComparisonFailed);
            }
        };

        match self.vision.detect_faces(&reference_bytes).await {
            Ok(d) if d.face_count == 0 => {
                return VerificationResult::reject(RejectReason::StoredImageNoFace);
            }
            Ok(d) if d.face_count > 1 => {
                return VerificationResult::reject(RejectReason::StoredImageMultipleFaces);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "face detection failed on stored image");
                return VerificationResult::reject(RejectReason::ComparisonFailed);
            }
        }

        match self.vision.detect_faces(&candidate_bytes).await {
            Ok(d) if d.face_count == 0 => {
                return VerificationResult::reject(RejectReason::LoginImageNoFace);
            }
            Ok(d) if d.face_count > 1 => {
                return VerificationResult::reject(RejectReason::LoginImageMultipleFaces);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "face detection failed on submitted image");
                return VerificationResult::reject(RejectReason::ComparisonFailed);
            }
        }

        let comparison = match self
            .vision
            .compare_faces(&reference_bytes, &candidate_bytes, self.threshold)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "face comparison call failed");
                return VerificationResult::reject(RejectReason::ComparisonFailed);
            }
        };

        if !comparison.is_match {
            info!(
                similarity = comparison.similarity,
                threshold = self.threshold,
                "face verification rejected: low similarity"
            );
            return VerificationResult::reject_scored(
                RejectReason::LowSimilarity,
                comparison.similarity,
            );
        }

        info!(
            similarity = comparison.similarity,
            "face verification accepted"
        );
        VerificationResult::accept(comparison.similarity)
    }

    /// Remote URIs go through the byte cache; anything else is read from
    /// local disk (registration images stored on this host).
    async fn load_reference(&self, location: &str) -> anyhow::Result<Arc<Vec<u8>>> {
        if location.starts_with("http://") || location.starts_with("https://") {
            reference_cache::get_or_fetch(&self.http, location).await
        } else {
            Ok(Arc::new(std::fs::read(location)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{FaceComparison, FaceDetection, VisionError, derive_match};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted double: first detect call answers for the stored image, the
    /// second for the candidate. Counters let tests assert which gateways
    /// were reached.
    struct ScriptedScan {
        stored_faces: usize,
        candidate_faces: usize,
        similarity: f32,
        detect_fails: bool,
        compare_fails: bool,
        detect_calls: AtomicUsize,
        compare_calls: AtomicUsize,
    }

    impl ScriptedScan {
        fn matching(similarity: f32) -> Self {
            Self {
                stored_faces: 1,
                candidate_faces: 1,
                similarity,
                detect_fails: false,
                compare_fails: false,
                detect_calls: AtomicUsize::new(0),
                compare_calls: AtomicUsize::new(0),
            }
        }

        fn with_faces(stored: usize, candidate: usize) -> Self {
            Self {
                stored_faces: stored,
                candidate_faces: candidate,
                ..Self::matching(99.0)
            }
        }
    }

    #[async_trait]
    impl FaceScan for ScriptedScan {
        async fn detect_faces(&self, _image: &[u8]) -> Result<FaceDetection, VisionError> {
            let call = self.detect_calls.fetch_add(1, Ordering::SeqCst);
            if self.detect_fails {
                return Err(VisionError::Status(reqwest::StatusCode::BAD_GATEWAY));
            }
            let face_count = if call == 0 {
                self.stored_faces
            } else {
                self.candidate_faces
            };
            Ok(FaceDetection { face_count })
        }

        async fn compare_faces(
            &self,
            _source: &[u8],
            _target: &[u8],
            threshold: f32,
        ) -> Result<FaceComparison, VisionError> {
            self.compare_calls.fetch_add(1, Ordering::SeqCst);
            if self.compare_fails {
                return Err(VisionError::Status(reqwest::StatusCode::BAD_GATEWAY));
            }
            Ok(FaceComparison {
                similarity: self.similarity,
                is_match: derive_match(self.similarity, threshold),
            })
        }
    }

    struct Fixture {
        verifier: FaceVerifier,
        scan: Arc<ScriptedScan>,
        dir: tempfile::TempDir,
    }

    fn fixture(scan: ScriptedScan, threshold: f32) -> Fixture {
        let scan = Arc::new(scan);
        let verifier = FaceVerifier::new(scan.clone(), reqwest::Client::new(), threshold);
        Fixture {
            verifier,
            scan,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    impl Fixture {
        fn reference_file(&self) -> String {
            let path = self.dir.path().join("reference.jpg");
            fs::write(&path, vec![1u8; 20_000]).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn candidate(&self) -> TempAsset {
            TempAsset::create(&vec![2u8; 20_000], "live.jpg").unwrap()
        }
    }

    #[actix_web::test]
    async fn accepts_when_similarity_meets_threshold_exactly() {
        let fx = fixture(ScriptedScan::matching(90.0), 90.0);
        let reference = fx.reference_file();
        let mut candidate = fx.candidate();

        let result = fx.verifier.verify(&reference, &candidate).await;

        assert!(result.accepted);
        assert_eq!(result.similarity, 90.0);
        assert_eq!(result.reason, None);
        candidate.release();
    }

    #[actix_web::test]
    async fn rejects_below_threshold_and_reports_score() {
        let fx = fixture(ScriptedScan::matching(89.0), 90.0);
        let reference = fx.reference_file();
        let candidate = fx.candidate();

        let result = fx.verifier.verify(&reference, &candidate).await;

        assert!(!result.accepted);
        assert_eq!(result.reason, Some(RejectReason::LowSimilarity));
        assert_eq!(result.similarity, 89.0);
        assert!(result.message().contains("89.00"));
    }

    #[actix_web::test]
    async fn bad_quality_short_circuits_before_any_remote_call() {
        let fx = fixture(ScriptedScan::matching(99.0), 90.0);
        let reference = fx.reference_file();
        let candidate = TempAsset::create(&[0u8; 50], "tiny.jpg").unwrap();

        let result = fx.verifier.verify(&reference, &candidate).await;

        assert_eq!(result.reason, Some(RejectReason::InvalidFileSize));
        assert_eq!(fx.scan.detect_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.scan.compare_calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn stored_image_face_count_gates_comparison() {
        for (stored, candidate_faces, expected) in [
            (0, 1, RejectReason::StoredImageNoFace),
            (2, 1, RejectReason::StoredImageMultipleFaces),
            (1, 0, RejectReason::LoginImageNoFace),
            (1, 2, RejectReason::LoginImageMultipleFaces),
        ] {
            let fx = fixture(ScriptedScan::with_faces(stored, candidate_faces), 90.0);
            let reference = fx.reference_file();
            let candidate = fx.candidate();

            let result = fx.verifier.verify(&reference, &candidate).await;

            assert_eq!(result.reason, Some(expected));
            assert_eq!(
                fx.scan.compare_calls.load(Ordering::SeqCst),
                0,
                "comparison must not run when {expected} gates the attempt"
            );
        }
    }

    #[actix_web::test]
    async fn detection_outage_rejects_instead_of_accepting() {
        let scan = ScriptedScan {
            detect_fails: true,
            ..ScriptedScan::matching(99.0)
        };
        let fx = fixture(scan, 90.0);
        let reference = fx.reference_file();
        let candidate = fx.candidate();

        let result = fx.verifier.verify(&reference, &candidate).await;

        assert!(!result.accepted);
        assert_eq!(result.reason, Some(RejectReason::ComparisonFailed));
    }

    #[actix_web::test]
    async fn comparison_outage_rejects_instead_of_accepting() {
        let scan = ScriptedScan {
            compare_fails: true,
            ..ScriptedScan::matching(99.0)
        };
        let fx = fixture(scan, 90.0);
        let reference = fx.reference_file();
        let candidate = fx.candidate();

        let result = fx.verifier.verify(&reference, &candidate).await;

        assert_eq!(result.reason, Some(RejectReason::ComparisonFailed));
    }

    #[actix_web::test]
    async fn unreadable_reference_rejects_as_unavailable() {
        let fx = fixture(ScriptedScan::matching(99.0), 90.0);
        let candidate = fx.candidate();

        let result = fx
            .verifier
            .verify("/nonexistent/reference.jpg", &candidate)
            .await;

        assert_eq!(result.reason, Some(RejectReason::ReferenceUnavailable));
        assert_eq!(fx.scan.detect_calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn candidate_artifact_is_gone_after_every_outcome() {
        let scenarios: Vec<(ScriptedScan, f32)> = vec![
            (ScriptedScan::matching(95.0), 90.0),   // accept
            (ScriptedScan::matching(10.0), 90.0),   // low similarity
            (ScriptedScan::with_faces(0, 1), 90.0), // stored no face
            (ScriptedScan::with_faces(1, 2), 90.0), // candidate multiple
            (
                ScriptedScan {
                    compare_fails: true,
                    ..ScriptedScan::matching(95.0)
                },
                90.0,
            ),
        ];

        for (scan, threshold) in scenarios {
            let fx = fixture(scan, threshold);
            let reference = fx.reference_file();
            let candidate = fx.candidate();
            let path = candidate.path().to_path_buf();

            let _ = fx.verifier.verify(&reference, &candidate).await;
            drop(candidate);

            assert!(!path.exists(), "temp artifact leaked at {}", path.display());
        }
    }

    struct StubSubject {
        reference: Option<String>,
    }

    impl FaceSubject for StubSubject {
        fn subject_id(&self) -> u64 {
            7
        }
        fn display_name(&self) -> &str {
            "E1"
        }
        fn reference_image(&self) -> Option<&str> {
            self.reference.as_deref()
        }
    }

    #[actix_web::test]
    async fn subject_without_reference_is_reported_not_verified() {
        let fx = fixture(ScriptedScan::matching(99.0), 90.0);
        let candidate = fx.candidate();

        let result = fx
            .verifier
            .verify_subject(&StubSubject { reference: None }, &candidate)
            .await;

        assert_eq!(result.reason, Some(RejectReason::FaceNotRegistered));
        assert_eq!(fx.scan.detect_calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn subject_with_reference_runs_full_pipeline() {
        let fx = fixture(ScriptedScan::matching(92.0), 90.0);
        let reference = fx.reference_file();
        let candidate = fx.candidate();

        let result = fx
            .verifier
            .verify_subject(
                &StubSubject {
                    reference: Some(reference),
                },
                &candidate,
            )
            .await;

        assert!(result.accepted);
        assert_eq!(result.similarity, 92.0);
    }
}
