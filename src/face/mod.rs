pub mod image_check;
pub mod temp_asset;
pub mod verify;

pub use temp_asset::TempAsset;
pub use verify::{FaceVerifier, VerificationResult};

use strum_macros::Display;

/// Why a verification attempt was turned down. Serialized to the caller as a
/// stable SCREAMING_SNAKE_CASE code next to a human-readable message.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    InvalidFileSize,
    InvalidFileType,
    /// Registration path: uploaded reference has no face.
    NoFaceDetected,
    /// Registration path: uploaded reference has more than one face.
    MultipleFaces,
    StoredImageNoFace,
    LoginImageNoFace,
    StoredImageMultipleFaces,
    LoginImageMultipleFaces,
    LowSimilarity,
    ReferenceUnavailable,
    ComparisonFailed,
    /// Subject has no registered reference image at all.
    FaceNotRegistered,
}

impl RejectReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::InvalidFileSize => "Image size should be between 10KB and 5MB",
            RejectReason::InvalidFileType => "Only JPG, JPEG, and PNG images are supported",
            RejectReason::NoFaceDetected => "No face detected in image",
            RejectReason::MultipleFaces => {
                "Multiple faces detected. Use an image with a single face"
            }
            RejectReason::StoredImageNoFace => "No face detected in the stored image",
            RejectReason::LoginImageNoFace => "No face detected in the submitted image",
            RejectReason::StoredImageMultipleFaces => {
                "Multiple faces detected in the stored image. Please re-register with a single face"
            }
            RejectReason::LoginImageMultipleFaces => {
                "Multiple faces detected in the submitted image. Please retake with a single face"
            }
            RejectReason::LowSimilarity => "Face verification failed: similarity below threshold",
            RejectReason::ReferenceUnavailable => "Stored reference image could not be loaded",
            RejectReason::ComparisonFailed => "Face comparison service is unavailable, try again",
            RejectReason::FaceNotRegistered => "No reference image registered for this account",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RejectReason;

    #[test]
    fn reason_codes_are_stable_wire_strings() {
        assert_eq!(RejectReason::InvalidFileSize.to_string(), "INVALID_FILE_SIZE");
        assert_eq!(
            RejectReason::StoredImageMultipleFaces.to_string(),
            "STORED_IMAGE_MULTIPLE_FACES"
        );
        assert_eq!(RejectReason::LowSimilarity.to_string(), "LOW_SIMILARITY");
        assert_eq!(
            RejectReason::FaceNotRegistered.to_string(),
            "FACE_NOT_REGISTERED"
        );
    }
}
