use std::path::Path;

use super::RejectReason;

pub const MIN_IMAGE_BYTES: u64 = 10 * 1024;
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Cheap local gate run before any face-service call so quota is not spent
/// on obviously bad input. Size first, then extension. Fails closed: an
/// unreadable file is rejected, never passed through.
pub fn check_image(path: &Path) -> Result<(), RejectReason> {
    let size = std::fs::metadata(path)
        .map_err(|_| RejectReason::InvalidFileSize)?
        .len();

    if !(MIN_IMAGE_BYTES..=MAX_IMAGE_BYTES).contains(&size) {
        return Err(RejectReason::InvalidFileSize);
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(RejectReason::InvalidFileType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_image(dir: &tempfile::TempDir, name: &str, len: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, vec![0u8; len]).unwrap();
        path
    }

    #[test]
    fn tiny_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, "selfie.jpg", 50);
        assert_eq!(check_image(&path), Err(RejectReason::InvalidFileSize));
    }

    #[test]
    fn lower_bound_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, "selfie.jpg", MIN_IMAGE_BYTES as usize);
        assert_eq!(check_image(&path), Ok(()));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, "selfie.png", (MAX_IMAGE_BYTES + 1) as usize);
        assert_eq!(check_image(&path), Err(RejectReason::InvalidFileSize));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, "selfie.gif", 20_000);
        assert_eq!(check_image(&path), Err(RejectReason::InvalidFileType));
    }

    #[test]
    fn missing_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, "selfie", 20_000);
        assert_eq!(check_image(&path), Err(RejectReason::InvalidFileType));
    }

    #[test]
    fn uppercase_extension_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, "selfie.JPEG", 20_000);
        assert_eq!(check_image(&path), Ok(()));
    }

    #[test]
    fn missing_file_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-written.jpg");
        assert_eq!(check_image(&path), Err(RejectReason::InvalidFileSize));
    }
}
