use std::path::{Path, PathBuf};

use uuid::Uuid;

/// A candidate image parked on local disk for the duration of one
/// verification attempt. The verification pipeline has many early-exit
/// branches; holding the artifact in a guard guarantees none of them leaks a
/// file. `release` is idempotent and `Drop` is the backstop.
#[derive(Debug)]
pub struct TempAsset {
    path: PathBuf,
    released: bool,
}

impl TempAsset {
    /// Writes `bytes` under a unique name in the OS temp dir. The original
    /// file name is kept as a suffix so the extension survives for the
    /// quality check.
    pub fn create(bytes: &[u8], original_name: &str) -> std::io::Result<Self> {
        // Strip any path components a hostile client may have sent.
        let safe_name = Path::new(original_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload");

        let path = std::env::temp_dir().join(format!("{}-{}", Uuid::new_v4(), safe_name));
        std::fs::write(&path, bytes)?;

        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the artifact. Tolerates being called twice and tolerates the
    /// file already being gone.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "temp image removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "failed to remove temp image")
            }
        }
    }
}

impl Drop for TempAsset {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_writes_file_with_original_extension() {
        let mut asset = TempAsset::create(b"abc", "face.jpg").unwrap();
        assert!(asset.path().exists());
        assert!(asset.path().to_string_lossy().ends_with("face.jpg"));
        asset.release();
    }

    #[test]
    fn release_removes_file_and_is_idempotent() {
        let mut asset = TempAsset::create(b"abc", "face.png").unwrap();
        let path = asset.path().to_path_buf();

        asset.release();
        assert!(!path.exists());

        // Second release is a no-op, not a panic.
        asset.release();
    }

    #[test]
    fn drop_removes_file() {
        let path;
        {
            let asset = TempAsset::create(b"abc", "face.jpeg").unwrap();
            path = asset.path().to_path_buf();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn release_tolerates_file_deleted_externally() {
        let mut asset = TempAsset::create(b"abc", "face.jpg").unwrap();
        std::fs::remove_file(asset.path()).unwrap();
        asset.release();
    }

    #[test]
    fn path_components_in_client_filename_are_stripped() {
        let mut asset = TempAsset::create(b"abc", "../../etc/passwd.jpg").unwrap();
        assert!(asset.path().starts_with(std::env::temp_dir()));
        asset.release();
    }
}
