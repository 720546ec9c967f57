//! Evidence capture: processed crops written as JPEG files

use crate::collaborators::{encode_jpeg, Frame};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Optional on-disk store for processed crops
///
/// Files land in `<dir>/<session id>/<name>`. Write failures are logged and
/// otherwise ignored; they never fail a stage.
#[derive(Debug, Clone, Default)]
pub struct EvidenceStore {
    dir: Option<PathBuf>,
}

impl EvidenceStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Scope the store to one session's subdirectory
    pub fn for_session(&self, session: impl std::fmt::Display) -> Self {
        Self {
            dir: self.dir.as_ref().map(|d| d.join(session.to_string())),
        }
    }

    /// Save `frame` as `name`; returns the written path on success
    pub async fn save(&self, name: &str, frame: &Frame) -> Option<PathBuf> {
        let dir = self.dir.clone()?;
        let path = dir.join(name);
        let frame = frame.clone();

        let target = path.clone();
        let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let jpeg = encode_jpeg(&frame)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
            std::fs::write(&target, jpeg)
        })
        .await;

        match result {
            Ok(Ok(())) => {
                debug!(path = %path.display(), "Evidence saved");
                Some(path)
            }
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "Failed to save evidence");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Evidence task panicked");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_writes_jpeg() {
        let temp_dir = TempDir::new().unwrap();
        let store = EvidenceStore::new(Some(temp_dir.path().to_path_buf())).for_session("s1");

        let path = store.save("read_1.jpg", &Frame::new(4, 4)).await.unwrap();

        assert_eq!(path, temp_dir.path().join("s1").join("read_1.jpg"));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_disabled_store_skips() {
        let store = EvidenceStore::disabled();
        assert!(store.save("read_1.jpg", &Frame::new(4, 4)).await.is_none());
    }
}
