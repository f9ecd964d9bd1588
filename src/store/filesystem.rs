//! Filesystem artifact store.
//!
//! Layout: `<base>/<kind>/<section_id>.json` with a `.sha256` sidecar per
//! artifact. Writes go to a temporary file in the same directory and are
//! renamed into place, so readers never observe a partial payload and an
//! interrupted write leaves no artifact behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;
use crate::ports::store::{ArtifactKind, ArtifactStore};

/// Artifact store over a local directory tree.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    base_path: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `base_path`. Directories are created lazily
    /// on first write.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Returns the base storage path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn artifact_path(&self, section_id: &str, kind: ArtifactKind) -> PathBuf {
        self.base_path
            .join(kind.as_str())
            .join(format!("{}.json", section_id))
    }

    fn checksum_path(&self, section_id: &str, kind: ArtifactKind) -> PathBuf {
        self.base_path
            .join(kind.as_str())
            .join(format!("{}.sha256", section_id))
    }

    fn compute_checksum(payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn write(
        &self,
        section_id: &str,
        kind: ArtifactKind,
        payload: &str,
    ) -> Result<(), StoreError> {
        let final_path = self.artifact_path(section_id, kind);
        let dir = final_path
            .parent()
            .ok_or_else(|| StoreError::Unavailable("artifact path has no parent".to_string()))?;
        fs::create_dir_all(dir).await?;

        // Same-directory temp file so the rename is atomic on the filesystem.
        let tmp_path = dir.join(format!(".{}.tmp", section_id));
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(payload.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp_path, &final_path).await?;

        let checksum = Self::compute_checksum(payload.as_bytes());
        fs::write(self.checksum_path(section_id, kind), checksum).await?;

        Ok(())
    }

    async fn read(&self, section_id: &str, kind: ArtifactKind) -> Result<String, StoreError> {
        let path = self.artifact_path(section_id, kind);
        let payload = match fs::read_to_string(&path).await {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    section_id: section_id.to_string(),
                    kind: kind.to_string(),
                })
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        // Missing sidecar (legacy or external write) is tolerated; a present
        // but mismatching one is corruption.
        if let Ok(expected) = fs::read_to_string(self.checksum_path(section_id, kind)).await {
            let actual = Self::compute_checksum(payload.as_bytes());
            let expected = expected.trim().to_string();
            if expected != actual {
                return Err(StoreError::ChecksumMismatch {
                    path: path.display().to_string(),
                    expected,
                    actual,
                });
            }
        }

        Ok(payload)
    }

    async fn list(&self, kind: ArtifactKind) -> Result<Vec<String>, StoreError> {
        let dir = self.base_path.join(kind.as_str());
        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let mut section_ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix(".json") {
                if !stem.starts_with('.') {
                    section_ids.push(stem.to_string());
                }
            }
        }
        section_ids.sort();
        Ok(section_ids)
    }
}
