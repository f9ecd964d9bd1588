//! In-memory artifact store for tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::ports::store::{ArtifactKind, ArtifactStore};

/// Artifact store backed by a process-local map.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<(String, ArtifactKind), String>>,
}

impl MemoryArtifactStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts across all kinds.
    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    /// Returns true when nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn write(
        &self,
        section_id: &str,
        kind: ArtifactKind,
        payload: &str,
    ) -> Result<(), StoreError> {
        self.artifacts
            .write()
            .await
            .insert((section_id.to_string(), kind), payload.to_string());
        Ok(())
    }

    async fn read(&self, section_id: &str, kind: ArtifactKind) -> Result<String, StoreError> {
        self.artifacts
            .read()
            .await
            .get(&(section_id.to_string(), kind))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                section_id: section_id.to_string(),
                kind: kind.to_string(),
            })
    }

    async fn list(&self, kind: ArtifactKind) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self
            .artifacts
            .read()
            .await
            .keys()
            .filter(|(_, k)| *k == kind)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
