//! Artifact store port.
//!
//! Uniform read/write/list operations keyed by `(section_id, kind)`. This is
//! the only persistence mechanism in the workflow; no component keeps
//! artifacts in memory past its own phase.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Reserved section id under which the run-level transcript is stored.
///
/// Rejected as a real section id at syllabus validation time.
pub const COURSE_ARTIFACT_ID: &str = "course";

/// The kinds of artifacts the workflow persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Grounded research notes produced by the research pipeline.
    ResearchNotes,
    /// Chapter draft produced by the editing pipeline.
    ChapterDraft,
    /// Severity-tagged issues appended by the editorial finalizer.
    QualityIssues,
    /// The assembled course transcript.
    FinalTranscript,
}

impl ArtifactKind {
    /// Stable string form used for store keys and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::ResearchNotes => "research_notes",
            ArtifactKind::ChapterDraft => "chapter_draft",
            ArtifactKind::QualityIssues => "quality_issues",
            ArtifactKind::FinalTranscript => "final_transcript",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Port for artifact persistence, keyed by `(section_id, kind)`.
///
/// Writes must be atomic: after a failure or cancellation either the full
/// payload is readable or nothing is. Implementations must be safe for
/// concurrent use across section tasks.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes (or replaces) the artifact for `(section_id, kind)`.
    async fn write(
        &self,
        section_id: &str,
        kind: ArtifactKind,
        payload: &str,
    ) -> Result<(), StoreError>;

    /// Reads the artifact for `(section_id, kind)`.
    async fn read(&self, section_id: &str, kind: ArtifactKind) -> Result<String, StoreError>;

    /// Lists the section ids that have an artifact of the given kind.
    async fn list(&self, kind: ArtifactKind) -> Result<Vec<String>, StoreError>;
}
