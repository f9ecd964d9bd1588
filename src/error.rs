//! Error types for course-forge operations.
//!
//! Defines one error enum per subsystem:
//! - Syllabus loading and validation
//! - Knowledge access lookups
//! - Artifact store reads and writes
//! - Text synthesis calls
//! - Workflow orchestration

use thiserror::Error;

/// Errors that can occur while loading or validating a syllabus.
#[derive(Debug, Error)]
pub enum SyllabusError {
    #[error("Syllabus contains no sections")]
    Empty,

    #[error("Duplicate section id '{0}'")]
    DuplicateSectionId(String),

    #[error("Section id '{0}' is reserved")]
    ReservedSectionId(String),

    #[error("Section '{id}' is invalid: {reason}")]
    InvalidSection { id: String, reason: String },

    #[error("Failed to parse syllabus: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during knowledge access lookups.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Lookup timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Knowledge store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed knowledge corpus: {0}")]
    MalformedCorpus(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during artifact store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Artifact not found: {section_id}/{kind}")]
    NotFound { section_id: String, kind: String },

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write cancelled before commit")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during text synthesis calls.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Missing API base URL: SYNTHESIS_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Synthesis timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Empty completion from model '{model}'")]
    EmptyCompletion { model: String },

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Failed to parse synthesis response: {0}")]
    ParseError(String),
}

impl SynthesisError {
    /// Returns true if the call may succeed when retried with identical input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SynthesisError::Timeout { .. }
                | SynthesisError::RequestFailed(_)
                | SynthesisError::ApiError { code: 429, .. }
                | SynthesisError::ApiError { code: 500..=599, .. }
        )
    }
}

/// Errors that can occur inside a phase pipeline and surface to the
/// orchestrator as a section-level failure.
///
/// Transient faults and grounding gaps are recovered inside the phase and
/// never reach this type; what remains is unrecoverable for the section.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("Synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Knowledge lookup failed: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Artifact store failed: {0}")]
    Store(#[from] StoreError),

    #[error("Cancelled at a port boundary")]
    Cancelled,
}

/// Errors that can occur during workflow orchestration.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid syllabus: {0}")]
    InvalidSyllabus(#[from] SyllabusError),

    #[error("Artifact store unavailable at run start: {0}")]
    StoreUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Run was cancelled before any section started")]
    Cancelled,

    #[error("Section task panicked: {0}")]
    SectionPanicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesis_transient_classification() {
        assert!(SynthesisError::Timeout { seconds: 30 }.is_transient());
        assert!(SynthesisError::RequestFailed("connection reset".into()).is_transient());
        assert!(SynthesisError::ApiError {
            code: 429,
            message: "rate limited".into()
        }
        .is_transient());
        assert!(SynthesisError::ApiError {
            code: 503,
            message: "overloaded".into()
        }
        .is_transient());

        assert!(!SynthesisError::MissingApiBase.is_transient());
        assert!(!SynthesisError::ApiError {
            code: 400,
            message: "bad request".into()
        }
        .is_transient());
        assert!(!SynthesisError::ParseError("garbage".into()).is_transient());
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound {
            section_id: "s1".into(),
            kind: "research_notes".into(),
        };
        assert!(err.to_string().contains("s1/research_notes"));

        let err = StoreError::ChecksumMismatch {
            path: "a/b".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(err.to_string().contains("expected aa"));
    }

    #[test]
    fn test_workflow_error_from_syllabus() {
        let err: WorkflowError = SyllabusError::Empty.into();
        assert!(err.to_string().contains("no sections"));
    }
}
