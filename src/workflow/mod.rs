//! Workflow orchestration: run aggregate, section lifecycle and the
//! top-level orchestrator.

mod orchestrator;
mod types;

pub use orchestrator::WorkflowOrchestrator;
pub use types::{
    ChapterDraft, FinalTranscript, QualityIssue, RunSummary, SectionOutcome, SectionReport,
    SectionStatus, Severity, TranscriptSection, WorkflowRun,
};
