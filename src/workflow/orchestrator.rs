//! Workflow orchestrator.
//!
//! Drives every syllabus section through Research → Editing → Finalization
//! on its own tokio task, bounded by a semaphore. Sections share no mutable
//! state; the orchestrator owns the `WorkflowRun` aggregate and folds each
//! section's outcome into it as the task finishes. A failed section never
//! aborts the run.
//!
//! Every artifact is written to the store the moment it is produced; no
//! phase starts before the previous phase's output is durably stored.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::WorkflowConfig;
use crate::editing::EditingPipeline;
use crate::error::{StoreError, WorkflowError};
use crate::finalizer::{assemble_transcript, EditorialFinalizer};
use crate::ports::knowledge::KnowledgeAccess;
use crate::ports::store::{ArtifactKind, ArtifactStore, COURSE_ARTIFACT_ID};
use crate::ports::synthesis::TextSynthesis;
use crate::research::ResearchPipeline;
use crate::syllabus::{Syllabus, SyllabusSection};
use crate::workflow::types::{
    QualityIssue, SectionOutcome, SectionStatus, Severity, TranscriptSection, WorkflowRun,
};

/// Per-run cap on finalizer-driven editing re-entries per section.
const MAX_FINALIZER_REENTRIES: u32 = 1;

/// Top-level orchestrator for a content-synthesis run.
pub struct WorkflowOrchestrator {
    config: WorkflowConfig,
    knowledge: Arc<dyn KnowledgeAccess>,
    store: Arc<dyn ArtifactStore>,
    synthesis: Arc<dyn TextSynthesis>,
    cancel: CancellationToken,
}

impl WorkflowOrchestrator {
    /// Creates an orchestrator over the three ports.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Config` if the configuration is invalid.
    pub fn new(
        config: WorkflowConfig,
        knowledge: Arc<dyn KnowledgeAccess>,
        store: Arc<dyn ArtifactStore>,
        synthesis: Arc<dyn TextSynthesis>,
    ) -> Result<Self, WorkflowError> {
        config.validate()?;
        Ok(Self {
            config,
            knowledge,
            store,
            synthesis,
            cancel: CancellationToken::new(),
        })
    }

    /// Returns a token that cancels the whole run when triggered. In-flight
    /// section tasks observe it at every port boundary.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels the run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Executes the workflow for the given syllabus.
    ///
    /// Every section runs concurrently through Research → Editing →
    /// Finalization; the transcript is assembled from approved sections
    /// once all sections are terminal and written to the store under the
    /// reserved course id.
    ///
    /// # Errors
    ///
    /// Fatal errors only: invalid syllabus, unreachable artifact store, or
    /// cancellation before any section started. Section-level failures are
    /// reported through the returned `WorkflowRun`.
    pub async fn execute(&self, syllabus: &Syllabus) -> Result<WorkflowRun, WorkflowError> {
        syllabus.validate()?;

        // Probe the store up front; an unreachable store is fatal before any
        // section starts.
        self.store
            .list(ArtifactKind::FinalTranscript)
            .await
            .map_err(|e| WorkflowError::StoreUnavailable(e.to_string()))?;

        if self.cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        let section_order = syllabus.section_ids();
        let mut run = WorkflowRun::new(section_order.clone());
        info!(run_id = %run.run_id, sections = section_order.len(), "workflow run starting");

        let research = Arc::new(ResearchPipeline::new(
            self.knowledge.clone(),
            self.synthesis.clone(),
            self.config.clone(),
        ));
        let editing = Arc::new(EditingPipeline::new(
            self.knowledge.clone(),
            self.synthesis.clone(),
            self.config.clone(),
        ));
        let finalizer = Arc::new(EditorialFinalizer::new(
            self.synthesis.clone(),
            self.store.clone(),
            self.config.clone(),
        ));

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_sections));
        let mut tasks = JoinSet::new();

        for section in syllabus.sections.clone() {
            let research = research.clone();
            let editing = editing.clone();
            let finalizer = finalizer.clone();
            let store = self.store.clone();
            let config = self.config.clone();
            let cancel = self.cancel.clone();
            let semaphore = semaphore.clone();
            let span = info_span!("section", section_id = %section.section_id);

            tasks.spawn(
                async move {
                    // The semaphore is never closed; acquisition only fails
                    // if it were.
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return fail(
                                SectionOutcome::pending(&section.section_id),
                                "worker slot unavailable",
                            )
                        }
                    };
                    process_section(section, research, editing, finalizer, store, config, cancel)
                        .await
                }
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    run.sections.insert(outcome.section_id.clone(), outcome);
                }
                Err(join_err) => {
                    // A panicking section task is isolated like any other
                    // section failure; the run continues.
                    error!(error = %join_err, "section task aborted");
                }
            }
        }

        self.assemble_and_store(syllabus, &mut run).await;
        run.completed_at = Some(Utc::now());
        info!(
            run_id = %run.run_id,
            approved = run.approved_count(),
            failed = run.failed_count(),
            "workflow run finished"
        );

        Ok(run)
    }

    /// Builds the transcript from approved sections, in syllabus order, and
    /// persists it. Skipped entirely when nothing was approved.
    async fn assemble_and_store(&self, syllabus: &Syllabus, run: &mut WorkflowRun) {
        let approved: Vec<TranscriptSection> = syllabus
            .sections
            .iter()
            .filter_map(|section| {
                let outcome = run.sections.get(&section.section_id)?;
                if outcome.status != SectionStatus::Approved {
                    return None;
                }
                let draft = outcome.draft.as_ref()?;
                Some(TranscriptSection {
                    section_id: section.section_id.clone(),
                    title: section.title.clone(),
                    content: draft.content.clone(),
                })
            })
            .collect();

        if approved.is_empty() {
            warn!("no sections approved; transcript not produced");
            return;
        }

        let transcript = assemble_transcript(&syllabus.course_title, approved);
        let payload = match serde_json::to_string_pretty(&transcript) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "transcript serialization failed");
                return;
            }
        };

        if let Err(e) = write_artifact(
            self.store.as_ref(),
            &self.config,
            &self.cancel,
            COURSE_ARTIFACT_ID,
            ArtifactKind::FinalTranscript,
            &payload,
        )
        .await
        {
            error!(error = %e, "transcript write failed");
        }
    }
}

/// Runs one section through all three phases. Never returns an error;
/// failures are encoded in the outcome so the run continues.
async fn process_section(
    section: SyllabusSection,
    research: Arc<ResearchPipeline>,
    editing: Arc<EditingPipeline>,
    finalizer: Arc<EditorialFinalizer>,
    store: Arc<dyn ArtifactStore>,
    config: WorkflowConfig,
    cancel: CancellationToken,
) -> SectionOutcome {
    let mut outcome = SectionOutcome::pending(&section.section_id);

    if cancel.is_cancelled() {
        return fail(outcome, "run cancelled before the section started");
    }

    // Research phase.
    let _ = outcome.advance(SectionStatus::Researching);
    let notes = match research.research(&section, &cancel).await {
        Ok(notes) => notes,
        Err(e) => return fail(outcome, format!("research phase failed: {}", e)),
    };

    let notes_payload = match serde_json::to_string_pretty(&notes) {
        Ok(p) => p,
        Err(e) => return fail(outcome, format!("research notes serialization failed: {}", e)),
    };
    if let Err(e) = write_artifact(
        store.as_ref(),
        &config,
        &cancel,
        &section.section_id,
        ArtifactKind::ResearchNotes,
        &notes_payload,
    )
    .await
    {
        return fail(outcome, format!("research notes write failed: {}", e));
    }

    // Editing and finalization, with the bounded finalizer re-entry.
    let mut feedback: Vec<String> = Vec::new();
    let mut reentries: u32 = 0;
    let mut total_revisions: u32 = 0;

    loop {
        let _ = outcome.advance(SectionStatus::Editing);
        let edited = match editing.edit(&section, &notes, &feedback, &cancel).await {
            Ok(edited) => edited,
            Err(e) => return fail(outcome, format!("editing phase failed: {}", e)),
        };
        total_revisions += edited.draft.revision_count;

        let draft_payload = match serde_json::to_string_pretty(&edited.draft) {
            Ok(p) => p,
            Err(e) => return fail(outcome, format!("draft serialization failed: {}", e)),
        };
        if let Err(e) = write_artifact(
            store.as_ref(),
            &config,
            &cancel,
            &section.section_id,
            ArtifactKind::ChapterDraft,
            &draft_payload,
        )
        .await
        {
            return fail(outcome, format!("draft write failed: {}", e));
        }

        let _ = outcome.advance(SectionStatus::Reviewing);
        let assessment = match finalizer
            .finalize(
                &section,
                &notes,
                &edited.draft,
                &edited.open_deficiencies,
                &cancel,
            )
            .await
        {
            Ok(assessment) => assessment,
            Err(e) => return fail(outcome, format!("finalization failed: {}", e)),
        };

        outcome.record_issues(assessment.issues);
        persist_issues(&outcome, store.as_ref(), &config, &cancel).await;

        if assessment.approved {
            outcome.draft = Some(edited.draft);
            let _ = outcome.advance(SectionStatus::Approved);
            info!(revisions = total_revisions, "section approved");
            return outcome;
        }

        // One more editing pass with the issue list as feedback, inside the
        // run-level revision cap.
        let reentry_cost = 1;
        if reentries >= MAX_FINALIZER_REENTRIES
            || total_revisions + reentry_cost > config.max_total_revisions
        {
            outcome.draft = Some(edited.draft);
            let blocking: Vec<String> = outcome
                .issues_at_least(Severity::High)
                .iter()
                .map(|i| i.description.clone())
                .collect();
            warn!(
                revisions = total_revisions,
                blocking = blocking.len(),
                "revision budgets exhausted with blocking issues; section failed"
            );
            let _ = outcome.advance(SectionStatus::Failed);
            return outcome;
        }

        reentries += 1;
        total_revisions += reentry_cost;
        feedback = outcome
            .issues_at_least(Severity::High)
            .iter()
            .map(|i| i.description.clone())
            .collect();
        info!(reentry = reentries, "re-entering editing with finalizer feedback");
    }
}

/// Marks a section failed, recording the reason as a critical issue so the
/// run summary never silently omits it.
fn fail(mut outcome: SectionOutcome, reason: impl Into<String>) -> SectionOutcome {
    let reason = reason.into();
    warn!(section_id = %outcome.section_id, %reason, "section failed");
    let issue = QualityIssue::new(&outcome.section_id, Severity::Critical, reason);
    outcome.record_issues([issue]);
    let _ = outcome.advance(SectionStatus::Failed);
    outcome
}

/// Persists the issue log; a failed issue write degrades to a log line
/// rather than failing the section over bookkeeping.
async fn persist_issues(
    outcome: &SectionOutcome,
    store: &dyn ArtifactStore,
    config: &WorkflowConfig,
    cancel: &CancellationToken,
) {
    let payload = match serde_json::to_string_pretty(&outcome.issues) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "issue serialization failed");
            return;
        }
    };
    if let Err(e) = write_artifact(
        store,
        config,
        cancel,
        &outcome.section_id,
        ArtifactKind::QualityIssues,
        &payload,
    )
    .await
    {
        error!(error = %e, "issue write failed");
    }
}

/// Store write with timeout, doubling backoff and a retry budget.
async fn write_artifact(
    store: &dyn ArtifactStore,
    config: &WorkflowConfig,
    cancel: &CancellationToken,
    section_id: &str,
    kind: ArtifactKind,
    payload: &str,
) -> Result<(), StoreError> {
    let mut backoff = config.store_retry_backoff;
    let mut last_err = StoreError::Unavailable("no write attempted".to_string());

    for attempt in 1..=config.store_max_retries {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        match tokio::time::timeout(config.port_timeout, store.write(section_id, kind, payload))
            .await
        {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => last_err = e,
            Err(_) => {
                last_err = StoreError::Unavailable(format!(
                    "write timed out after {}s",
                    config.port_timeout.as_secs()
                ))
            }
        }

        if attempt < config.store_max_retries {
            warn!(%kind, section_id, attempt, "artifact write failed, backing off");
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }

    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynthesisError;
    use crate::ports::synthesis::SynthesisRequest;
    use crate::store::MemoryArtifactStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FailingStore;

    #[async_trait]
    impl ArtifactStore for FailingStore {
        async fn write(
            &self,
            _section_id: &str,
            _kind: ArtifactKind,
            _payload: &str,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk gone".to_string()))
        }

        async fn read(&self, section_id: &str, kind: ArtifactKind) -> Result<String, StoreError> {
            Err(StoreError::NotFound {
                section_id: section_id.to_string(),
                kind: kind.to_string(),
            })
        }

        async fn list(&self, _kind: ArtifactKind) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("disk gone".to_string()))
        }
    }

    struct CountingStore {
        inner: MemoryArtifactStore,
        failures_remaining: AtomicU32,
    }

    #[async_trait]
    impl ArtifactStore for CountingStore {
        async fn write(
            &self,
            section_id: &str,
            kind: ArtifactKind,
            payload: &str,
        ) -> Result<(), StoreError> {
            if self.failures_remaining.load(Ordering::SeqCst) > 0 {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("flaky".to_string()));
            }
            self.inner.write(section_id, kind, payload).await
        }

        async fn read(&self, section_id: &str, kind: ArtifactKind) -> Result<String, StoreError> {
            self.inner.read(section_id, kind).await
        }

        async fn list(&self, kind: ArtifactKind) -> Result<Vec<String>, StoreError> {
            self.inner.list(kind).await
        }
    }

    struct NeverCalledSynthesis;

    #[async_trait]
    impl crate::ports::synthesis::TextSynthesis for NeverCalledSynthesis {
        async fn generate(&self, request: SynthesisRequest) -> Result<String, SynthesisError> {
            panic!("synthesis must not be called, got role {}", request.role);
        }
    }

    struct NoKnowledge;

    #[async_trait]
    impl KnowledgeAccess for NoKnowledge {
        async fn lookup(
            &self,
            _keywords: &[String],
            _max_results: usize,
        ) -> Result<Vec<crate::ports::knowledge::ContentMatch>, crate::error::KnowledgeError>
        {
            Ok(Vec::new())
        }
    }

    fn syllabus() -> Syllabus {
        Syllabus {
            course_title: "Course".to_string(),
            sections: vec![SyllabusSection {
                section_id: "s1".to_string(),
                title: "Intro".to_string(),
                learning_objectives: vec!["learn".to_string()],
                key_topics: vec!["topic".to_string()],
                estimated_duration_minutes: 10,
            }],
        }
    }

    #[tokio::test]
    async fn test_unreachable_store_is_fatal() {
        let orchestrator = WorkflowOrchestrator::new(
            WorkflowConfig::default(),
            Arc::new(NoKnowledge),
            Arc::new(FailingStore),
            Arc::new(NeverCalledSynthesis),
        )
        .unwrap();

        let result = orchestrator.execute(&syllabus()).await;
        assert!(matches!(result, Err(WorkflowError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_invalid_syllabus_is_fatal() {
        let orchestrator = WorkflowOrchestrator::new(
            WorkflowConfig::default(),
            Arc::new(NoKnowledge),
            Arc::new(MemoryArtifactStore::new()),
            Arc::new(NeverCalledSynthesis),
        )
        .unwrap();

        let empty = Syllabus {
            course_title: "Empty".to_string(),
            sections: vec![],
        };
        let result = orchestrator.execute(&empty).await;
        assert!(matches!(result, Err(WorkflowError::InvalidSyllabus(_))));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let orchestrator = WorkflowOrchestrator::new(
            WorkflowConfig::default(),
            Arc::new(NoKnowledge),
            Arc::new(MemoryArtifactStore::new()),
            Arc::new(NeverCalledSynthesis),
        )
        .unwrap();

        orchestrator.cancel();
        let result = orchestrator.execute(&syllabus()).await;
        assert!(matches!(result, Err(WorkflowError::Cancelled)));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = WorkflowOrchestrator::new(
            WorkflowConfig::default().with_max_concurrent_sections(0),
            Arc::new(NoKnowledge),
            Arc::new(MemoryArtifactStore::new()),
            Arc::new(NeverCalledSynthesis),
        );
        assert!(matches!(result, Err(WorkflowError::Config(_))));
    }

    #[tokio::test]
    async fn test_write_artifact_retries_through_flaky_store() {
        let store = CountingStore {
            inner: MemoryArtifactStore::new(),
            failures_remaining: AtomicU32::new(2),
        };
        let config = WorkflowConfig::default()
            .with_store_retry_backoff(std::time::Duration::from_millis(1));

        write_artifact(
            &store,
            &config,
            &CancellationToken::new(),
            "s1",
            ArtifactKind::ChapterDraft,
            "payload",
        )
        .await
        .unwrap();

        assert_eq!(
            store.inner.read("s1", ArtifactKind::ChapterDraft).await.unwrap(),
            "payload"
        );
    }

    #[tokio::test]
    async fn test_write_artifact_gives_up_after_budget() {
        let store = CountingStore {
            inner: MemoryArtifactStore::new(),
            failures_remaining: AtomicU32::new(10),
        };
        let config = WorkflowConfig::default()
            .with_store_retry_backoff(std::time::Duration::from_millis(1));

        let result = write_artifact(
            &store,
            &config,
            &CancellationToken::new(),
            "s1",
            ArtifactKind::ChapterDraft,
            "payload",
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_write_artifact_observes_cancellation() {
        let store = MemoryArtifactStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = write_artifact(
            &store,
            &WorkflowConfig::default(),
            &cancel,
            "s1",
            ArtifactKind::ChapterDraft,
            "payload",
        )
        .await;
        assert!(matches!(result, Err(StoreError::Cancelled)));
        assert!(store.is_empty().await);
    }
}
