//! Editing phase pipeline.
//!
//! Role sequence per section: the Documentalist organizes research notes into
//! a writing brief and flags coverage gaps, the Writer produces the draft
//! with the pedagogical structure, and the Reviewer returns accept/revise
//! with specific deficiencies. The revision loop re-invokes the Writer with
//! reviewer feedback while `revision_count < max_revisions`; at the budget
//! the latest draft is accepted but flagged for finalizer scrutiny.
//!
//! Coverage gaps may trigger a knowledge lookup, at most once per revision
//! cycle. That lookup is the only point where this pipeline touches the
//! knowledge port, and it goes to the internal store only.

use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::WorkflowConfig;
use crate::error::PhaseError;
use crate::ports::knowledge::KnowledgeAccess;
use crate::ports::synthesis::{Role, SynthesisRequest, TextSynthesis};
use crate::prompts;
use crate::research::ResearchNotes;
use crate::roles::synthesize;
use crate::syllabus::SyllabusSection;
use crate::utils::json_extraction::extract_and_parse;
use crate::workflow::ChapterDraft;

/// Result of one editing pass over a section.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    /// The accepted draft.
    pub draft: ChapterDraft,
    /// True when the draft was accepted only because the revision budget ran
    /// out; the finalizer must scrutinize it.
    pub flagged_for_scrutiny: bool,
    /// Reviewer deficiencies still open when the pass ended.
    pub open_deficiencies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BriefResponse {
    brief: String,
    #[serde(default)]
    gaps: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    verdict: String,
    #[serde(default)]
    deficiencies: Vec<String>,
    #[serde(default)]
    coverage_gaps: Vec<String>,
}

/// The editing phase pipeline. Stateless; one instance is shared across
/// section tasks.
pub struct EditingPipeline {
    knowledge: Arc<dyn KnowledgeAccess>,
    synthesis: Arc<dyn TextSynthesis>,
    config: WorkflowConfig,
}

impl EditingPipeline {
    /// Creates a pipeline over the given ports.
    pub fn new(
        knowledge: Arc<dyn KnowledgeAccess>,
        synthesis: Arc<dyn TextSynthesis>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            knowledge,
            synthesis,
            config,
        }
    }

    /// Runs the editing pass for one section.
    ///
    /// `prior_feedback` carries finalizer issues on a re-entry; it is folded
    /// into the writing brief so the Writer addresses them from the start.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError` on unrecoverable synthesis failure or
    /// cancellation.
    pub async fn edit(
        &self,
        section: &SyllabusSection,
        notes: &ResearchNotes,
        prior_feedback: &[String],
        cancel: &CancellationToken,
    ) -> Result<EditOutcome, PhaseError> {
        let (mut brief, gaps) = self.organize(section, notes, cancel).await?;

        if !prior_feedback.is_empty() {
            brief.push_str("\n\nEditorial issues raised against the previous version:\n");
            for item in prior_feedback {
                brief.push_str(&format!("- {}\n", item));
            }
        }

        let mut supplement = if gaps.is_empty() {
            None
        } else {
            self.augment(&gaps, cancel).await?
        };

        let content = self
            .write_draft(section, &brief, supplement.as_deref(), cancel)
            .await?;
        let mut draft = ChapterDraft::new(&section.section_id, content);

        loop {
            let review = self.review(section, notes, &draft, cancel).await?;

            match review {
                ReviewOutcome::Accept => {
                    return Ok(EditOutcome {
                        draft,
                        flagged_for_scrutiny: false,
                        open_deficiencies: Vec::new(),
                    });
                }
                ReviewOutcome::Unparseable => {
                    // Quality concerns must not be dropped on a malformed
                    // verdict; hand the draft to the finalizer flagged.
                    return Ok(EditOutcome {
                        draft,
                        flagged_for_scrutiny: true,
                        open_deficiencies: vec![
                            "reviewer verdict was unparseable; draft not reviewer-approved"
                                .to_string(),
                        ],
                    });
                }
                ReviewOutcome::Revise {
                    deficiencies,
                    coverage_gaps,
                } => {
                    if self.config.max_revisions == 0 {
                        return Ok(EditOutcome {
                            draft,
                            flagged_for_scrutiny: true,
                            open_deficiencies: deficiencies,
                        });
                    }

                    // One augmentation attempt per revision cycle.
                    if !coverage_gaps.is_empty() {
                        supplement = self.augment(&coverage_gaps, cancel).await?;
                    } else {
                        supplement = None;
                    }

                    let mut feedback = deficiencies.clone();
                    if let Some(extra) = supplement.take() {
                        feedback.push(format!("supplementary material:\n{}", extra));
                    }

                    let revised = self
                        .revise_draft(section, &draft.content, &feedback, cancel)
                        .await?;
                    draft.content = revised;
                    draft.revision_count += 1;

                    // The revision that spends the budget is accepted as-is,
                    // unreviewed, and flagged so the finalizer scrutinizes it.
                    if draft.revision_count >= self.config.max_revisions {
                        debug!(
                            section_id = %section.section_id,
                            revisions = draft.revision_count,
                            "revision budget exhausted, accepting latest draft for scrutiny"
                        );
                        return Ok(EditOutcome {
                            draft,
                            flagged_for_scrutiny: true,
                            open_deficiencies: deficiencies,
                        });
                    }
                }
            }
        }
    }

    /// Documentalist step. A malformed response degrades to the raw summary
    /// with no gaps rather than failing the section.
    async fn organize(
        &self,
        section: &SyllabusSection,
        notes: &ResearchNotes,
        cancel: &CancellationToken,
    ) -> Result<(String, Vec<String>), PhaseError> {
        ensure_active(cancel)?;

        let request = SynthesisRequest::new(
            Role::Documentalist,
            prompts::build_brief_prompt(section, notes),
            String::new(),
        );
        let text = synthesize(self.synthesis.as_ref(), request, self.config.port_timeout).await?;

        match extract_and_parse::<BriefResponse>(&text) {
            Ok(response) => Ok((response.brief, response.gaps)),
            Err(reason) => {
                warn!(
                    section_id = %section.section_id,
                    %reason,
                    "documentalist output unparseable, using raw research summary as brief"
                );
                Ok((notes.research_summary.clone(), Vec::new()))
            }
        }
    }

    /// One bounded knowledge lookup for flagged gaps. Failures and timeouts
    /// are logged and skipped; augmentation is best-effort.
    async fn augment(
        &self,
        gaps: &[String],
        cancel: &CancellationToken,
    ) -> Result<Option<String>, PhaseError> {
        ensure_active(cancel)?;

        let lookup = self
            .knowledge
            .lookup(gaps, self.config.max_knowledge_results);
        let matches = match tokio::time::timeout(self.config.port_timeout, lookup).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(err)) => {
                warn!(error = %err, "augmentation lookup failed, continuing without it");
                return Ok(None);
            }
            Err(_) => {
                warn!("augmentation lookup timed out, continuing without it");
                return Ok(None);
            }
        };

        if matches.is_empty() {
            return Ok(None);
        }

        let rendered = matches
            .iter()
            .map(|m| format!("[{}] {}: {}", m.content_id, m.title, m.preview))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Some(rendered))
    }

    async fn write_draft(
        &self,
        section: &SyllabusSection,
        brief: &str,
        supplement: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, PhaseError> {
        ensure_active(cancel)?;

        let request = SynthesisRequest::new(
            Role::Writer,
            prompts::build_draft_prompt(section, brief, supplement),
            String::new(),
        );
        Ok(synthesize(self.synthesis.as_ref(), request, self.config.port_timeout).await?)
    }

    async fn revise_draft(
        &self,
        section: &SyllabusSection,
        current: &str,
        feedback: &[String],
        cancel: &CancellationToken,
    ) -> Result<String, PhaseError> {
        ensure_active(cancel)?;

        let request = SynthesisRequest::new(
            Role::Writer,
            prompts::build_revision_prompt(section, current, feedback),
            String::new(),
        );
        Ok(synthesize(self.synthesis.as_ref(), request, self.config.port_timeout).await?)
    }

    async fn review(
        &self,
        section: &SyllabusSection,
        notes: &ResearchNotes,
        draft: &ChapterDraft,
        cancel: &CancellationToken,
    ) -> Result<ReviewOutcome, PhaseError> {
        ensure_active(cancel)?;

        let request = SynthesisRequest::new(
            Role::Reviewer,
            prompts::build_review_prompt(section, notes, &draft.content),
            String::new(),
        );
        let text = synthesize(self.synthesis.as_ref(), request, self.config.port_timeout).await?;

        match extract_and_parse::<ReviewResponse>(&text) {
            Ok(response) if response.verdict == "accept" => Ok(ReviewOutcome::Accept),
            Ok(response) if response.verdict == "revise" => Ok(ReviewOutcome::Revise {
                deficiencies: response.deficiencies,
                coverage_gaps: response.coverage_gaps,
            }),
            Ok(response) => {
                warn!(verdict = %response.verdict, "unknown reviewer verdict");
                Ok(ReviewOutcome::Unparseable)
            }
            Err(reason) => {
                warn!(%reason, "reviewer output unparseable");
                Ok(ReviewOutcome::Unparseable)
            }
        }
    }
}

enum ReviewOutcome {
    Accept,
    Revise {
        deficiencies: Vec<String>,
        coverage_gaps: Vec<String>,
    },
    Unparseable,
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), PhaseError> {
    if cancel.is_cancelled() {
        Err(PhaseError::Cancelled)
    } else {
        Ok(())
    }
}
