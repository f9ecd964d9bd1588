//! Editorial finalizer.
//!
//! Runs a fixed set of independent assessments against a chapter draft and
//! decides approval: no CRITICAL and no HIGH issue may remain. Textual
//! signals (topic coverage, groundedness, duration fit, structure,
//! cross-section repetition) are assessed deterministically; pedagogical
//! level and style go through the Assessor role. Re-running on an unchanged
//! draft yields the same verdict and the same deterministic issue set.
//!
//! Once every section is terminal, [`assemble_transcript`] stitches the
//! approved drafts in syllabus order, removing sentences repeated verbatim
//! from the preceding section.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::WorkflowConfig;
use crate::error::PhaseError;
use crate::ports::store::{ArtifactKind, ArtifactStore};
use crate::ports::synthesis::{Role, SynthesisRequest, TextSynthesis};
use crate::prompts;
use crate::research::ResearchNotes;
use crate::roles::synthesize;
use crate::syllabus::SyllabusSection;
use crate::utils::json_extraction::extract_and_parse;
use crate::utils::text::{normalize_sentence, sentence_overlap, sentences, word_count};
use crate::workflow::{ChapterDraft, FinalTranscript, QualityIssue, Severity, TranscriptSection};

/// Sentence-overlap ratio above which two drafts count as repetitive.
const REPETITION_THRESHOLD: f64 = 0.5;

/// Duration mismatch factor treated as "a large margin".
const DURATION_MISMATCH_FACTOR: usize = 4;

/// Verdict of the finalizer for one draft.
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Issues found by the assessor set.
    pub issues: Vec<QualityIssue>,
    /// True iff no CRITICAL and no HIGH issue remains.
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
struct AssessorIssue {
    severity: String,
    description: String,
}

/// The editorial finalizer. Stateless; one instance is shared across section
/// tasks.
pub struct EditorialFinalizer {
    synthesis: Arc<dyn TextSynthesis>,
    store: Arc<dyn ArtifactStore>,
    config: WorkflowConfig,
}

impl EditorialFinalizer {
    /// Creates a finalizer over the given ports.
    pub fn new(
        synthesis: Arc<dyn TextSynthesis>,
        store: Arc<dyn ArtifactStore>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            synthesis,
            store,
            config,
        }
    }

    /// Runs all assessments against the draft and decides approval.
    ///
    /// `open_deficiencies` carries reviewer concerns from a
    /// budget-exhausted editing pass; they surface as WARNING issues so
    /// nothing is silently dropped.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError` on unrecoverable synthesis failure or
    /// cancellation.
    pub async fn finalize(
        &self,
        section: &SyllabusSection,
        notes: &ResearchNotes,
        draft: &ChapterDraft,
        open_deficiencies: &[String],
        cancel: &CancellationToken,
    ) -> Result<Assessment, PhaseError> {
        let mut issues = Vec::new();

        issues.extend(assess_topic_coverage(section, draft));
        issues.extend(assess_groundedness(section, notes, draft));
        issues.extend(assess_duration_fit(
            section,
            draft,
            self.config.words_per_minute,
        ));
        issues.extend(assess_structure(section, draft));
        issues.extend(self.assess_repetition(section, draft).await);
        issues.extend(self.assess_with_model(section, draft, cancel).await?);

        for deficiency in open_deficiencies {
            issues.push(QualityIssue::new(
                &section.section_id,
                Severity::Warning,
                format!("unresolved reviewer deficiency: {}", deficiency),
            ));
        }

        let approved = !issues.iter().any(|i| i.severity.blocks_approval());
        Ok(Assessment { issues, approved })
    }

    /// MEDIUM when the draft largely restates another stored draft.
    async fn assess_repetition(
        &self,
        section: &SyllabusSection,
        draft: &ChapterDraft,
    ) -> Vec<QualityIssue> {
        let mut issues = Vec::new();

        let other_ids = match self.store.list(ArtifactKind::ChapterDraft).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "could not list drafts for repetition check");
                return issues;
            }
        };

        for other_id in other_ids {
            if other_id == section.section_id {
                continue;
            }
            let payload = match self.store.read(&other_id, ArtifactKind::ChapterDraft).await {
                Ok(p) => p,
                Err(err) => {
                    warn!(section_id = %other_id, error = %err, "skipping draft in repetition check");
                    continue;
                }
            };
            let other: ChapterDraft = match serde_json::from_str(&payload) {
                Ok(d) => d,
                Err(err) => {
                    warn!(section_id = %other_id, error = %err, "stored draft unparseable");
                    continue;
                }
            };

            if sentence_overlap(&draft.content, &other.content) > REPETITION_THRESHOLD {
                issues.push(QualityIssue::new(
                    &section.section_id,
                    Severity::Medium,
                    format!(
                        "topic repeated without a new angle versus section '{}'",
                        other_id
                    ),
                ));
            }
        }

        issues
    }

    /// Model-backed difficulty and style assessment. A malformed response
    /// contributes no issues rather than failing the section.
    async fn assess_with_model(
        &self,
        section: &SyllabusSection,
        draft: &ChapterDraft,
        cancel: &CancellationToken,
    ) -> Result<Vec<QualityIssue>, PhaseError> {
        if cancel.is_cancelled() {
            return Err(PhaseError::Cancelled);
        }

        let request = SynthesisRequest::new(
            Role::Assessor,
            prompts::build_assessment_prompt(section, &draft.content),
            String::new(),
        );
        let text = synthesize(self.synthesis.as_ref(), request, self.config.port_timeout).await?;

        match extract_and_parse::<Vec<AssessorIssue>>(&text) {
            Ok(raw) => Ok(raw
                .into_iter()
                .filter_map(|issue| {
                    parse_severity(&issue.severity).map(|severity| {
                        QualityIssue::new(&section.section_id, severity, issue.description)
                    })
                })
                .collect()),
            Err(reason) => {
                warn!(
                    section_id = %section.section_id,
                    %reason,
                    "assessor output unparseable, recording no model issues"
                );
                Ok(Vec::new())
            }
        }
    }
}

/// CRITICAL per syllabus topic with no presence in the draft.
fn assess_topic_coverage(section: &SyllabusSection, draft: &ChapterDraft) -> Vec<QualityIssue> {
    let draft_tokens = tokens(&draft.content);

    section
        .key_topics
        .iter()
        .filter(|topic| tokens(topic).iter().all(|t| !draft_tokens.contains(t)))
        .map(|topic| {
            QualityIssue::new(
                &section.section_id,
                Severity::Critical,
                format!("syllabus topic '{}' is missing from the draft", topic),
            )
        })
        .collect()
}

/// CRITICAL when research carried no usable grounding; HIGH when grounding
/// exists but the draft cites none of it; WARNING for partial gaps.
fn assess_groundedness(
    section: &SyllabusSection,
    notes: &ResearchNotes,
    draft: &ChapterDraft,
) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    if notes.knowledge_references.is_empty() {
        issues.push(QualityIssue::new(
            &section.section_id,
            Severity::Critical,
            "draft was produced without grounded research (knowledge gap)",
        ));
        return issues;
    }

    let cited = notes
        .knowledge_references
        .iter()
        .any(|r| draft.content.contains(&format!("[{}]", r.content_id)));
    if !cited {
        issues.push(QualityIssue::new(
            &section.section_id,
            Severity::High,
            "draft does not cite any of the supplied research references",
        ));
    }

    if notes.has_grounding_gap() {
        issues.push(QualityIssue::new(
            &section.section_id,
            Severity::Warning,
            "research notes carry knowledge-gap markers; coverage is partial",
        ));
    }

    issues
}

/// HIGH when the draft length mismatches the syllabus allocation by a large
/// margin in either direction.
fn assess_duration_fit(
    section: &SyllabusSection,
    draft: &ChapterDraft,
    words_per_minute: u32,
) -> Vec<QualityIssue> {
    let words = word_count(&draft.content);
    let expected = section.estimated_duration_minutes as usize * words_per_minute as usize;

    if words * DURATION_MISMATCH_FACTOR < expected || words > expected * DURATION_MISMATCH_FACTOR {
        vec![QualityIssue::new(
            &section.section_id,
            Severity::High,
            format!(
                "draft length ({} words) mismatches the {}-minute allocation (~{} words)",
                words, section.estimated_duration_minutes, expected
            ),
        )]
    } else {
        Vec::new()
    }
}

/// HIGH when the pedagogical section structure is missing.
fn assess_structure(section: &SyllabusSection, draft: &ChapterDraft) -> Vec<QualityIssue> {
    let lower = draft.content.to_lowercase();
    let missing: Vec<&str> = [
        ("introduction", "introduction"),
        ("exercise", "exercises"),
        ("summary", "summary"),
    ]
    .iter()
    .filter(|(needle, _)| !lower.contains(needle))
    .map(|(_, label)| *label)
    .collect();

    if missing.is_empty() {
        Vec::new()
    } else {
        vec![QualityIssue::new(
            &section.section_id,
            Severity::High,
            format!("pedagogical structure incomplete: missing {}", missing.join(", ")),
        )]
    }
}

fn parse_severity(raw: &str) -> Option<Severity> {
    match raw.to_lowercase().as_str() {
        "critical" => Some(Severity::Critical),
        "high" => Some(Severity::High),
        "medium" => Some(Severity::Medium),
        "warning" => Some(Severity::Warning),
        "info" => Some(Severity::Info),
        other => {
            warn!(severity = %other, "unknown assessor severity, dropping issue");
            None
        }
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Stitches approved sections, in the given order, into the final
/// transcript. Sentences repeated verbatim from the immediately preceding
/// section are dropped.
pub fn assemble_transcript(
    course_title: impl Into<String>,
    sections: Vec<TranscriptSection>,
) -> FinalTranscript {
    let mut assembled: Vec<TranscriptSection> = Vec::with_capacity(sections.len());

    for mut section in sections {
        if let Some(previous) = assembled.last() {
            let previous_sentences: HashSet<String> = sentences(&previous.content)
                .iter()
                .map(|s| normalize_sentence(s))
                .collect();

            let kept: Vec<String> = sentences(&section.content)
                .into_iter()
                .filter(|s| !previous_sentences.contains(&normalize_sentence(s)))
                .collect();
            section.content = kept.join(" ");
        }
        assembled.push(section);
    }

    FinalTranscript {
        course_title: course_title.into(),
        sections: assembled,
    }
}
