//! Core types for the content-synthesis workflow.
//!
//! Defines the section lifecycle, the severity taxonomy, the quality-issue
//! log, and the run aggregate that owns every section outcome for the
//! duration of a run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of an editorial quality issue, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Minor note; never blocks approval.
    Info,
    /// Notable but non-blocking.
    Warning,
    /// Meaningful quality concern; non-blocking.
    Medium,
    /// Blocks approval until resolved.
    High,
    /// Blocks approval; unresolved at budget exhaustion fails the section.
    Critical,
}

impl Severity {
    /// All severities, least severe first.
    pub fn all() -> Vec<Severity> {
        vec![
            Severity::Info,
            Severity::Warning,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ]
    }

    /// Returns true if an unresolved issue of this severity blocks approval.
    pub fn blocks_approval(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

/// One editorial quality issue. Append-only: issues are recorded, never
/// mutated or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIssue {
    /// Section the issue belongs to.
    pub section_id: String,
    /// What is wrong, specifically.
    pub description: String,
    /// Issue severity.
    pub severity: Severity,
}

impl QualityIssue {
    /// Creates a new quality issue.
    pub fn new(
        section_id: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            section_id: section_id.into(),
            description: description.into(),
            severity,
        }
    }
}

/// Lifecycle status of one section within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// Waiting for a worker slot.
    Pending,
    /// Research pipeline in progress.
    Researching,
    /// Editing pipeline in progress.
    Editing,
    /// Editorial finalizer in progress.
    Reviewing,
    /// Terminal: draft approved for the transcript.
    Approved,
    /// Terminal: section could not be completed.
    Failed,
}

impl SectionStatus {
    /// Returns true for terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SectionStatus::Approved | SectionStatus::Failed)
    }

    /// Returns true if moving to `next` is a legal transition.
    ///
    /// Transitions are monotonic except the bounded Reviewing → Editing
    /// re-entry used by the finalizer revision loop. Any non-terminal state
    /// may fail.
    pub fn can_transition_to(&self, next: SectionStatus) -> bool {
        use SectionStatus::*;
        match (self, next) {
            (Pending, Researching) => true,
            (Researching, Editing) => true,
            (Editing, Reviewing) => true,
            (Reviewing, Editing) => true,
            (Reviewing, Approved) => true,
            (s, Failed) if !s.is_terminal() => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SectionStatus::Pending => "pending",
            SectionStatus::Researching => "researching",
            SectionStatus::Editing => "editing",
            SectionStatus::Reviewing => "reviewing",
            SectionStatus::Approved => "approved",
            SectionStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// A chapter draft, mutated only by the editing revision loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterDraft {
    /// Section the draft belongs to.
    pub section_id: String,
    /// Draft body.
    pub content: String,
    /// Number of revision-loop re-invocations that produced this content.
    pub revision_count: u32,
}

impl ChapterDraft {
    /// Creates a fresh draft with a zero revision count.
    pub fn new(section_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            section_id: section_id.into(),
            content: content.into(),
            revision_count: 0,
        }
    }
}

/// Outcome of one section, owned exclusively by the orchestrator. Other
/// components receive copies of the fields they need, never this value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionOutcome {
    /// Section id.
    pub section_id: String,
    /// Current lifecycle status.
    pub status: SectionStatus,
    /// Append-only issue log.
    pub issues: Vec<QualityIssue>,
    /// Latest draft, once editing has produced one.
    pub draft: Option<ChapterDraft>,
}

impl SectionOutcome {
    /// Creates a pending outcome.
    pub fn pending(section_id: impl Into<String>) -> Self {
        Self {
            section_id: section_id.into(),
            status: SectionStatus::Pending,
            issues: Vec::new(),
            draft: None,
        }
    }

    /// Advances the status, enforcing the transition rules.
    ///
    /// Illegal transitions are ignored and reported as `false`; the caller
    /// decides whether that is a bug worth surfacing. Orchestrator code only
    /// performs legal transitions.
    #[must_use]
    pub fn advance(&mut self, next: SectionStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Appends issues to the log.
    pub fn record_issues(&mut self, issues: impl IntoIterator<Item = QualityIssue>) {
        self.issues.extend(issues);
    }

    /// Issues at or above the given severity.
    pub fn issues_at_least(&self, severity: Severity) -> Vec<&QualityIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity >= severity)
            .collect()
    }
}

/// One section of the assembled transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSection {
    /// Section id.
    pub section_id: String,
    /// Section title from the syllabus.
    pub title: String,
    /// Approved chapter content.
    pub content: String,
}

/// The assembled course transcript. Built once after every section reaches a
/// terminal state; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalTranscript {
    /// Course title from the syllabus.
    pub course_title: String,
    /// Approved sections in syllabus order.
    pub sections: Vec<TranscriptSection>,
}

impl FinalTranscript {
    /// Renders the transcript as markdown for file output.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n", self.course_title);
        for section in &self.sections {
            out.push_str(&format!("\n## {}\n\n{}\n", section.title, section.content));
        }
        out
    }
}

/// Root aggregate for one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// Per-section outcomes.
    pub sections: HashMap<String, SectionOutcome>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished, once it has.
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    /// Creates a run with every section pending.
    pub fn new(section_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            sections: section_ids
                .into_iter()
                .map(|id| (id.clone(), SectionOutcome::pending(id)))
                .collect(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Returns true once every section is terminal.
    pub fn is_complete(&self) -> bool {
        self.sections.values().all(|o| o.status.is_terminal())
    }

    /// Number of approved sections.
    pub fn approved_count(&self) -> usize {
        self.sections
            .values()
            .filter(|o| o.status == SectionStatus::Approved)
            .count()
    }

    /// Number of failed sections.
    pub fn failed_count(&self) -> usize {
        self.sections
            .values()
            .filter(|o| o.status == SectionStatus::Failed)
            .count()
    }

    /// Builds the run summary, with sections listed in the given order.
    pub fn summary(&self, section_order: &[String]) -> RunSummary {
        let mut reports = Vec::new();
        for id in section_order {
            if let Some(outcome) = self.sections.get(id) {
                let mut issue_counts: HashMap<Severity, usize> = HashMap::new();
                for issue in &outcome.issues {
                    *issue_counts.entry(issue.severity).or_insert(0) += 1;
                }

                // The issue log is append-only, so a re-assessed section
                // repeats its deterministic findings; report each once.
                let mut unresolved: Vec<QualityIssue> = Vec::new();
                if outcome.status == SectionStatus::Failed {
                    let mut seen = std::collections::HashSet::new();
                    for issue in outcome.issues_at_least(Severity::High) {
                        if seen.insert(issue.description.clone()) {
                            unresolved.push(issue.clone());
                        }
                    }
                }

                reports.push(SectionReport {
                    section_id: id.clone(),
                    status: outcome.status,
                    issue_counts,
                    unresolved,
                });
            }
        }

        RunSummary {
            run_id: self.run_id,
            approved: self.approved_count(),
            failed: self.failed_count(),
            sections: reports,
        }
    }
}

/// Per-section entry of the run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionReport {
    /// Section id.
    pub section_id: String,
    /// Final status.
    pub status: SectionStatus,
    /// Issue counts by severity.
    pub issue_counts: HashMap<Severity, usize>,
    /// For failed sections, the unresolved blocking issues.
    pub unresolved: Vec<QualityIssue>,
}

/// User-facing run report: per-section status, issue counts by severity,
/// and the blocking issues behind every failure. Failures are never
/// silently omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identifier.
    pub run_id: Uuid,
    /// Approved section count.
    pub approved: usize,
    /// Failed section count.
    pub failed: usize,
    /// Per-section reports in syllabus order.
    pub sections: Vec<SectionReport>,
}

impl RunSummary {
    /// Renders the summary for terminal output.
    pub fn render(&self) -> String {
        let mut out = format!(
            "run {}: {} approved, {} failed\n",
            self.run_id, self.approved, self.failed
        );
        for report in &self.sections {
            let counts: Vec<String> = Severity::all()
                .into_iter()
                .rev()
                .filter_map(|sev| {
                    report
                        .issue_counts
                        .get(&sev)
                        .map(|n| format!("{} {}", n, sev))
                })
                .collect();
            let counts = if counts.is_empty() {
                "no issues".to_string()
            } else {
                counts.join(", ")
            };
            out.push_str(&format!(
                "  [{}] {} ({})\n",
                report.status, report.section_id, counts
            ));
            if report.status == SectionStatus::Failed {
                if report.unresolved.is_empty() {
                    out.push_str("      section omitted from transcript\n");
                }
                for issue in &report.unresolved {
                    out.push_str(&format!(
                        "      unresolved {}: {}\n",
                        issue.severity, issue.description
                    ));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_severity_blocks_approval() {
        assert!(Severity::Critical.blocks_approval());
        assert!(Severity::High.blocks_approval());
        assert!(!Severity::Medium.blocks_approval());
        assert!(!Severity::Warning.blocks_approval());
        assert!(!Severity::Info.blocks_approval());
    }

    #[test]
    fn test_status_happy_path_transitions() {
        use SectionStatus::*;
        assert!(Pending.can_transition_to(Researching));
        assert!(Researching.can_transition_to(Editing));
        assert!(Editing.can_transition_to(Reviewing));
        assert!(Reviewing.can_transition_to(Approved));
    }

    #[test]
    fn test_status_revision_reentry_allowed() {
        assert!(SectionStatus::Reviewing.can_transition_to(SectionStatus::Editing));
    }

    #[test]
    fn test_status_no_backward_transitions() {
        use SectionStatus::*;
        assert!(!Editing.can_transition_to(Researching));
        assert!(!Reviewing.can_transition_to(Researching));
        assert!(!Researching.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Editing));
    }

    #[test]
    fn test_terminal_states_are_final() {
        use SectionStatus::*;
        for next in [Pending, Researching, Editing, Reviewing, Approved, Failed] {
            assert!(!Approved.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_any_active_state_can_fail() {
        use SectionStatus::*;
        for state in [Pending, Researching, Editing, Reviewing] {
            assert!(state.can_transition_to(Failed));
        }
    }

    #[test]
    fn test_outcome_advance_enforces_rules() {
        let mut outcome = SectionOutcome::pending("s1");
        assert!(outcome.advance(SectionStatus::Researching));
        assert!(!outcome.advance(SectionStatus::Approved));
        assert_eq!(outcome.status, SectionStatus::Researching);
    }

    #[test]
    fn test_outcome_issue_filtering() {
        let mut outcome = SectionOutcome::pending("s1");
        outcome.record_issues(vec![
            QualityIssue::new("s1", Severity::Info, "note"),
            QualityIssue::new("s1", Severity::High, "ungrounded"),
            QualityIssue::new("s1", Severity::Critical, "missing topic"),
        ]);

        let blocking = outcome.issues_at_least(Severity::High);
        assert_eq!(blocking.len(), 2);
        assert!(blocking.iter().all(|i| i.severity.blocks_approval()));
    }

    #[test]
    fn test_run_completion_tracking() {
        let mut run = WorkflowRun::new(vec!["a".to_string(), "b".to_string()]);
        assert!(!run.is_complete());

        let a = run.sections.get_mut("a").unwrap();
        a.status = SectionStatus::Approved;
        assert!(!run.is_complete());

        let b = run.sections.get_mut("b").unwrap();
        b.status = SectionStatus::Failed;
        assert!(run.is_complete());
        assert_eq!(run.approved_count(), 1);
        assert_eq!(run.failed_count(), 1);
    }

    #[test]
    fn test_summary_orders_sections_and_reports_failures() {
        let mut run = WorkflowRun::new(vec!["b".to_string(), "a".to_string()]);
        run.sections.get_mut("b").unwrap().status = SectionStatus::Approved;
        let a = run.sections.get_mut("a").unwrap();
        a.status = SectionStatus::Failed;
        a.record_issues(vec![
            QualityIssue::new("a", Severity::Critical, "no grounding"),
            QualityIssue::new("a", Severity::Info, "minor"),
        ]);

        let summary = run.summary(&["b".to_string(), "a".to_string()]);
        assert_eq!(summary.sections[0].section_id, "b");
        assert_eq!(summary.sections[1].section_id, "a");
        assert_eq!(summary.sections[1].unresolved.len(), 1);
        assert_eq!(summary.sections[1].unresolved[0].severity, Severity::Critical);

        let rendered = summary.render();
        assert!(rendered.contains("[failed] a"));
        assert!(rendered.contains("no grounding"));
    }

    #[test]
    fn test_transcript_markdown_rendering() {
        let transcript = FinalTranscript {
            course_title: "Rust".to_string(),
            sections: vec![TranscriptSection {
                section_id: "s1".to_string(),
                title: "Intro".to_string(),
                content: "Welcome.".to_string(),
            }],
        };
        let md = transcript.to_markdown();
        assert!(md.starts_with("# Rust"));
        assert!(md.contains("## Intro"));
        assert!(md.contains("Welcome."));
    }
}
