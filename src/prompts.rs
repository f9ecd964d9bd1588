//! Role prompts for the content-synthesis pipelines.
//!
//! Each role in the workflow has a fixed system prompt establishing its job
//! and output contract, plus a builder for the per-call instruction. Roles
//! that feed structured data back into the pipeline are instructed to answer
//! with a single JSON value; the extraction layer tolerates surrounding prose
//! and code fences.

use crate::ports::knowledge::ContentMatch;
use crate::ports::synthesis::Role;
use crate::research::ResearchNotes;
use crate::syllabus::SyllabusSection;

/// Returns the fixed system prompt for a role.
pub fn system_prompt(role: Role) -> &'static str {
    match role {
        Role::Researcher => RESEARCHER_SYSTEM,
        Role::Analyst => ANALYST_SYSTEM,
        Role::Synthesizer => SYNTHESIZER_SYSTEM,
        Role::Documentalist => DOCUMENTALIST_SYSTEM,
        Role::Writer => WRITER_SYSTEM,
        Role::Reviewer => REVIEWER_SYSTEM,
        Role::Assessor => ASSESSOR_SYSTEM,
    }
}

/// System prompt for the researcher role.
pub const RESEARCHER_SYSTEM: &str = r#"You are a research librarian preparing search queries for an educational content team.

Given the topics of a course section, produce the keyword set that best covers them: the topics themselves, common synonyms, and closely related terms a content index would use. Stay on topic; do not invent niche jargon.

Output ONLY a JSON array of keyword strings."#;

/// System prompt for the analyst role.
pub const ANALYST_SYSTEM: &str = r#"You are a content analyst extracting key points from retrieved source material.

Work strictly from the supplied source text. Every key point must restate something present in the source; never add facts from outside it. Keep each point to one sentence. If the source contains nothing usable for the section topics, return an empty array.

Output ONLY a JSON array of key-point strings."#;

/// System prompt for the synthesizer role.
pub const SYNTHESIZER_SYSTEM: &str = r#"You are an editor synthesizing research notes into a briefing summary.

Combine the supplied key points into one coherent narrative ordered by the given source ranking. Attribute claims to their sources by id in square brackets, e.g. [src-12]. Do not repeat the same point verbatim for different sources, and do not introduce material absent from the key points."#;

/// System prompt for the documentalist role.
pub const DOCUMENTALIST_SYSTEM: &str = r#"You are a documentalist organizing research notes for a chapter writer.

Arrange the supplied notes into a working brief: the order topics should be taught in, which reference supports which topic, and which section topics the notes do NOT cover (coverage gaps).

Output ONLY a JSON object: {"brief": "...", "gaps": ["uncovered topic", ...]}."#;

/// System prompt for the writer role.
pub const WRITER_SYSTEM: &str = r#"You are a course author writing a chapter of an educational transcript.

Structure every chapter as: introduction, core concepts, worked examples, exercises, summary. Ground explanations in the supplied research brief and cite its source ids in square brackets where you rely on them. Write for the stated learning objectives and duration; do not pad."#;

/// System prompt for the reviewer role.
pub const REVIEWER_SYSTEM: &str = r#"You are a reviewing editor checking a chapter draft before publication.

Judge the draft against two bars only: does it serve every stated learning objective, and is it grounded in the supplied research. Be specific about deficiencies; "improve clarity" is not actionable feedback.

Output ONLY a JSON object: {"verdict": "accept" | "revise", "deficiencies": ["...", ...], "coverage_gaps": ["topic the draft lacks material for", ...]}. Leave coverage_gaps empty unless the draft is missing source material, not merely polish."#;

/// System prompt for the assessor role.
pub const ASSESSOR_SYSTEM: &str = r#"You are an editorial quality assessor performing the final check on a chapter draft.

Assess the pedagogical level of the draft against the course section it belongs to, and note any remaining completeness or style problems. Severity meanings: "critical" = pitched at clearly the wrong difficulty level for the audience; "warning" = notable but non-blocking; "info" = minor note.

Output ONLY a JSON array: [{"severity": "critical" | "warning" | "info", "description": "..."}, ...]."#;

/// Builds the researcher instruction for a section's query expansion.
pub fn build_query_expansion_prompt(section: &SyllabusSection) -> String {
    format!(
        "Course section: {title}\nKey topics:\n{topics}\n\nProduce the keyword set for a content-index search covering these topics.",
        title = section.title,
        topics = bullet_list(&section.key_topics),
    )
}

/// Builds the researcher instruction for the widened second query.
pub fn build_widened_query_prompt(section: &SyllabusSection) -> String {
    format!(
        "The first search for section '{title}' returned too few results.\nKey topics:\n{topics}\nLearning objectives:\n{objectives}\n\nProduce a BROADER keyword set: umbrella terms, prerequisite concepts, and alternative phrasings.",
        title = section.title,
        topics = bullet_list(&section.key_topics),
        objectives = bullet_list(&section.learning_objectives),
    )
}

/// Builds the analyst instruction for one retrieved match.
pub fn build_key_point_prompt(section: &SyllabusSection, content: &ContentMatch) -> String {
    format!(
        "Section topics:\n{topics}\n\nSource [{id}] \"{title}\":\n{preview}\n\nExtract the key points from this source that are relevant to the section topics.",
        topics = bullet_list(&section.key_topics),
        id = content.content_id,
        title = content.title,
        preview = content.preview,
    )
}

/// Builds the synthesizer instruction over all extracted points.
pub fn build_summary_prompt(section: &SyllabusSection, points_by_source: &str) -> String {
    format!(
        "Section: {title}\nKey points per source, in relevance order:\n{points}\n\nSynthesize these into the section's research summary.",
        title = section.title,
        points = points_by_source,
    )
}

/// Builds the documentalist instruction over a section's research notes.
pub fn build_brief_prompt(section: &SyllabusSection, notes: &ResearchNotes) -> String {
    format!(
        "Section: {title}\nKey topics:\n{topics}\nLearning objectives:\n{objectives}\n\nResearch summary:\n{summary}\n\nOrganize these notes into a writing brief and list any uncovered topics.",
        title = section.title,
        topics = bullet_list(&section.key_topics),
        objectives = bullet_list(&section.learning_objectives),
        summary = notes.research_summary,
    )
}

/// Builds the writer instruction for the initial draft.
pub fn build_draft_prompt(
    section: &SyllabusSection,
    brief: &str,
    supplement: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Write the chapter for section '{title}' ({minutes} minutes of material).\nLearning objectives:\n{objectives}\n\nWriting brief:\n{brief}",
        title = section.title,
        minutes = section.estimated_duration_minutes,
        objectives = bullet_list(&section.learning_objectives),
        brief = brief,
    );
    if let Some(extra) = supplement {
        prompt.push_str("\n\nSupplementary material fetched for coverage gaps:\n");
        prompt.push_str(extra);
    }
    prompt
}

/// Builds the writer instruction for a revision pass.
pub fn build_revision_prompt(section: &SyllabusSection, draft: &str, feedback: &[String]) -> String {
    format!(
        "Revise the chapter for section '{title}'. Address every deficiency; keep what already works.\n\nDeficiencies:\n{feedback}\n\nCurrent draft:\n{draft}",
        title = section.title,
        feedback = bullet_list(feedback),
        draft = draft,
    )
}

/// Builds the reviewer instruction for a draft.
pub fn build_review_prompt(section: &SyllabusSection, notes: &ResearchNotes, draft: &str) -> String {
    format!(
        "Section: {title}\nLearning objectives:\n{objectives}\n\nResearch summary the draft must be grounded in:\n{summary}\n\nDraft:\n{draft}",
        title = section.title,
        objectives = bullet_list(&section.learning_objectives),
        summary = notes.research_summary,
        draft = draft,
    )
}

/// Builds the assessor instruction for the difficulty/style assessment.
pub fn build_assessment_prompt(section: &SyllabusSection, draft: &str) -> String {
    format!(
        "Course section: {title}\nIntended audience signal, from the learning objectives:\n{objectives}\n\nDraft:\n{draft}",
        title = section.title,
        objectives = bullet_list(&section.learning_objectives),
        draft = draft,
    )
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section() -> SyllabusSection {
        SyllabusSection {
            section_id: "s1".to_string(),
            title: "Ownership".to_string(),
            learning_objectives: vec!["explain moves".to_string()],
            key_topics: vec!["borrowing".to_string(), "lifetimes".to_string()],
            estimated_duration_minutes: 40,
        }
    }

    #[test]
    fn test_query_expansion_prompt_lists_topics() {
        let prompt = build_query_expansion_prompt(&section());
        assert!(prompt.contains("- borrowing"));
        assert!(prompt.contains("- lifetimes"));
        assert!(prompt.contains("Ownership"));
    }

    #[test]
    fn test_widened_prompt_includes_objectives() {
        let prompt = build_widened_query_prompt(&section());
        assert!(prompt.contains("BROADER"));
        assert!(prompt.contains("- explain moves"));
    }

    #[test]
    fn test_key_point_prompt_carries_source_id() {
        let m = ContentMatch::new("src-7", "Borrow Checker", 0.9, "The borrow checker...");
        let prompt = build_key_point_prompt(&section(), &m);
        assert!(prompt.contains("[src-7]"));
        assert!(prompt.contains("The borrow checker..."));
    }

    #[test]
    fn test_draft_prompt_with_supplement() {
        let base = build_draft_prompt(&section(), "brief text", None);
        assert!(!base.contains("Supplementary"));

        let with = build_draft_prompt(&section(), "brief text", Some("extra preview"));
        assert!(with.contains("Supplementary"));
        assert!(with.contains("extra preview"));
    }

    #[test]
    fn test_revision_prompt_lists_feedback() {
        let prompt = build_revision_prompt(
            &section(),
            "old draft",
            &["missing examples".to_string(), "weak summary".to_string()],
        );
        assert!(prompt.contains("- missing examples"));
        assert!(prompt.contains("- weak summary"));
        assert!(prompt.contains("old draft"));
    }
}
