//! Research phase pipeline.
//!
//! Three-role sequence per section: the Researcher expands key topics into a
//! query set and gathers ranked matches from the knowledge port, the Analyst
//! extracts attributed key points per match, and the Synthesizer combines
//! them into one narrative research summary.
//!
//! Insufficient knowledge is a grounding gap, not an error: the pipeline
//! embeds a structured gap warning in the produced notes and downstream
//! phases carry on with partial grounding.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::error::PhaseError;
use crate::ports::knowledge::{ContentMatch, KnowledgeAccess};
use crate::ports::synthesis::{Role, SynthesisRequest, TextSynthesis};
use crate::prompts;
use crate::roles::synthesize;
use crate::syllabus::SyllabusSection;
use crate::utils::json_extraction::extract_and_parse;

/// Marker embedded in `research_summary` wherever grounding is missing.
pub const KNOWLEDGE_GAP_MARKER: &str = "[knowledge-gap]";

/// Key points extracted from one knowledge source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeReference {
    /// Id of the source content, as returned by the knowledge port.
    pub content_id: String,
    /// One-sentence key points extracted from that source.
    pub key_points: Vec<String>,
}

/// Grounded research notes for one section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchNotes {
    /// Section the notes belong to.
    pub section_id: String,
    /// Per-source key points; every id came from a knowledge lookup for this
    /// section.
    pub knowledge_references: Vec<KnowledgeReference>,
    /// Narrative summary, possibly carrying gap markers.
    pub research_summary: String,
}

impl ResearchNotes {
    /// Returns true when the summary carries at least one gap marker.
    pub fn has_grounding_gap(&self) -> bool {
        self.research_summary.contains(KNOWLEDGE_GAP_MARKER)
    }
}

/// The research phase pipeline. Stateless; one instance is shared across
/// section tasks.
pub struct ResearchPipeline {
    knowledge: Arc<dyn KnowledgeAccess>,
    synthesis: Arc<dyn TextSynthesis>,
    config: WorkflowConfig,
}

impl ResearchPipeline {
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

    /// Runs the three-role sequence for one section.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError` on unrecoverable synthesis failure or
    /// cancellation. Missing knowledge is not an error.
    pub async fn research(
        &self,
        section: &SyllabusSection,
        cancel: &CancellationToken,
    ) -> Result<ResearchNotes, PhaseError> {
        let matches = self.gather_matches(section, cancel).await?;

        if matches.is_empty() {
            info!(section_id = %section.section_id, "no knowledge matches; emitting gap notes");
            return Ok(Self::gap_notes(section));
        }

        let (references, source_gaps) = self.extract_key_points(section, &matches, cancel).await?;

        if references.is_empty() {
            info!(
                section_id = %section.section_id,
                "no extractable substance in any match; emitting gap notes"
            );
            return Ok(Self::gap_notes(section));
        }

        let mut summary = self
            .summarize(section, &matches, &references, cancel)
            .await?;

        for topic in uncovered_topics(section, &matches) {
            summary.push_str(&format!(
                "\n{} no source material found for topic '{}'.",
                KNOWLEDGE_GAP_MARKER, topic
            ));
        }
        for gap in source_gaps {
            summary.push_str(&format!("\n{} {}", KNOWLEDGE_GAP_MARKER, gap));
        }

        Ok(ResearchNotes {
            section_id: section.section_id.clone(),
            knowledge_references: references,
            research_summary: summary,
        })
    }

    /// Researcher step: expand queries, look up, widen once if thin.
    async fn gather_matches(
        &self,
        section: &SyllabusSection,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentMatch>, PhaseError> {
        let queries = self.expand_queries(section, cancel, false).await?;

        let mut matches = self.lookup(&queries, cancel).await?;

        if matches.len() < self.config.min_knowledge_matches {
            debug!(
                section_id = %section.section_id,
                found = matches.len(),
                "below match threshold, widening query once"
            );
            let widened = self.expand_queries(section, cancel, true).await?;
            let more = self.lookup(&widened, cancel).await?;

            let seen: HashSet<String> = matches.iter().map(|m| m.content_id.clone()).collect();
            matches.extend(more.into_iter().filter(|m| !seen.contains(&m.content_id)));
        }

        matches.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.content_id.cmp(&b.content_id))
        });
        // The merged widened set can exceed the per-lookup cap.
        matches.truncate(self.config.max_knowledge_results);

        Ok(matches)
    }

    /// Expands section topics into a keyword set. Falls back to the raw
    /// topics when the expansion cannot be used.
    async fn expand_queries(
        &self,
        section: &SyllabusSection,
        cancel: &CancellationToken,
        widened: bool,
    ) -> Result<Vec<String>, PhaseError> {
        ensure_active(cancel)?;

        let instructions = if widened {
            prompts::build_widened_query_prompt(section)
        } else {
            prompts::build_query_expansion_prompt(section)
        };

        let request = SynthesisRequest::new(Role::Researcher, instructions, String::new());
        match synthesize(self.synthesis.as_ref(), request, self.config.port_timeout).await {
            Ok(text) => match extract_and_parse::<Vec<String>>(&text) {
                Ok(keywords) if !keywords.is_empty() => Ok(keywords),
                Ok(_) | Err(_) => {
                    warn!(
                        section_id = %section.section_id,
                        "query expansion unusable, falling back to raw topics"
                    );
                    Ok(section.key_topics.clone())
                }
            },
            // Expansion is an enhancement; the raw topics still make a
            // valid query.
            Err(err) => {
                warn!(
                    section_id = %section.section_id,
                    error = %err,
                    "query expansion failed, falling back to raw topics"
                );
                Ok(section.key_topics.clone())
            }
        }
    }

    /// Knowledge lookup with the port timeout. A timeout yields an empty
    /// result so the caller's widening path doubles as the retry.
    async fn lookup(
        &self,
        keywords: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentMatch>, PhaseError> {
        ensure_active(cancel)?;

        match tokio::time::timeout(
            self.config.port_timeout,
            self.knowledge
                .lookup(keywords, self.config.max_knowledge_results),
        )
        .await
        {
            Ok(Ok(matches)) => Ok(matches),
            Ok(Err(err)) => Err(PhaseError::Knowledge(err)),
            Err(_) => {
                warn!("knowledge lookup timed out; treating as empty result");
                Ok(Vec::new())
            }
        }
    }

    /// Analyst step: extract attributed key points per match.
    async fn extract_key_points(
        &self,
        section: &SyllabusSection,
        matches: &[ContentMatch],
        cancel: &CancellationToken,
    ) -> Result<(Vec<KnowledgeReference>, Vec<String>), PhaseError> {
        let mut references = Vec::new();
        let mut gaps = Vec::new();

        for content in matches {
            ensure_active(cancel)?;

            let request = SynthesisRequest::new(
                Role::Analyst,
                prompts::build_key_point_prompt(section, content),
                String::new(),
            );
            let text =
                synthesize(self.synthesis.as_ref(), request, self.config.port_timeout).await?;

            match extract_and_parse::<Vec<String>>(&text) {
                Ok(points) if !points.is_empty() => {
                    references.push(KnowledgeReference {
                        content_id: content.content_id.clone(),
                        key_points: points,
                    });
                }
                Ok(_) => {
                    gaps.push(format!(
                        "source '{}' contained no usable material.",
                        content.content_id
                    ));
                }
                Err(reason) => {
                    warn!(
                        content_id = %content.content_id,
                        %reason,
                        "analyst output unparseable, treating source as a gap"
                    );
                    gaps.push(format!(
                        "source '{}' could not be analyzed.",
                        content.content_id
                    ));
                }
            }
        }

        Ok((references, gaps))
    }

    /// Synthesizer step: one narrative summary over all extracted points.
    async fn summarize(
        &self,
        section: &SyllabusSection,
        matches: &[ContentMatch],
        references: &[KnowledgeReference],
        cancel: &CancellationToken,
    ) -> Result<String, PhaseError> {
        ensure_active(cancel)?;

        // Points rendered in match relevance order so the summary follows it.
        let mut rendered = String::new();
        for content in matches {
            if let Some(reference) = references.iter().find(|r| r.content_id == content.content_id)
            {
                rendered.push_str(&format!(
                    "[{}] {} (relevance {:.2})\n",
                    content.content_id, content.title, content.relevance_score
                ));
                for point in &reference.key_points {
                    rendered.push_str(&format!("  - {}\n", point));
                }
            }
        }

        let request = SynthesisRequest::new(
            Role::Synthesizer,
            prompts::build_summary_prompt(section, &rendered),
            String::new(),
        );
        let summary = synthesize(self.synthesis.as_ref(), request, self.config.port_timeout).await?;
        Ok(summary)
    }

    /// Notes for a section with no usable knowledge at all.
    fn gap_notes(section: &SyllabusSection) -> ResearchNotes {
        let mut summary = format!(
            "{} no knowledge matches found for section '{}'.",
            KNOWLEDGE_GAP_MARKER, section.title
        );
        for topic in &section.key_topics {
            summary.push_str(&format!(
                "\n{} topic '{}' is ungrounded.",
                KNOWLEDGE_GAP_MARKER, topic
            ));
        }
        ResearchNotes {
            section_id: section.section_id.clone(),
            knowledge_references: Vec::new(),
            research_summary: summary,
        }
    }
}

/// Key topics with no token overlap against any match title or preview.
fn uncovered_topics(section: &SyllabusSection, matches: &[ContentMatch]) -> Vec<String> {
    let mut corpus_tokens: HashSet<String> = HashSet::new();
    for m in matches {
        corpus_tokens.extend(tokens(&m.title));
        corpus_tokens.extend(tokens(&m.preview));
    }

    section
        .key_topics
        .iter()
        .filter(|topic| tokens(topic).iter().all(|t| !corpus_tokens.contains(t)))
        .cloned()
        .collect()
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_lowercase())
        .collect()
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), PhaseError> {
    if cancel.is_cancelled() {
        Err(PhaseError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{KnowledgeError, SynthesisError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Knowledge double returning fixed matches, counting lookups.
    struct FixedKnowledge {
        matches: Vec<ContentMatch>,
        lookups: AtomicUsize,
    }

    impl FixedKnowledge {
        fn new(matches: Vec<ContentMatch>) -> Self {
            Self {
                matches,
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl KnowledgeAccess for FixedKnowledge {
        async fn lookup(
            &self,
            _keywords: &[String],
            max_results: usize,
        ) -> Result<Vec<ContentMatch>, KnowledgeError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.matches.iter().take(max_results).cloned().collect())
        }
    }

    /// Synthesis double answering per role.
    struct RoleScript;

    #[async_trait]
    impl TextSynthesis for RoleScript {
        async fn generate(&self, request: SynthesisRequest) -> Result<String, SynthesisError> {
            Ok(match request.role {
                Role::Researcher => r#"["ownership", "borrowing", "memory safety"]"#.to_string(),
                Role::Analyst => r#"["Ownership transfers on assignment.", "Borrows are checked at compile time."]"#
                    .to_string(),
                Role::Synthesizer => {
                    "Ownership transfers on assignment [kb-1]; borrows are checked [kb-2].".to_string()
                }
                other => panic!("unexpected role in research pipeline: {}", other),
            })
        }
    }

    fn section() -> SyllabusSection {
        SyllabusSection {
            section_id: "s1".to_string(),
            title: "Ownership".to_string(),
            learning_objectives: vec!["explain ownership".to_string()],
            key_topics: vec!["ownership".to_string(), "borrowing".to_string()],
            estimated_duration_minutes: 30,
        }
    }

    fn rich_matches() -> Vec<ContentMatch> {
        vec![
            ContentMatch::new("kb-1", "Ownership Basics", 0.9, "ownership moves values"),
            ContentMatch::new("kb-2", "Borrowing", 0.8, "borrowing lends references"),
        ]
    }

    fn pipeline(
        knowledge: Arc<dyn KnowledgeAccess>,
        synthesis: Arc<dyn TextSynthesis>,
    ) -> ResearchPipeline {
        ResearchPipeline::new(knowledge, synthesis, WorkflowConfig::default())
    }

    #[tokio::test]
    async fn test_rich_knowledge_produces_grounded_notes() {
        let p = pipeline(
            Arc::new(FixedKnowledge::new(rich_matches())),
            Arc::new(RoleScript),
        );
        let notes = p
            .research(&section(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(notes.section_id, "s1");
        assert_eq!(notes.knowledge_references.len(), 2);
        assert!(!notes.has_grounding_gap());
        assert!(notes.research_summary.contains("[kb-1]"));
    }

    #[tokio::test]
    async fn test_every_reference_comes_from_lookup() {
        let p = pipeline(
            Arc::new(FixedKnowledge::new(rich_matches())),
            Arc::new(RoleScript),
        );
        let notes = p
            .research(&section(), &CancellationToken::new())
            .await
            .unwrap();

        let known: HashSet<&str> = ["kb-1", "kb-2"].into_iter().collect();
        for reference in &notes.knowledge_references {
            assert!(known.contains(reference.content_id.as_str()));
            assert!(!reference.key_points.is_empty());
        }
    }

    #[tokio::test]
    async fn test_zero_matches_yields_gap_notes() {
        let p = pipeline(
            Arc::new(FixedKnowledge::new(Vec::new())),
            Arc::new(RoleScript),
        );
        let notes = p
            .research(&section(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(notes.knowledge_references.is_empty());
        assert!(notes.has_grounding_gap());
        assert!(notes.research_summary.contains("ownership"));
    }

    #[tokio::test]
    async fn test_thin_results_trigger_one_widened_lookup() {
        let knowledge = Arc::new(FixedKnowledge::new(vec![ContentMatch::new(
            "kb-1",
            "Ownership Basics",
            0.9,
            "ownership moves values",
        )]));
        let p = pipeline(knowledge.clone(), Arc::new(RoleScript));

        // min_knowledge_matches default is 2; one match forces the widening.
        p.research(&section(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(knowledge.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rich_results_skip_widening() {
        let knowledge = Arc::new(FixedKnowledge::new(rich_matches()));
        let p = pipeline(knowledge.clone(), Arc::new(RoleScript));

        p.research(&section(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(knowledge.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_observed_before_ports() {
        let p = pipeline(
            Arc::new(FixedKnowledge::new(rich_matches())),
            Arc::new(RoleScript),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = p.research(&section(), &cancel).await;
        assert!(matches!(result, Err(PhaseError::Cancelled)));
    }

    #[tokio::test]
    async fn test_analyst_without_substance_becomes_gap() {
        struct EmptyAnalyst;

        #[async_trait]
        impl TextSynthesis for EmptyAnalyst {
            async fn generate(&self, request: SynthesisRequest) -> Result<String, SynthesisError> {
                Ok(match request.role {
                    Role::Researcher => r#"["ownership"]"#.to_string(),
                    Role::Analyst => "[]".to_string(),
                    _ => "unused".to_string(),
                })
            }
        }

        let p = pipeline(
            Arc::new(FixedKnowledge::new(rich_matches())),
            Arc::new(EmptyAnalyst),
        );
        let notes = p
            .research(&section(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(notes.knowledge_references.is_empty());
        assert!(notes.has_grounding_gap());
    }

    #[test]
    fn test_uncovered_topics_detection() {
        let section = section();
        let matches = vec![ContentMatch::new(
            "kb-1",
            "Ownership Basics",
            0.9,
            "ownership moves values",
        )];
        let uncovered = uncovered_topics(&section, &matches);
        assert_eq!(uncovered, vec!["borrowing".to_string()]);
    }
}
