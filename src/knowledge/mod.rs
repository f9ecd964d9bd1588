//! Knowledge access adapters.
//!
//! The production adapter is a JSON-file-backed corpus with keyword
//! relevance ranking: cheap to stand up, deterministic, and sufficient for
//! grounding course content in curated source material.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;
use crate::ports::knowledge::{ContentMatch, KnowledgeAccess};

/// Preview length returned with each match.
const PREVIEW_CHARS: usize = 600;

/// One entry in the knowledge corpus file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    /// Stable identifier.
    pub content_id: String,
    /// Entry title.
    pub title: String,
    /// Full body text.
    pub body: String,
    /// Optional topical tags; weighted like title tokens in scoring.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// JSON-file-backed knowledge base with token-overlap relevance ranking.
#[derive(Debug, Clone)]
pub struct JsonKnowledgeBase {
    entries: Vec<CorpusEntry>,
}

impl JsonKnowledgeBase {
    /// Creates a knowledge base from in-memory entries.
    ///
    /// # Errors
    ///
    /// Returns `KnowledgeError::MalformedCorpus` if entry ids are not unique.
    pub fn new(entries: Vec<CorpusEntry>) -> Result<Self, KnowledgeError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.content_id.as_str()) {
                return Err(KnowledgeError::MalformedCorpus(format!(
                    "duplicate content_id '{}'",
                    entry.content_id
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Loads a knowledge base from a JSON corpus file (array of entries).
    ///
    /// # Errors
    ///
    /// Returns `KnowledgeError` on IO failure, JSON failure, or duplicate
    /// ids.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let entries: Vec<CorpusEntry> = serde_json::from_str(&raw)?;
        Self::new(entries)
    }

    /// Number of corpus entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the corpus has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scores one entry against the query tokens.
    ///
    /// Title and tag hits count double; the score is the hit fraction of the
    /// query token set, so it lands in [0.0, 1.0].
    fn score(entry: &CorpusEntry, query_tokens: &HashSet<String>) -> f64 {
        if query_tokens.is_empty() {
            return 0.0;
        }

        let title_tokens = tokenize(&entry.title);
        let body_tokens = tokenize(&entry.body);
        let tag_tokens: HashSet<String> = entry.tags.iter().flat_map(|t| tokenize(t)).collect();

        let mut hits = 0.0;
        for token in query_tokens {
            if title_tokens.contains(token) || tag_tokens.contains(token) {
                hits += 1.0;
            } else if body_tokens.contains(token) {
                hits += 0.5;
            }
        }

        (hits / query_tokens.len() as f64).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl KnowledgeAccess for JsonKnowledgeBase {
    async fn lookup(
        &self,
        keywords: &[String],
        max_results: usize,
    ) -> Result<Vec<ContentMatch>, KnowledgeError> {
        let query_tokens: HashSet<String> = keywords.iter().flat_map(|k| tokenize(k)).collect();

        let mut scored: Vec<(f64, &CorpusEntry)> = self
            .entries
            .iter()
            .map(|entry| (Self::score(entry, &query_tokens), entry))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        // Ties broken by id so ranking is stable across runs.
        scored.sort_by(|(sa, ea), (sb, eb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ea.content_id.cmp(&eb.content_id))
        });

        Ok(scored
            .into_iter()
            .take(max_results)
            .map(|(score, entry)| {
                let preview: String = entry.body.chars().take(PREVIEW_CHARS).collect();
                let mut m = ContentMatch::new(&entry.content_id, &entry.title, score, preview);
                if !entry.tags.is_empty() {
                    m.metadata.insert("tags".to_string(), entry.tags.join(","));
                }
                m
            })
            .collect())
    }
}

/// Lowercase alphanumeric tokens of at least two characters.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_lowercase())
        .collect()
}
