//! Knowledge access port.
//!
//! Keyword lookup over a content store, returning ranked matches with
//! previews and stable identifiers. Grounding in downstream artifacts is
//! expressed through the returned `content_id`s.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;

/// One ranked match from a knowledge lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMatch {
    /// Stable identifier of the matched content.
    pub content_id: String,
    /// Title of the matched content.
    pub title: String,
    /// Relevance score in [0.0, 1.0], higher is better.
    pub relevance_score: f64,
    /// Short preview of the content body.
    pub preview: String,
    /// Free-form metadata (author, source, tags).
    pub metadata: HashMap<String, String>,
}

impl ContentMatch {
    /// Creates a match with empty metadata.
    pub fn new(
        content_id: impl Into<String>,
        title: impl Into<String>,
        relevance_score: f64,
        preview: impl Into<String>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            title: title.into(),
            relevance_score: relevance_score.clamp(0.0, 1.0),
            preview: preview.into(),
            metadata: HashMap::new(),
        }
    }
}

/// Port for keyword/topic lookup over a content store.
///
/// Implementations must be safe for concurrent use; section tasks share one
/// instance behind an `Arc`.
#[async_trait]
pub trait KnowledgeAccess: Send + Sync {
    /// Looks up content matching any of the given keywords, ranked by
    /// relevance, at most `max_results` entries.
    async fn lookup(
        &self,
        keywords: &[String],
        max_results: usize,
    ) -> Result<Vec<ContentMatch>, KnowledgeError>;
}
