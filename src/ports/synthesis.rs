//! Text synthesis port.
//!
//! A stateless text-completion capability: a role, an instruction and a
//! context go in, generated text comes out. Every role agent in the phase
//! pipelines is a function over this port. No memory persists between calls
//! beyond what the caller passes in `context`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SynthesisError;

/// The closed set of roles the workflow dispatches to the synthesis port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Expands topics into queries and gathers raw matches.
    Researcher,
    /// Extracts attributed key points from raw matches.
    Analyst,
    /// Combines key points into a coherent research summary.
    Synthesizer,
    /// Organizes research notes and flags coverage gaps.
    Documentalist,
    /// Produces and revises chapter drafts.
    Writer,
    /// Scores drafts against objectives and grounding.
    Reviewer,
    /// Runs editorial quality assessments.
    Assessor,
}

impl Role {
    /// Stable role name used in logs and request payloads.
    pub fn name(&self) -> &'static str {
        match self {
            Role::Researcher => "researcher",
            Role::Analyst => "analyst",
            Role::Synthesizer => "synthesizer",
            Role::Documentalist => "documentalist",
            Role::Writer => "writer",
            Role::Reviewer => "reviewer",
            Role::Assessor => "assessor",
        }
    }

    /// All roles in pipeline order.
    pub fn all() -> Vec<Role> {
        vec![
            Role::Researcher,
            Role::Analyst,
            Role::Synthesizer,
            Role::Documentalist,
            Role::Writer,
            Role::Reviewer,
            Role::Assessor,
        ]
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One synthesis request: who is asking, what to do, and with what material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// The role issuing the request; selects the system prompt.
    pub role: Role,
    /// Task instruction for this call.
    pub instructions: String,
    /// Supporting material; the port holds no state between calls.
    pub context: String,
}

impl SynthesisRequest {
    /// Creates a new synthesis request.
    pub fn new(role: Role, instructions: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            role,
            instructions: instructions.into(),
            context: context.into(),
        }
    }
}

/// Port for the text-completion capability.
///
/// Mandatory dependency of every phase pipeline; there is no degraded
/// operating mode without it. Implementations must be safe for concurrent
/// use.
#[async_trait]
pub trait TextSynthesis: Send + Sync {
    /// Generates text for the given request.
    async fn generate(&self, request: SynthesisRequest) -> Result<String, SynthesisError>;
}
