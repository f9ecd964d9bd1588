//! Port boundaries consumed by the workflow core.
//!
//! The core never talks to the outside world directly; everything flows
//! through the three traits defined here. Adapters live in the `knowledge`,
//! `store` and `synthesis` modules; tests inject scripted implementations.

pub mod knowledge;
pub mod store;
pub mod synthesis;

pub use knowledge::{ContentMatch, KnowledgeAccess};
pub use store::{ArtifactKind, ArtifactStore, COURSE_ARTIFACT_ID};
pub use synthesis::{Role, SynthesisRequest, TextSynthesis};
