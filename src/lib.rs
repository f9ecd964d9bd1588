//! course-forge: multi-phase course content generation from a syllabus.
//!
//! A workflow orchestrator drives every syllabus section through three
//! phases, each a small multi-role pipeline over a text-synthesis port:
//! research (grounded, cited notes), editing (drafting with a bounded
//! revision loop), and editorial finalization (severity-tagged quality
//! gating). Approved drafts are assembled into the final course transcript;
//! failed sections are reported, never silently dropped.

// Core modules
pub mod cli;
pub mod config;
pub mod editing;
pub mod error;
pub mod finalizer;
pub mod knowledge;
pub mod ports;
pub mod prompts;
pub mod research;
pub mod roles;
pub mod store;
pub mod syllabus;
pub mod synthesis;
pub mod utils;
pub mod workflow;

// Re-export commonly used error types
pub use error::{
    KnowledgeError, PhaseError, StoreError, SyllabusError, SynthesisError, WorkflowError,
};
