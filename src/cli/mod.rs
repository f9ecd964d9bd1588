//! Command-line interface for course-forge.
//!
//! One surface: take a syllabus and a knowledge corpus, run the workflow,
//! emit the transcript and the run summary.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
