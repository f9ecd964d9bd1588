//! CLI argument handling and run wiring.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use crate::config::WorkflowConfig;
use crate::knowledge::JsonKnowledgeBase;
use crate::ports::store::{ArtifactKind, ArtifactStore, COURSE_ARTIFACT_ID};
use crate::store::FsArtifactStore;
use crate::syllabus::Syllabus;
use crate::synthesis::HttpSynthesisClient;
use crate::workflow::{FinalTranscript, WorkflowOrchestrator};

/// Generate a course transcript from a syllabus.
#[derive(Debug, Parser)]
#[command(name = "course-forge", version, about)]
pub struct Cli {
    /// Path to the syllabus YAML file.
    #[arg(long)]
    pub syllabus: PathBuf,

    /// Path to the knowledge corpus JSON file.
    #[arg(long)]
    pub knowledge: PathBuf,

    /// Output directory for artifacts and the transcript.
    #[arg(long, default_value = "./out")]
    pub out: PathBuf,

    /// Course title override; defaults to the syllabus title.
    #[arg(long)]
    pub title: Option<String>,

    /// Editing revision budget override.
    #[arg(long)]
    pub max_revisions: Option<u32>,

    /// Concurrent section cap override.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Parses command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Runs the workflow for the parsed arguments.
///
/// # Errors
///
/// Returns an error for fatal conditions (bad inputs, unreachable store,
/// missing synthesis configuration) and when no section is approved, so the
/// process exits non-zero unless the run produced output.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let mut syllabus = Syllabus::load(&cli.syllabus)
        .await
        .with_context(|| format!("loading syllabus from {}", cli.syllabus.display()))?;
    if let Some(title) = cli.title.clone() {
        syllabus.course_title = title;
    }

    let knowledge = JsonKnowledgeBase::load(&cli.knowledge)
        .await
        .with_context(|| format!("loading knowledge corpus from {}", cli.knowledge.display()))?;
    info!(entries = knowledge.len(), "knowledge corpus loaded");

    let synthesis = HttpSynthesisClient::from_env().context("configuring synthesis client")?;

    let mut config = WorkflowConfig::from_env().context("loading workflow configuration")?;
    if let Some(max) = cli.max_revisions {
        config = config.with_max_revisions(max);
        if config.max_total_revisions < max {
            config = config.with_max_total_revisions(max);
        }
    }
    if let Some(n) = cli.concurrency {
        config = config.with_max_concurrent_sections(n);
    }
    config.validate().context("validating configuration")?;

    let store = Arc::new(FsArtifactStore::new(&cli.out));
    let orchestrator = WorkflowOrchestrator::new(
        config,
        Arc::new(knowledge),
        store.clone(),
        Arc::new(synthesis),
    )?;

    // Ctrl-C cancels the run; in-flight sections stop at the next port call.
    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let run = orchestrator.execute(&syllabus).await?;
    let summary = run.summary(&syllabus.section_ids());
    print!("{}", summary.render());

    if run.approved_count() == 0 {
        bail!("no sections approved; no transcript produced");
    }

    let payload = store
        .read(COURSE_ARTIFACT_ID, ArtifactKind::FinalTranscript)
        .await
        .context("reading assembled transcript")?;
    let transcript: FinalTranscript =
        serde_json::from_str(&payload).context("parsing assembled transcript")?;

    let transcript_path = cli.out.join("transcript.md");
    tokio::fs::write(&transcript_path, transcript.to_markdown())
        .await
        .with_context(|| format!("writing {}", transcript_path.display()))?;

    println!("transcript: {}", transcript_path.display());
    Ok(())
}
