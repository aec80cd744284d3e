//! Ingest command implementation.

use super::{load_config, open_sink, require_root, settings};
use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use lore_ingest::Pipeline;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run a full ingestion pass over the documents root.
pub fn run(
    config_path: Option<&Path>,
    root: Option<String>,
    force: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let settings = settings(&config, root);
    let root = require_root(&settings)?;
    if !root.is_dir() {
        anyhow::bail!("Documents root does not exist: {}", root.display());
    }

    let sink = open_sink(&config, output)?;
    let tracking = settings.track_state;
    let pipeline = Pipeline::new(settings);

    println!("{} {}", "Ingesting:".cyan(), root.display());
    if !tracking {
        println!(
            "  {}",
            "State tracking is off; every document will be processed.".dimmed()
        );
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Processing documents...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let summary = pipeline.ingest_all_documents(sink.clone(), force)?;
    pb.finish_and_clear();

    println!();
    println!("{}", "Ingestion Summary".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("  Candidates:  {}", summary.candidates);
    println!("  Scheduled:   {}", summary.scheduled);
    println!("  {} Succeeded: {}", "●".green(), summary.succeeded);
    println!("  {} Skipped:   {}", "○".yellow(), summary.skipped);
    if summary.failed > 0 {
        println!("  {} Failed:    {}", "✗".red(), summary.failed);
    }
    if summary.abandoned > 0 {
        println!("  {} Abandoned: {}", "◐".blue(), summary.abandoned);
    }
    println!("  Chunks sent: {}", summary.segments);
    println!("  Output:      {}", sink.store().path().display());

    if summary.timed_out {
        println!();
        println!(
            "{}",
            "Run timed out; unfinished documents will be retried next time.".yellow()
        );
    }
    if summary.failed > 0 {
        println!();
        println!("Run 'lore status --failed' to see what went wrong.");
    }

    Ok(())
}
