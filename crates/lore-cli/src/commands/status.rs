//! Status command - summarize the persisted processing state.

use super::{load_config, require_root, settings};
use anyhow::{Context, Result};
use colored::Colorize;
use lore_core::ProcessingStatus;
use lore_ingest::StateStore;
use std::path::Path;

pub fn run(config_path: Option<&Path>, root: Option<String>, show_failed: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let settings = settings(&config, root);
    let root = require_root(&settings)?;
    let state_file = root.join(&settings.state_file_name);

    println!("{}", "Lore Status".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("  Root:       {}", root.display());
    println!("  State file: {}", state_file.display());
    println!(
        "  Tracking:   {}",
        if settings.track_state { "on".green() } else { "off".yellow() }
    );

    if !state_file.exists() {
        println!();
        println!("{}", "No processing state recorded yet.".yellow());
        return Ok(());
    }

    let states = StateStore::read_persisted(&state_file)
        .with_context(|| format!("Failed to read {}", state_file.display()))?;

    let (mut processing, mut success, mut failed, mut skipped) = (0, 0, 0, 0);
    let mut segments = 0u64;
    for state in &states {
        match state.status {
            ProcessingStatus::Pending | ProcessingStatus::Processing => processing += 1,
            ProcessingStatus::Success { segments: n } => {
                success += 1;
                segments += n;
            }
            ProcessingStatus::Failed { .. } => failed += 1,
            ProcessingStatus::Skipped => skipped += 1,
        }
    }

    println!();
    println!("{}", "Documents".white().bold());
    println!("  {} Succeeded:   {} ({} chunks)", "●".green(), success, segments);
    println!("  {} Skipped:     {}", "○".yellow(), skipped);
    if processing > 0 {
        println!("  {} Interrupted: {}", "◐".blue(), processing);
    }
    if failed > 0 {
        println!("  {} Failed:      {}", "✗".red(), failed);
    }

    if let Some(latest) = states.iter().map(|s| s.updated_at).max() {
        println!();
        println!("Last update: {}", latest.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    if show_failed && failed > 0 {
        println!();
        println!("{}", "Failed Documents".white().bold());
        for state in &states {
            if let Some(error) = state.last_error() {
                println!("  {} {}", "✗".red(), state.file_path);
                println!("    {}", error.dimmed());
            }
        }
    } else if failed > 0 {
        println!();
        println!("Run with --failed to list them.");
    }

    Ok(())
}
