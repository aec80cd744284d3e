//! Scan command - dry run of candidate discovery and change detection.

use super::{load_config, require_root, settings};
use anyhow::Result;
use colored::Colorize;
use lore_core::Snapshot;
use lore_ingest::{is_binary_document, Pipeline};
use std::path::Path;

pub fn run(config_path: Option<&Path>, root: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let settings = settings(&config, root);
    let root = require_root(&settings)?;
    let threshold = settings.large_file_threshold_bytes;
    let tracking = settings.track_state;
    let pipeline = Pipeline::new(settings);

    println!("{} {}", "Scanning:".cyan(), root.display());
    let candidates = pipeline.collector().collect(&root)?;
    if candidates.is_empty() {
        println!("{}", "No candidate documents found.".yellow());
        return Ok(());
    }

    let mut pending = 0;
    for path in &candidates {
        let display = path.strip_prefix(&root).unwrap_or(path).display();
        let snapshot = match Snapshot::capture(path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                println!("  {} {} ({})", "✗".red(), display, e);
                pending += 1;
                continue;
            }
        };

        let changed = !tracking || pipeline.state().should_process(&snapshot);
        if changed {
            pending += 1;
        }
        let marker = if changed { "+".green() } else { "=".dimmed() };
        let mode = if !is_binary_document(path) && snapshot.file_size >= threshold {
            " [streamed]"
        } else {
            ""
        };
        println!("  {} {}{}", marker, display, mode.dimmed());
    }

    println!();
    println!(
        "Found {} documents, {} would be processed.",
        candidates.len(),
        pending
    );
    Ok(())
}
