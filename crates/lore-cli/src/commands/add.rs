//! Add command - ingest one document.

use super::{describe, load_config, open_sink, settings};
use anyhow::Result;
use colored::Colorize;
use lore_ingest::{FileResult, Pipeline};
use std::path::{Path, PathBuf};

pub fn run(
    config_path: Option<&Path>,
    path: &str,
    force: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let sink = open_sink(&config, output)?;
    let pipeline = Pipeline::new(settings(&config, None));

    let expanded = shellexpand::tilde(path);
    let Some(outcome) = pipeline.ingest_single_document(&expanded, sink.as_ref(), force) else {
        anyhow::bail!("Path does not exist: {}", path);
    };

    println!("{} {}", outcome.path.display(), describe(&outcome.result));
    if let FileResult::Failed { .. } = outcome.result {
        anyhow::bail!("Failed to ingest {}", outcome.path.display());
    }
    println!("  Output: {}", sink.store().path().display().to_string().dimmed());
    Ok(())
}
