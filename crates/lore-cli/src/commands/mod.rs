//! CLI command implementations.

pub mod add;
pub mod config;
pub mod ingest;
pub mod scan;
pub mod status;
pub mod watch;

use anyhow::{Context, Result};
use colored::Colorize;
use lore_config::{AppPaths, Config};
use lore_ingest::{
    AdaptiveSplitter, FileResult, JsonlSegmentStore, PipelineSettings, SplittingSink,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Get the application paths.
pub fn get_paths() -> Result<AppPaths> {
    AppPaths::new().context("Failed to determine application directories")
}

/// The config file in effect: `--config` or the platform default.
pub fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(get_paths()?.config_file),
    }
}

pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = config_file(explicit)?;
    Config::load_from(&path).with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Pipeline settings with an optional `--root` override applied.
pub fn settings(config: &Config, root: Option<String>) -> PipelineSettings {
    let mut settings = PipelineSettings::from_config(config);
    if let Some(root) = root.filter(|r| !r.trim().is_empty()) {
        settings.root = Some(PathBuf::from(shellexpand::tilde(root.trim()).as_ref()));
    }
    settings
}

/// Documents root from settings, or a hint on how to set one.
pub fn require_root(settings: &PipelineSettings) -> Result<PathBuf> {
    settings.root.clone().context(
        "No documents root configured. Set [documents] path in the config or pass --root.",
    )
}

/// Sink that splits documents and appends segments to the JSON-lines output.
pub fn open_sink(
    config: &Config,
    output: Option<PathBuf>,
) -> Result<Arc<SplittingSink<JsonlSegmentStore>>> {
    let path = output
        .or_else(|| config.segments_file())
        .context("Cannot determine the segment output file; pass --output")?;
    let store = JsonlSegmentStore::open(&path)
        .with_context(|| format!("Failed to open segment output {}", path.display()))?;

    let splitter = AdaptiveSplitter::from_config(&config.splitter);
    Ok(Arc::new(
        SplittingSink::new(Box::new(splitter), store)
            .with_file_name_prefix(config.splitter.prefix_file_name),
    ))
}

/// One-line coloured rendering of a per-file result.
pub fn describe(result: &FileResult) -> String {
    match result {
        FileResult::Success { segments } => {
            format!("{} ({} segments)", "ingested".green(), segments)
        }
        FileResult::Failed { message } => format!("{} {}", "failed:".red(), message),
        FileResult::Skipped { reason } => format!("{} ({})", "skipped".yellow(), reason),
        FileResult::Cancelled => "cancelled".yellow().to_string(),
    }
}
