//! Watch command implementation.

use super::{describe, load_config, open_sink, require_root, settings};
use anyhow::Result;
use colored::Colorize;
use lore_ingest::{DocumentWatcher, Pipeline, WatchEvent, WatcherConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// Watch the documents root in the foreground until interrupted.
pub fn run(
    config_path: Option<&Path>,
    root: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let settings = settings(&config, root);
    let root = require_root(&settings)?;
    if !root.is_dir() {
        anyhow::bail!("Documents root does not exist: {}", root.display());
    }

    let sink = open_sink(&config, output)?;
    let pipeline = Pipeline::new(settings);

    let mut watcher = DocumentWatcher::new(WatcherConfig::from_config(root.clone(), &config))?;
    watcher.start()?;

    println!("{} {}", "Watching:".cyan(), root.display());
    println!("Segments go to {}", sink.store().path().display());
    println!("\nPress Ctrl+C to stop.\n");

    loop {
        std::thread::sleep(Duration::from_millis(200));

        for event in watcher.poll() {
            match event {
                WatchEvent::FileChanged { path } => {
                    info!("Document changed: {:?}", path);
                    let path_str = path.to_string_lossy();
                    let Some(outcome) =
                        pipeline.ingest_single_document(&path_str, sink.as_ref(), false)
                    else {
                        continue;
                    };
                    println!("{} {}", path.display(), describe(&outcome.result));
                }
                WatchEvent::FileDeleted { path } => {
                    // Segments already sent for a deleted file stay in the index.
                    println!("{} {}", "Deleted:".yellow(), path.display());
                }
                WatchEvent::Error(msg) => {
                    error!("Watch error: {}", msg);
                    println!("{} {}", "Watch error:".red(), msg);
                }
            }
        }
    }
}
