//! Platform locations for the config file and default segment output.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Per-user files Lore falls back to when nothing overrides them.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// `config.toml` in the platform config directory.
    pub config_file: PathBuf,
    /// `segments.jsonl` in the platform data directory.
    pub segments_file: PathBuf,
}

impl AppPaths {
    /// `None` when the platform has no home directory for the current user.
    pub fn new() -> Option<Self> {
        let dirs = ProjectDirs::from("com", "lore", "lore")?;
        Some(Self {
            config_file: dirs.config_dir().join("config.toml"),
            segments_file: dirs.data_dir().join("segments.jsonl"),
        })
    }
}
