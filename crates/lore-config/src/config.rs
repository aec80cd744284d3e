//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default name of the processing state file kept in the documents root.
pub const DEFAULT_STATE_FILE_NAME: &str = ".rag-processing-state.json";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub quality: QualityConfig,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub splitter: SplitterConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;
        write_file(path, &contents)
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &Path) -> ConfigResult<()> {
        write_file(path, &Self::default_config_string())
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.quality.max_noise_ratio) {
            return Err(ConfigError::Invalid(format!(
                "quality.max_noise_ratio must be within 0.0..=1.0, got {}",
                self.quality.max_noise_ratio
            )));
        }
        if self.ingest.stream_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "ingest.stream_chunk_size must be greater than zero".to_string(),
            ));
        }
        let s = &self.splitter;
        if s.default_segment_size == 0
            || s.small_document_segment_size == 0
            || s.large_document_segment_size == 0
        {
            return Err(ConfigError::Invalid(
                "splitter segment sizes must be greater than zero".to_string(),
            ));
        }
        if self.ingest.run_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "ingest.run_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        let name = self.state.file_name.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid(
                "state.file_name must not be blank".to_string(),
            ));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::Invalid(format!(
                "state.file_name must be a plain file name inside the documents root, got {:?}",
                self.state.file_name
            )));
        }
        Ok(())
    }

    /// File the JSON-lines segment output is appended to.
    pub fn segments_file(&self) -> Option<PathBuf> {
        match &self.output.segments_file {
            Some(p) if !p.trim().is_empty() => Some(expand(p)),
            _ => AppPaths::new().map(|p| p.segments_file),
        }
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Lore Configuration
# Incremental document ingestion for retrieval-augmented generation

[documents]
# Root directory to ingest. Per-OS overrides win when set.
# path = "~/Documents/knowledge"
# windows_path = 'D:\knowledge'
# linux_path = "/srv/knowledge"

[ingest]
# Text files at or above this size are streamed in chunks (bytes)
large_file_threshold_bytes = 5242880
# Characters per streamed chunk
stream_chunk_size = 262144
# Include dot-files and hidden directories
include_hidden = false
# Worker threads used for a full run
max_parallelism = 4
# Give up waiting for workers after this long (seconds)
run_timeout_seconds = 300
# Extra time granted to in-flight files after a timeout (seconds)
shutdown_grace_seconds = 10

[quality]
# Minimum trimmed length in characters (0 disables the check)
min_content_length = 0
# Maximum share of ASCII punctuation/symbols (1.0 disables the check)
max_noise_ratio = 1.0

[state]
# Skip unchanged files between runs
track_state = false
# State file, stored inside the documents root
file_name = ".rag-processing-state.json"

[splitter]
default_segment_size = 800
# Documents at or below small_document_threshold get the larger segments
small_document_segment_size = 1200
# Documents at or above large_document_threshold get the smaller segments
large_document_segment_size = 500
small_document_threshold = 2000
large_document_threshold = 100000
overlap = 200
# Prepend the file name to every segment
prefix_file_name = true

[output]
# JSON-lines file consumed by the indexer
# segments_file = "~/.local/share/lore/segments.jsonl"

[watch]
ignore_patterns = [
    "*.tmp",
    "*.temp",
    "*.part",
    "~$*",
]
debounce_seconds = 2
"#
        .to_string()
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn write_file(path: &Path, contents: &str) -> ConfigResult<()> {
    let write_error = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    std::fs::write(path, contents).map_err(write_error)
}

/// Where the documents live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    pub path: Option<String>,
    pub windows_path: Option<String>,
    pub linux_path: Option<String>,
}

impl DocumentsConfig {
    /// Resolve the documents root for the running platform.
    ///
    /// Returns `None` when nothing usable is configured.
    pub fn resolve(&self) -> Option<PathBuf> {
        let platform = if cfg!(windows) {
            self.windows_path.as_deref()
        } else {
            self.linux_path.as_deref()
        };

        platform
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.path.as_deref().filter(|p| !p.trim().is_empty()))
            .map(|p| expand(p.trim()))
    }
}

/// Pipeline scheduling and large-file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub large_file_threshold_bytes: u64,
    pub stream_chunk_size: usize,
    pub include_hidden: bool,
    pub max_parallelism: usize,
    pub run_timeout_seconds: u64,
    pub shutdown_grace_seconds: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            large_file_threshold_bytes: 5 * 1024 * 1024,
            stream_chunk_size: 256 * 1024,
            include_hidden: false,
            max_parallelism: 4,
            run_timeout_seconds: 300,
            shutdown_grace_seconds: 10,
        }
    }
}

impl IngestConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

/// Content quality thresholds. The defaults accept everything non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub min_content_length: usize,
    pub max_noise_ratio: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_content_length: 0,
            max_noise_ratio: 1.0,
        }
    }
}

/// Incremental state tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub track_state: bool,
    pub file_name: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            track_state: false,
            file_name: DEFAULT_STATE_FILE_NAME.to_string(),
        }
    }
}

/// Adaptive segment sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    pub default_segment_size: usize,
    pub small_document_segment_size: usize,
    pub large_document_segment_size: usize,
    pub small_document_threshold: usize,
    pub large_document_threshold: usize,
    pub overlap: usize,
    pub prefix_file_name: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            default_segment_size: 800,
            small_document_segment_size: 1200,
            large_document_segment_size: 500,
            small_document_threshold: 2_000,
            large_document_threshold: 100_000,
            overlap: 200,
            prefix_file_name: true,
        }
    }
}

/// Segment output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub segments_file: Option<String>,
}

/// File watching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub ignore_patterns: Vec<String>,
    pub debounce_seconds: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: vec![
                "*.tmp".to_string(),
                "*.temp".to_string(),
                "*.part".to_string(),
                "~$*".to_string(),
            ],
            debounce_seconds: 2,
        }
    }
}
