//! File system watcher for continuous ingestion of the documents root.

use crate::collector::{CollectorConfig, PathCollector};
use crate::error::{IngestError, IngestResult};
use glob::Pattern;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Events emitted by the document watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A candidate document was created or modified.
    FileChanged { path: PathBuf },
    /// A candidate document disappeared.
    FileDeleted { path: PathBuf },
    Error(String),
}

/// Configuration for the document watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub root: PathBuf,
    pub ignore_patterns: Vec<Pattern>,
    pub debounce: Duration,
    pub collector: CollectorConfig,
}

impl WatcherConfig {
    /// Watch `root` with the `[watch]` and collector settings of `config`.
    ///
    /// Invalid glob patterns are logged and dropped.
    pub fn from_config(root: PathBuf, config: &lore_config::Config) -> Self {
        let ignore_patterns = config
            .watch
            .ignore_patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid watch pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect();

        Self {
            root,
            ignore_patterns,
            debounce: Duration::from_secs(config.watch.debounce_seconds.max(1)),
            collector: CollectorConfig::from_config(config),
        }
    }

    /// Whether a change to `path` should not trigger ingestion.
    pub fn should_ignore(&self, path: &Path) -> bool {
        if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
            if self.ignore_patterns.iter().any(|p| p.matches(filename)) {
                return true;
            }
        }

        let path_str = path.to_string_lossy();
        if self.ignore_patterns.iter().any(|p| p.matches(&path_str)) {
            return true;
        }

        if !self.collector.include_hidden && self.in_hidden_directory(path) {
            return true;
        }

        !PathCollector::new(self.collector.clone()).accepts(path)
    }

    fn in_hidden_directory(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        let relative = parent.strip_prefix(&self.root).unwrap_or(parent);
        relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
    }
}

/// Watches the documents root and reports changed candidate documents.
pub struct DocumentWatcher {
    config: WatcherConfig,
    debouncer: Debouncer<RecommendedWatcher>,
    receiver: Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
}

impl DocumentWatcher {
    pub fn new(config: WatcherConfig) -> IngestResult<Self> {
        let (tx, rx) = channel();

        let debouncer = new_debouncer(config.debounce, tx)
            .map_err(|e| IngestError::WatchError(e.to_string()))?;

        Ok(Self {
            config,
            debouncer,
            receiver: rx,
        })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Start watching the root recursively.
    pub fn start(&mut self) -> IngestResult<()> {
        if !self.config.root.is_dir() {
            return Err(IngestError::FileNotFound(self.config.root.clone()));
        }

        info!("Watching directory: {:?}", self.config.root);
        self.debouncer
            .watcher()
            .watch(&self.config.root, RecursiveMode::Recursive)
            .map_err(|e| IngestError::WatchError(e.to_string()))
    }

    /// Drain pending events without blocking.
    pub fn poll(&self) -> Vec<WatchEvent> {
        let mut events = Vec::new();

        while let Ok(result) = self.receiver.try_recv() {
            match result {
                Ok(debounced) => {
                    events.extend(debounced.into_iter().filter_map(|e| self.process_event(e)));
                }
                Err(e) => {
                    error!("Watch error: {:?}", e);
                    events.push(WatchEvent::Error(e.to_string()));
                }
            }
        }

        events.dedup();
        events
    }

    fn process_event(&self, event: DebouncedEvent) -> Option<WatchEvent> {
        let path = event.path;

        if path.is_dir() {
            return None;
        }
        if self.config.should_ignore(&path) {
            debug!("Ignoring change to {:?}", path);
            return None;
        }

        if path.exists() {
            debug!("Document changed: {:?}", path);
            Some(WatchEvent::FileChanged { path })
        } else {
            debug!("Document deleted: {:?}", path);
            Some(WatchEvent::FileDeleted { path })
        }
    }
}
