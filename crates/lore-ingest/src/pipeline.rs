//! Ingestion orchestrator.
//!
//! A full run collects candidates under the documents root, narrows them to
//! new or changed files when state tracking is on, and fans the work out to a
//! [`WorkerPool`]. Each worker drives one file through the processing state
//! machine and reports a [`FileOutcome`], which the orchestrator records.

use crate::collector::{is_binary_document, CollectorConfig, PathCollector};
use crate::error::{IngestError, IngestResult};
use crate::parsers;
use crate::pool::{panic_message, CancelToken, WorkerPool};
use crate::probe::is_password_protected;
use crate::quality::QualityFilter;
use crate::sink::IndexSink;
use crate::state::StateStore;
use crate::streamer::LargeFileStreamer;
use lore_config::Config;
use lore_core::Snapshot;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Runtime knobs for a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Documents root. Runs without one do nothing.
    pub root: Option<PathBuf>,
    pub track_state: bool,
    pub state_file_name: String,
    pub include_hidden: bool,
    /// Text files at or above this many bytes are streamed.
    pub large_file_threshold_bytes: u64,
    /// Characters per streamed chunk.
    pub stream_chunk_size: usize,
    pub max_parallelism: usize,
    pub run_timeout: Duration,
    pub shutdown_grace: Duration,
    pub quality: QualityFilter,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.documents.resolve(),
            track_state: config.state.track_state,
            state_file_name: config.state.file_name.clone(),
            include_hidden: config.ingest.include_hidden,
            large_file_threshold_bytes: config.ingest.large_file_threshold_bytes,
            stream_chunk_size: config.ingest.stream_chunk_size,
            max_parallelism: config.ingest.max_parallelism,
            run_timeout: config.ingest.run_timeout(),
            shutdown_grace: config.ingest.shutdown_grace(),
            quality: QualityFilter::from_config(&config.quality),
        }
    }

    /// Location of the state file, when there is a root to put it in.
    pub fn state_file(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(&self.state_file_name))
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Why a file was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Fingerprint matches the last recorded run.
    Unchanged,
    Empty,
    PasswordProtected,
    /// Rejected by the quality filter, or every streamed chunk was.
    LowQuality,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Unchanged => "unchanged",
            SkipReason::Empty => "empty file",
            SkipReason::PasswordProtected => "password protected",
            SkipReason::LowQuality => "low quality content",
        };
        f.write_str(s)
    }
}

/// Result of running one file through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileResult {
    Success { segments: u64 },
    Failed { message: String },
    Skipped { reason: SkipReason },
    /// The run was cancelled while this file was in flight.
    Cancelled,
}

/// Per-file report merged into the state store by the orchestrator.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub snapshot: Snapshot,
    pub result: FileResult,
}

/// Totals for one [`Pipeline::ingest_all_documents`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates: usize,
    pub scheduled: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Scheduled files with no terminal outcome: cancelled or never started.
    pub abandoned: usize,
    pub segments: u64,
    pub timed_out: bool,
}

impl RunSummary {
    fn tally(&mut self, outcome: &FileOutcome) {
        match &outcome.result {
            FileResult::Success { segments } => {
                self.succeeded += 1;
                self.segments += segments;
            }
            FileResult::Failed { .. } => self.failed += 1,
            FileResult::Skipped { .. } => self.skipped += 1,
            FileResult::Cancelled => self.abandoned += 1,
        }
    }
}

/// The part of the pipeline shared with worker threads.
struct FileProcessor {
    settings: PipelineSettings,
    state: Arc<StateStore>,
    streamer: LargeFileStreamer,
}

impl FileProcessor {
    /// Run [`Self::process`], turning a panic into a failed outcome.
    fn process_guarded(
        &self,
        path: &Path,
        sink: &dyn IndexSink,
        force: bool,
        cancel: &CancelToken,
    ) -> FileOutcome {
        match panic::catch_unwind(AssertUnwindSafe(|| self.process(path, sink, force, cancel))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let detail = panic_message(payload);
                let snapshot =
                    Snapshot::capture(path).unwrap_or_else(|_| Snapshot::unreadable(path));
                FileOutcome {
                    path: path.to_path_buf(),
                    snapshot,
                    result: FileResult::Failed {
                        message: IngestError::ProcessingError(detail).to_string(),
                    },
                }
            }
        }
    }

    fn process(
        &self,
        path: &Path,
        sink: &dyn IndexSink,
        force: bool,
        cancel: &CancelToken,
    ) -> FileOutcome {
        let snapshot = match Snapshot::capture(path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return FileOutcome {
                    path: path.to_path_buf(),
                    snapshot: Snapshot::unreadable(path),
                    result: FileResult::Failed {
                        message: format!("Cannot stat file: {}", e),
                    },
                };
            }
        };

        let tracking = self.settings.track_state;
        if tracking && !force && !self.state.should_process(&snapshot) {
            debug!("Unchanged since last run: {:?}", path);
            return FileOutcome {
                path: path.to_path_buf(),
                snapshot,
                result: FileResult::Skipped {
                    reason: SkipReason::Unchanged,
                },
            };
        }

        if tracking {
            self.state.mark_processing(&snapshot);
        }

        let result = match self.run(path, &snapshot, sink, cancel) {
            Ok(result) => result,
            Err(IngestError::Cancelled) => FileResult::Cancelled,
            Err(e) => FileResult::Failed {
                message: e.to_string(),
            },
        };

        FileOutcome {
            path: path.to_path_buf(),
            snapshot,
            result,
        }
    }

    fn run(
        &self,
        path: &Path,
        snapshot: &Snapshot,
        sink: &dyn IndexSink,
        cancel: &CancelToken,
    ) -> IngestResult<FileResult> {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        let skipped = |reason| Ok(FileResult::Skipped { reason });

        if snapshot.file_size == 0 {
            return skipped(SkipReason::Empty);
        }
        if is_password_protected(path) {
            return skipped(SkipReason::PasswordProtected);
        }

        if !is_binary_document(path) && snapshot.file_size >= self.settings.large_file_threshold_bytes
        {
            let accepted = self.streamer.stream(path, sink, cancel)?;
            if accepted == 0 {
                return skipped(SkipReason::LowQuality);
            }
            return Ok(FileResult::Success { segments: accepted });
        }

        let document = parsers::parse_file(path)?;
        if !self.settings.quality.is_high_quality(Some(&document.text)) {
            return skipped(SkipReason::LowQuality);
        }
        sink.ingest(document)?;
        Ok(FileResult::Success { segments: 1 })
    }

    /// Log the outcome and write it to the state store when tracking is on.
    fn record(&self, outcome: &FileOutcome) {
        let path = &outcome.path;
        match &outcome.result {
            FileResult::Success { segments } => {
                info!("Ingested {:?} ({} segments)", path, segments)
            }
            FileResult::Failed { message } => error!("Failed to ingest {:?}: {}", path, message),
            FileResult::Skipped { reason } => debug!("Skipped {:?}: {}", path, reason),
            FileResult::Cancelled => warn!("Cancelled while processing {:?}", path),
        }

        if !self.settings.track_state {
            return;
        }
        let snapshot = &outcome.snapshot;
        match &outcome.result {
            FileResult::Success { segments } => self.state.mark_success(snapshot, *segments),
            FileResult::Failed { message } => self.state.mark_failure(snapshot, message.clone()),
            FileResult::Skipped { .. } => self.state.mark_skipped(snapshot),
            FileResult::Cancelled => {}
        }
    }
}

/// Incremental document ingestion.
pub struct Pipeline {
    processor: Arc<FileProcessor>,
    collector: PathCollector,
}

impl Pipeline {
    /// Build a pipeline, loading persisted state when tracking is enabled.
    pub fn new(settings: PipelineSettings) -> Self {
        let state = if settings.track_state {
            StateStore::open(settings.state_file())
        } else {
            StateStore::in_memory()
        };
        Self::with_state(settings, Arc::new(state))
    }

    pub fn with_state(settings: PipelineSettings, state: Arc<StateStore>) -> Self {
        let collector = PathCollector::new(CollectorConfig {
            include_hidden: settings.include_hidden,
            state_file_name: settings.state_file_name.clone(),
        });
        let streamer = LargeFileStreamer::new(settings.stream_chunk_size, settings.quality.clone());

        Self {
            processor: Arc::new(FileProcessor {
                settings,
                state,
                streamer,
            }),
            collector,
        }
    }

    /// Validate `config` and build a pipeline from it.
    pub fn from_config(config: &Config) -> IngestResult<Self> {
        config.validate()?;
        Ok(Self::new(PipelineSettings::from_config(config)))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.processor.settings
    }

    pub fn root(&self) -> Option<&Path> {
        self.processor.settings.root.as_deref()
    }

    pub fn state(&self) -> &StateStore {
        &self.processor.state
    }

    pub fn collector(&self) -> &PathCollector {
        &self.collector
    }

    /// Ingest every candidate under the root.
    ///
    /// With `force_reload` every candidate is processed. Otherwise, with state
    /// tracking on, only new or changed files are. Per-file failures are
    /// recorded and never abort the run; only an unreadable root does.
    pub fn ingest_all_documents(
        &self,
        sink: Arc<dyn IndexSink>,
        force_reload: bool,
    ) -> IngestResult<RunSummary> {
        let mut summary = RunSummary::default();

        let Some(root) = self.root() else {
            warn!("No documents root configured, nothing to ingest");
            return Ok(summary);
        };
        if !root.is_dir() {
            warn!("Documents root {:?} does not exist or is not a directory", root);
            return Ok(summary);
        }

        let candidates = self.collector.collect(root).inspect_err(|e| {
            error!("Cannot enumerate documents under {:?}: {}", root, e);
        })?;
        summary.candidates = candidates.len();
        if candidates.is_empty() {
            info!("No candidate documents under {:?}", root);
            return Ok(summary);
        }

        let settings = &self.processor.settings;
        let work: Vec<PathBuf> = if force_reload || !settings.track_state {
            candidates
        } else {
            candidates
                .into_iter()
                .filter(|path| match Snapshot::capture(path) {
                    Ok(snapshot) => self.state().should_process(&snapshot),
                    // Let the worker record the stat failure.
                    Err(_) => true,
                })
                .collect()
        };
        summary.scheduled = work.len();
        if work.is_empty() {
            info!("All {} documents are up to date", summary.candidates);
            return Ok(summary);
        }

        let size = settings.max_parallelism.max(1).min(work.len());
        info!(
            "Processing {} of {} documents with {} workers",
            work.len(),
            summary.candidates,
            size
        );

        let processor = Arc::clone(&self.processor);
        let mut pool = WorkerPool::spawn(
            size,
            "ingest",
            CancelToken::new(),
            move |path: PathBuf, cancel: &CancelToken| {
                processor.process_guarded(&path, sink.as_ref(), force_reload, cancel)
            },
        )?;
        for path in work {
            pool.submit(path);
        }

        let report = pool.join(settings.run_timeout, settings.shutdown_grace, |outcome| {
            self.processor.record(&outcome);
            summary.tally(&outcome);
        });
        summary.abandoned += report.abandoned;
        summary.failed += report.panicked;
        summary.timed_out = report.timed_out;

        if summary.timed_out {
            warn!(
                "Run timed out: {} succeeded, {} failed, {} skipped, {} abandoned",
                summary.succeeded, summary.failed, summary.skipped, summary.abandoned
            );
        } else {
            info!(
                "Run complete: {} succeeded, {} failed, {} skipped, {} segments",
                summary.succeeded, summary.failed, summary.skipped, summary.segments
            );
        }
        Ok(summary)
    }

    /// Ingest one file outside a full run.
    ///
    /// Returns `None` for a blank or missing path.
    pub fn ingest_single_document(
        &self,
        path: &str,
        sink: &dyn IndexSink,
        force_reload: bool,
    ) -> Option<FileOutcome> {
        if path.trim().is_empty() {
            warn!("Ignoring blank document path");
            return None;
        }
        let path = Path::new(path);
        if !path.exists() {
            warn!("Document {:?} does not exist", path);
            return None;
        }

        let outcome = self.process_file(path, sink, force_reload, &CancelToken::new());
        self.processor.record(&outcome);
        Some(outcome)
    }

    /// Run one file through the processing state machine without recording the outcome.
    pub fn process_file(
        &self,
        path: &Path,
        sink: &dyn IndexSink,
        force: bool,
        cancel: &CancelToken,
    ) -> FileOutcome {
        self.processor.process_guarded(path, sink, force, cancel)
    }

    /// Write an outcome to the state store (when tracking is on).
    pub fn record(&self, outcome: &FileOutcome) {
        self.processor.record(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemoryIndexSink;
    use lore_core::ProcessingStatus;
    use tempfile::tempdir;

    fn tracking_pipeline(root: &Path) -> Pipeline {
        Pipeline::new(PipelineSettings {
            root: Some(root.to_path_buf()),
            track_state: true,
            ..Default::default()
        })
    }

    fn status_of(pipeline: &Pipeline, path: &Path) -> Option<ProcessingStatus> {
        let absolute = std::path::absolute(path).unwrap();
        pipeline
            .state()
            .get(&absolute.to_string_lossy())
            .map(|s| s.status)
    }

    #[test]
    fn test_empty_file_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();

        let pipeline = tracking_pipeline(dir.path());
        let sink = MemoryIndexSink::default();
        let outcome = pipeline
            .ingest_single_document(&path.to_string_lossy(), &sink, false)
            .unwrap();

        assert_eq!(
            outcome.result,
            FileResult::Skipped {
                reason: SkipReason::Empty
            }
        );
        assert_eq!(status_of(&pipeline, &path), Some(ProcessingStatus::Skipped));
        assert!(sink.documents().is_empty());
    }

    #[test]
    fn test_low_quality_document_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.txt");
        std::fs::write(&path, "tiny").unwrap();

        let pipeline = Pipeline::new(PipelineSettings {
            root: Some(dir.path().to_path_buf()),
            track_state: true,
            quality: QualityFilter::new(50, 1.0),
            ..Default::default()
        });
        let sink = MemoryIndexSink::default();
        let outcome = pipeline
            .ingest_single_document(&path.to_string_lossy(), &sink, false)
            .unwrap();

        assert_eq!(
            outcome.result,
            FileResult::Skipped {
                reason: SkipReason::LowQuality
            }
        );
        assert!(sink.documents().is_empty());
    }

    #[test]
    fn test_single_document_success_and_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes\n\nSome text worth keeping.").unwrap();

        let pipeline = tracking_pipeline(dir.path());
        let sink = MemoryIndexSink::default();
        let first = pipeline
            .ingest_single_document(&path.to_string_lossy(), &sink, false)
            .unwrap();
        assert_eq!(first.result, FileResult::Success { segments: 1 });

        let second = pipeline
            .ingest_single_document(&path.to_string_lossy(), &sink, false)
            .unwrap();
        assert_eq!(
            second.result,
            FileResult::Skipped {
                reason: SkipReason::Unchanged
            }
        );
        assert_eq!(status_of(&pipeline, &path), Some(ProcessingStatus::Skipped));
        assert_eq!(sink.documents().len(), 1);

        let third = pipeline
            .ingest_single_document(&path.to_string_lossy(), &sink, false)
            .unwrap();
        assert_eq!(
            third.result,
            FileResult::Skipped {
                reason: SkipReason::Unchanged
            }
        );

        let forced = pipeline
            .ingest_single_document(&path.to_string_lossy(), &sink, true)
            .unwrap();
        assert_eq!(forced.result, FileResult::Success { segments: 1 });
        assert_eq!(sink.documents().len(), 2);
    }

    #[test]
    fn test_blank_and_missing_paths() {
        let dir = tempdir().unwrap();
        let pipeline = tracking_pipeline(dir.path());
        let sink = MemoryIndexSink::default();

        assert!(pipeline.ingest_single_document("   ", &sink, false).is_none());
        let missing = dir.path().join("missing.txt");
        assert!(pipeline
            .ingest_single_document(&missing.to_string_lossy(), &sink, false)
            .is_none());
        assert!(pipeline.state().is_empty());
    }

    #[test]
    fn test_cancelled_file_is_not_recorded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "content").unwrap();

        let pipeline = tracking_pipeline(dir.path());
        let cancel = CancelToken::new();
        cancel.cancel();
        let sink = MemoryIndexSink::default();
        let outcome = pipeline.process_file(&path, &sink, false, &cancel);
        pipeline.record(&outcome);

        assert_eq!(outcome.result, FileResult::Cancelled);
        // Still marked processing, so the next run retries it.
        assert_eq!(status_of(&pipeline, &path), Some(ProcessingStatus::Processing));
        assert!(pipeline.state().should_process(&outcome.snapshot));
    }

    #[test]
    fn test_missing_root_yields_empty_summary() {
        let dir = tempdir().unwrap();
        let pipeline = tracking_pipeline(&dir.path().join("nope"));
        let summary = pipeline
            .ingest_all_documents(Arc::new(MemoryIndexSink::default()), false)
            .unwrap();
        assert_eq!(summary, RunSummary::default());

        let rootless = Pipeline::new(PipelineSettings::default());
        let summary = rootless
            .ingest_all_documents(Arc::new(MemoryIndexSink::default()), false)
            .unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.documents.path = Some("/srv/docs".into());
        config.state.track_state = true;
        config.ingest.max_parallelism = 2;

        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.root, Some(PathBuf::from("/srv/docs")));
        assert!(settings.track_state);
        assert_eq!(settings.max_parallelism, 2);
        assert_eq!(
            settings.state_file(),
            Some(PathBuf::from("/srv/docs/.rag-processing-state.json"))
        );
    }

    #[test]
    fn test_pipeline_from_invalid_config() {
        let mut config = Config::default();
        config.quality.max_noise_ratio = 1.5;
        assert!(matches!(
            Pipeline::from_config(&config),
            Err(IngestError::Config(_))
        ));

        let pipeline = Pipeline::from_config(&Config::default()).unwrap();
        assert!(pipeline.root().is_none());
    }
}
