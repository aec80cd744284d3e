//! Lore Ingest - Incremental document ingestion pipeline.
//!
//! This crate provides:
//! - Candidate discovery with hidden/state/non-document filtering
//! - Durable per-file processing state for incremental runs
//! - A bounded worker pool that isolates per-file failures
//! - Streaming of oversized text files in fixed-size chunks
//! - Content quality filtering and adaptive segment sizing
//! - File system watching for continuous ingestion

mod collector;
mod error;
pub mod parsers;
mod pipeline;
mod pool;
mod probe;
mod quality;
mod sink;
mod splitter;
mod state;
mod streamer;
mod watcher;

pub use collector::{
    filter_non_document_files, is_binary_document, CollectorConfig, PathCollector,
};
pub use error::{IngestError, IngestResult};
pub use pipeline::{
    FileOutcome, FileResult, Pipeline, PipelineSettings, RunSummary, SkipReason,
};
pub use pool::{CancelToken, PoolReport, WorkerPool};
pub use probe::is_password_protected;
pub use quality::QualityFilter;
pub use sink::{
    IndexSink, JsonlSegmentStore, MemoryIndexSink, MemorySegmentStore, SegmentStore,
    SplittingSink,
};
pub use splitter::{AdaptiveSplitter, DocumentSplitter, ParagraphSplitter, SEGMENT_INDEX};
pub use state::StateStore;
pub use streamer::{CharChunks, LargeFileStreamer, CHUNK_INDEX, CHUNK_LENGTH};
pub use watcher::{DocumentWatcher, WatchEvent, WatcherConfig};
