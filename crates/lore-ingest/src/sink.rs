//! Where parsed documents go once they pass the quality gate.

use crate::error::{IngestError, IngestResult};
use crate::splitter::DocumentSplitter;
use lore_core::{Document, Segment};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Downstream indexer. Receives one whole document or one streamed chunk per call.
///
/// Called concurrently from worker threads.
pub trait IndexSink: Send + Sync {
    fn ingest(&self, document: Document) -> IngestResult<()>;
}

/// Storage for split segments.
pub trait SegmentStore: Send + Sync {
    fn add_all(&self, segments: Vec<Segment>) -> IngestResult<()>;
}

/// Splits each document and hands the segments to a [`SegmentStore`].
pub struct SplittingSink<S> {
    splitter: Box<dyn DocumentSplitter>,
    store: S,
    prefix_file_name: bool,
}

impl<S: SegmentStore> SplittingSink<S> {
    pub fn new(splitter: Box<dyn DocumentSplitter>, store: S) -> Self {
        Self {
            splitter,
            store,
            prefix_file_name: false,
        }
    }

    /// Start every segment with its source file name on its own line.
    pub fn with_file_name_prefix(mut self, enabled: bool) -> Self {
        self.prefix_file_name = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: SegmentStore> IndexSink for SplittingSink<S> {
    fn ingest(&self, document: Document) -> IngestResult<()> {
        let mut segments = self.splitter.split(&document);
        if self.prefix_file_name {
            if let Some(name) = document.file_name() {
                for segment in &mut segments {
                    segment.text = format!("{}\n{}", name, segment.text);
                }
            }
        }

        debug!(
            "Split {} into {} segments",
            document.file_name().unwrap_or("<unnamed>"),
            segments.len()
        );
        self.store.add_all(segments)
    }
}

/// Appends segments to a JSON-lines file, one segment per line.
pub struct JsonlSegmentStore {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSegmentStore {
    /// Open `path` for appending, creating it and its parent directory if needed.
    pub fn open(path: &Path) -> IngestResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every segment back from a JSON-lines file.
    pub fn read_all(path: &Path) -> IngestResult<Vec<Segment>> {
        let data = std::fs::read_to_string(path)?;
        data.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(IngestError::from))
            .collect()
    }
}

impl SegmentStore for JsonlSegmentStore {
    fn add_all(&self, segments: Vec<Segment>) -> IngestResult<()> {
        let mut writer = self.writer.lock();
        for segment in &segments {
            serde_json::to_writer(&mut *writer, segment)?;
            writer.write_all(b"\n")?;
        }
        writer
            .flush()
            .map_err(|e| IngestError::Sink(format!("{}: {}", self.path.display(), e)))
    }
}

/// Keeps segments in memory.
#[derive(Default)]
pub struct MemorySegmentStore {
    segments: Mutex<Vec<Segment>>,
}

impl MemorySegmentStore {
    pub fn segments(&self) -> Vec<Segment> {
        self.segments.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.segments.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.lock().is_empty()
    }
}

impl SegmentStore for MemorySegmentStore {
    fn add_all(&self, segments: Vec<Segment>) -> IngestResult<()> {
        self.segments.lock().extend(segments);
        Ok(())
    }
}

/// Records every document it receives, unsplit.
#[derive(Default)]
pub struct MemoryIndexSink {
    documents: Mutex<Vec<Document>>,
}

impl MemoryIndexSink {
    pub fn documents(&self) -> Vec<Document> {
        self.documents.lock().clone()
    }
}

impl IndexSink for MemoryIndexSink {
    fn ingest(&self, document: Document) -> IngestResult<()> {
        self.documents.lock().push(document);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::ParagraphSplitter;

    fn document(text: &str) -> Document {
        Document::new(text).with_metadata(lore_core::FILE_NAME, "notes.txt")
    }

    #[test]
    fn test_splitting_sink_prefixes_file_name() {
        let sink = SplittingSink::new(
            Box::new(ParagraphSplitter::new(100, 0)),
            MemorySegmentStore::default(),
        )
        .with_file_name_prefix(true);

        sink.ingest(document("Some useful content.")).unwrap();

        let segments = sink.store().segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "notes.txt\nSome useful content.");
        assert_eq!(segments[0].metadata["file_name"], "notes.txt");
    }

    #[test]
    fn test_splitting_sink_without_prefix() {
        let sink = SplittingSink::new(
            Box::new(ParagraphSplitter::new(15, 0)),
            MemorySegmentStore::default(),
        );

        sink.ingest(document("First part.\n\nSecond part.")).unwrap();

        let texts: Vec<_> = sink.store().segments().into_iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["First part.", "Second part."]);
    }

    #[test]
    fn test_jsonl_store_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/segments.jsonl");

        {
            let store = JsonlSegmentStore::open(&path).unwrap();
            let sink = SplittingSink::new(Box::new(ParagraphSplitter::new(100, 0)), store);
            sink.ingest(document("alpha")).unwrap();
            sink.ingest(document("beta")).unwrap();
        }
        {
            let store = JsonlSegmentStore::open(&path).unwrap();
            store
                .add_all(vec![Segment::new(0, "gamma", Default::default())])
                .unwrap();
        }

        let segments = JsonlSegmentStore::read_all(&path).unwrap();
        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "beta", "gamma"]);
    }
}
