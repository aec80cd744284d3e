//! Chunked reading of text files too large to parse in one piece.

use crate::error::{IngestError, IngestResult};
use crate::pool::CancelToken;
use crate::quality::QualityFilter;
use crate::sink::IndexSink;
use lore_core::{Document, FILE_NAME};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Metadata key holding a chunk's position within its file.
pub const CHUNK_INDEX: &str = "chunk_index";

/// Metadata key holding a chunk's length in characters.
pub const CHUNK_LENGTH: &str = "chunk_length";

/// Iterator over UTF-8 text in chunks of exactly `chunk_size` characters.
///
/// Only the final chunk may be shorter. Bytes are decoded incrementally, so a
/// multi-byte character split across reads is reassembled. Invalid UTF-8
/// yields an `InvalidData` error and ends the iteration.
pub struct CharChunks<R> {
    reader: R,
    chunk_size: usize,
    /// Undecoded tail of the last read: an incomplete character.
    carry: Vec<u8>,
    decoded: String,
    decoded_chars: usize,
    eof: bool,
    failed: bool,
}

impl<R: Read> CharChunks<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            carry: Vec::new(),
            decoded: String::new(),
            decoded_chars: 0,
            eof: false,
            failed: false,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let n = loop {
            match self.reader.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        if n == 0 {
            self.eof = true;
            if !self.carry.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "stream ended inside a UTF-8 sequence",
                ));
            }
            return Ok(());
        }

        self.carry.extend_from_slice(&buf[..n]);
        let valid = match std::str::from_utf8(&self.carry) {
            Ok(_) => self.carry.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(io::Error::new(io::ErrorKind::InvalidData, e));
            }
        };

        let text = std::str::from_utf8(&self.carry[..valid])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.decoded_chars += text.chars().count();
        self.decoded.push_str(text);
        self.carry.drain(..valid);
        Ok(())
    }

    fn take_chunk(&mut self) -> String {
        let end = self
            .decoded
            .char_indices()
            .nth(self.chunk_size)
            .map(|(i, _)| i)
            .unwrap_or(self.decoded.len());
        let rest = self.decoded.split_off(end);
        let chunk = std::mem::replace(&mut self.decoded, rest);
        self.decoded_chars -= self.chunk_size.min(self.decoded_chars);
        chunk
    }
}

impl<R: Read> Iterator for CharChunks<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        while self.decoded_chars < self.chunk_size && !self.eof {
            if let Err(e) = self.fill() {
                self.failed = true;
                return Some(Err(e));
            }
        }

        if self.decoded_chars == 0 {
            return None;
        }
        Some(Ok(self.take_chunk()))
    }
}

/// Feeds a large text file to the sink chunk by chunk.
#[derive(Debug, Clone)]
pub struct LargeFileStreamer {
    chunk_size: usize,
    quality: QualityFilter,
}

impl LargeFileStreamer {
    pub fn new(chunk_size: usize, quality: QualityFilter) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            quality,
        }
    }

    /// Stream `path` into `sink`, returning the number of chunks accepted.
    ///
    /// Chunks rejected by the quality filter are dropped but still consume a
    /// chunk index. Cancellation is checked before each chunk.
    pub fn stream(
        &self,
        path: &Path,
        sink: &dyn IndexSink,
        cancel: &CancelToken,
    ) -> IngestResult<u64> {
        let file = File::open(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!("Streaming {:?} in chunks of {} characters", path, self.chunk_size);

        let mut accepted = 0u64;
        let mut chunk_index = 0u64;
        for chunk in CharChunks::new(BufReader::new(file), self.chunk_size) {
            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }

            let chunk = chunk.map_err(|e| IngestError::ParseError {
                path: path.to_path_buf(),
                message: format!("chunk {}: {}", chunk_index, e),
            })?;

            if self.quality.is_high_quality(Some(&chunk)) {
                let length = chunk.chars().count();
                let document = Document::new(chunk)
                    .with_metadata(FILE_NAME, file_name.clone())
                    .with_metadata(CHUNK_INDEX, chunk_index)
                    .with_metadata(CHUNK_LENGTH, length);
                sink.ingest(document)?;
                accepted += 1;
            } else {
                debug!("Dropped low-quality chunk {} of {:?}", chunk_index, path);
            }
            chunk_index += 1;
        }

        info!(
            "Streamed {:?}: {} of {} chunks accepted",
            path, accepted, chunk_index
        );
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{IndexSink, MemoryIndexSink};
    use std::io::Cursor;

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn chunks_of(data: &[u8], size: usize) -> Vec<String> {
        CharChunks::new(Cursor::new(data.to_vec()), size)
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_exact_chunks_with_remainder() {
        let text = "a".repeat(3 * 100 + 7);
        let chunks = chunks_of(text.as_bytes(), 100);
        let lengths: Vec<_> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lengths, vec![100, 100, 100, 7]);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let text = "b".repeat(200);
        assert_eq!(chunks_of(text.as_bytes(), 100).len(), 2);
        assert!(chunks_of(b"", 100).is_empty());
    }

    #[test]
    fn test_multibyte_split_across_reads() {
        let text = "日本語のテキスト".repeat(10);
        let reader = Trickle {
            data: text.as_bytes(),
            step: 1,
        };
        let chunks: Vec<String> = CharChunks::new(reader, 7)
            .collect::<io::Result<Vec<_>>>()
            .unwrap();

        assert_eq!(chunks.concat(), text);
        assert!(chunks[..chunks.len() - 1].iter().all(|c| c.chars().count() == 7));
        assert_eq!(chunks.last().unwrap().chars().count(), 80 % 7);
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let mut data = b"valid text ".to_vec();
        data.extend_from_slice(&[0xff, 0xfe]);
        let results: Vec<_> = CharChunks::new(Cursor::new(data), 4).collect();

        assert!(results.last().unwrap().is_err());
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }

    #[test]
    fn test_truncated_sequence_is_error() {
        let data = vec![b'o', b'k', 0xe6, 0x97];
        let results: Vec<_> = CharChunks::new(Cursor::new(data), 100).collect();
        assert!(results.iter().any(|r| r.is_err()));
    }

    #[test]
    fn test_stream_indexes_every_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        // Chunk 1 is pure punctuation and fails the noise check.
        let text = format!("{}{}{}", "a".repeat(50), "#".repeat(50), "c".repeat(20));
        std::fs::write(&path, text).unwrap();

        let sink = MemoryIndexSink::default();
        let streamer = LargeFileStreamer::new(50, QualityFilter::new(0, 0.5));
        let accepted = streamer.stream(&path, &sink, &CancelToken::new()).unwrap();

        assert_eq!(accepted, 2);
        let docs = sink.documents();
        let indices: Vec<_> = docs.iter().map(|d| d.metadata[CHUNK_INDEX].clone()).collect();
        assert_eq!(indices, vec![serde_json::json!(0), serde_json::json!(2)]);
        assert_eq!(docs[1].metadata[CHUNK_LENGTH], 20);
        assert_eq!(docs[0].file_name(), Some("big.txt"));
    }

    #[test]
    fn test_stream_honours_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "x".repeat(500)).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let sink = MemoryIndexSink::default();
        let err = LargeFileStreamer::new(100, QualityFilter::default())
            .stream(&path, &sink, &cancel)
            .unwrap_err();

        assert!(matches!(err, IngestError::Cancelled));
        assert!(sink.documents().is_empty());
    }

    #[test]
    fn test_sink_failure_propagates() {
        struct Refusing;
        impl IndexSink for Refusing {
            fn ingest(&self, _document: Document) -> IngestResult<()> {
                Err(IngestError::Sink("index offline".into()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "y".repeat(300)).unwrap();

        let err = LargeFileStreamer::new(100, QualityFilter::default())
            .stream(&path, &Refusing, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, IngestError::Sink(_)));
    }
}
