//! Document splitting for retrieval.
//!
//! [`ParagraphSplitter`] packs paragraphs into segments of bounded size;
//! [`AdaptiveSplitter`] picks that bound from the document's length.

use lore_core::{Document, Metadata, Segment};

/// Metadata key holding a segment's position within its document.
pub const SEGMENT_INDEX: &str = "index";

/// Splits a document into segments for embedding.
pub trait DocumentSplitter: Send + Sync {
    fn split(&self, document: &Document) -> Vec<Segment>;
}

/// Paragraph-boundary splitter with character overlap.
///
/// Paragraphs (blank-line separated) are packed into segments of at most
/// `max_segment_size` characters. Paragraphs that do not fit on their own are
/// broken into sentences, and sentences that still do not fit are cut by
/// character count. Each new segment starts with up to `overlap` trailing
/// characters of the previous one when they fit.
#[derive(Debug, Clone)]
pub struct ParagraphSplitter {
    max_segment_size: usize,
    overlap: usize,
}

impl ParagraphSplitter {
    pub fn new(max_segment_size: usize, overlap: usize) -> Self {
        Self {
            max_segment_size: max_segment_size.max(1),
            overlap,
        }
    }

    pub fn split_text(&self, text: &str, metadata: &Metadata) -> Vec<Segment> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return vec![];
        }

        let mut builder = SegmentBuilder::new(self.max_segment_size, self.overlap, metadata);
        if char_len(trimmed) <= self.max_segment_size {
            builder.push(trimmed, "");
            return builder.finish();
        }

        for para in trimmed.split("\n\n") {
            let para = para.trim();
            if para.is_empty() {
                continue;
            }
            if char_len(para) <= self.max_segment_size {
                builder.push(para, "\n\n");
                continue;
            }

            // Content without sentence breaks (tables, JSON) goes straight to hard cuts.
            let sentences = split_sentences(para);
            if sentences.len() <= 1 {
                for piece in self.hard_split(para) {
                    builder.push(&piece, " ");
                }
                continue;
            }
            for sentence in sentences {
                if char_len(sentence) <= self.max_segment_size {
                    builder.push(sentence, " ");
                } else {
                    for piece in self.hard_split(sentence) {
                        builder.push(&piece, " ");
                    }
                }
            }
        }

        builder.finish()
    }

    /// Cut `text` into pieces of exactly `max_segment_size` characters (the last may be shorter).
    fn hard_split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.max_segment_size)
            .map(|c| c.iter().collect())
            .collect()
    }
}

impl DocumentSplitter for ParagraphSplitter {
    fn split(&self, document: &Document) -> Vec<Segment> {
        self.split_text(&document.text, &document.metadata)
    }
}

/// Accumulates pieces into size-bounded segments.
struct SegmentBuilder<'a> {
    max: usize,
    overlap: usize,
    metadata: &'a Metadata,
    current: String,
    current_len: usize,
    segments: Vec<Segment>,
}

impl<'a> SegmentBuilder<'a> {
    fn new(max: usize, overlap: usize, metadata: &'a Metadata) -> Self {
        Self {
            max,
            overlap,
            metadata,
            current: String::new(),
            current_len: 0,
            segments: Vec::new(),
        }
    }

    fn push(&mut self, piece: &str, separator: &str) {
        let piece_len = char_len(piece);
        let sep_len = char_len(separator);

        if self.current_len > 0 && self.current_len + sep_len + piece_len > self.max {
            let tail = self.emit();
            let tail_len = char_len(&tail);
            if tail_len > 0 && tail_len + sep_len + piece_len <= self.max {
                self.current = tail;
                self.current_len = tail_len;
            }
        }

        if self.current_len > 0 {
            self.current.push_str(separator);
            self.current_len += sep_len;
        }
        self.current.push_str(piece);
        self.current_len += piece_len;
    }

    /// Emit the current segment and return its overlap tail.
    fn emit(&mut self) -> String {
        let text = std::mem::take(&mut self.current);
        self.current_len = 0;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let index = self.segments.len();
        let mut metadata = self.metadata.clone();
        metadata.insert(SEGMENT_INDEX.to_string(), index.into());
        self.segments.push(Segment::new(index, trimmed, metadata));

        if self.overlap == 0 {
            return String::new();
        }
        let skip = char_len(trimmed).saturating_sub(self.overlap);
        trimmed.chars().skip(skip).collect::<String>().trim_start().to_string()
    }

    fn finish(mut self) -> Vec<Segment> {
        if self.current_len > 0 {
            self.emit();
        }
        self.segments
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split text after `.`, `!` or `?` followed by whitespace or the end.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        let at_boundary = match chars.peek() {
            None => true,
            Some((_, next)) => next.is_whitespace(),
        };
        if at_boundary {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let remaining = text[start..].trim();
    if !remaining.is_empty() {
        sentences.push(remaining);
    }
    sentences
}

/// Picks a segment size from the document's length, then splits by paragraph.
///
/// Short documents get larger segments to avoid fragment noise; very long
/// ones get smaller segments to keep retrieval precise.
#[derive(Debug, Clone)]
pub struct AdaptiveSplitter {
    default_segment_size: usize,
    small_document_segment_size: usize,
    large_document_segment_size: usize,
    small_document_threshold: usize,
    large_document_threshold: usize,
    overlap: usize,
}

impl AdaptiveSplitter {
    pub fn new(
        default_segment_size: usize,
        small_document_segment_size: usize,
        large_document_segment_size: usize,
        small_document_threshold: usize,
        large_document_threshold: usize,
        overlap: usize,
    ) -> Self {
        Self {
            default_segment_size,
            small_document_segment_size,
            large_document_segment_size,
            small_document_threshold,
            large_document_threshold,
            overlap,
        }
    }

    pub fn from_config(config: &lore_config::SplitterConfig) -> Self {
        Self::new(
            config.default_segment_size,
            config.small_document_segment_size,
            config.large_document_segment_size,
            config.small_document_threshold,
            config.large_document_threshold,
            config.overlap,
        )
    }

    /// Segment size for a document of `length` characters.
    pub fn segment_size_for(&self, length: usize) -> usize {
        let size = if length >= self.large_document_threshold {
            self.large_document_segment_size
        } else if length <= self.small_document_threshold {
            self.small_document_segment_size
        } else {
            self.default_segment_size
        };
        size.max(self.overlap + 1)
    }
}

impl DocumentSplitter for AdaptiveSplitter {
    fn split(&self, document: &Document) -> Vec<Segment> {
        let size = self.segment_size_for(document.char_len());
        ParagraphSplitter::new(size, self.overlap).split(document)
    }
}
