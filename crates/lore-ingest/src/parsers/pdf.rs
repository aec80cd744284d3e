//! PDF document parser.

use super::{located_document, DocumentParser};
use crate::error::{IngestError, IngestResult};
use lore_core::Document;
use std::path::Path;
use tracing::debug;

/// Parser for PDF files.
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> IngestResult<Document> {
        if !path.exists() {
            return Err(IngestError::FileNotFound(path.to_path_buf()));
        }

        debug!("Parsing PDF: {:?}", path);

        // pdf-extract panics on some malformed fonts instead of returning an error.
        let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text(path));
        let raw = match extracted {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                return Err(IngestError::ParseError {
                    path: path.to_path_buf(),
                    message: format!("Failed to extract text from PDF: {}", e),
                })
            }
            Err(_) => {
                return Err(IngestError::ParseError {
                    path: path.to_path_buf(),
                    message: "PDF text extraction panicked".to_string(),
                })
            }
        };

        let pages = raw.matches('\x0C').count() + 1;
        let content = clean_pdf_text(&raw);
        debug!("Extracted {} characters from {} PDF pages", content.len(), pages);

        Ok(located_document(path, content).with_metadata("pages", pages))
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }
}

/// Trim lines, collapse runs of blank lines and turn page breaks into paragraph breaks.
fn clean_pdf_text(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.split(['\n', '\x0C']) {
        let line = line.trim();
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_pdf_text() {
        let messy = "  Hello  \n\n\n\nWorld  \x0C\n\nTest\n\n";
        assert_eq!(clean_pdf_text(messy), "Hello\n\nWorld\n\nTest");
    }

    #[test]
    fn test_pdf_parser_extensions() {
        let parser = PdfParser::new();
        assert!(parser.supports("pdf"));
        assert!(parser.supports("PDF"));
        assert!(!parser.supports("txt"));
    }

    #[test]
    fn test_garbage_pdf_is_parse_error() {
        let file = tempfile::NamedTempFile::with_suffix(".pdf").unwrap();
        std::fs::write(file.path(), b"not a pdf at all").unwrap();

        let err = PdfParser::new().parse(file.path()).unwrap_err();
        assert!(matches!(err, IngestError::ParseError { .. }));
    }
}
