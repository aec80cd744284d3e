//! Whole-document parsers, selected by file extension.

mod office;
mod pdf;
mod text;

pub use office::OfficeParser;
pub use pdf::PdfParser;
pub use text::TextParser;

use crate::collector::extension_of;
use crate::error::IngestResult;
use lore_core::{Document, ABSOLUTE_DIRECTORY_PATH, FILE_NAME};
use std::path::Path;

/// Trait for document parsers.
pub trait DocumentParser: Send + Sync {
    /// Parse the file at `path` into a single document.
    fn parse(&self, path: &Path) -> IngestResult<Document>;

    /// Extensions this parser handles, lowercase.
    fn extensions(&self) -> &[&str];

    fn supports(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

/// Pick the parser for `path`: PDF, office, or plain text for everything else.
pub fn parser_for(path: &Path) -> Box<dyn DocumentParser> {
    let extension = extension_of(path);

    let pdf = PdfParser::new();
    if pdf.supports(&extension) {
        return Box::new(pdf);
    }

    let office = OfficeParser::new();
    if office.supports(&extension) {
        return Box::new(office);
    }

    Box::new(TextParser::new())
}

/// Parse a file based on its extension.
pub fn parse_file(path: &Path) -> IngestResult<Document> {
    parser_for(path).parse(path)
}

/// Wrap extracted text with the location metadata every parser attaches.
pub(crate) fn located_document(path: &Path, text: String) -> Document {
    let mut doc = Document::new(text);
    if let Some(name) = path.file_name() {
        doc = doc.with_metadata(FILE_NAME, name.to_string_lossy().into_owned());
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    if let Some(dir) = absolute.parent() {
        doc = doc.with_metadata(ABSOLUTE_DIRECTORY_PATH, dir.to_string_lossy().into_owned());
    }
    doc
}
