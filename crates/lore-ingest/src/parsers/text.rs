//! Plain text parser, the fallback for every non-binary document.

use super::{located_document, DocumentParser};
use crate::error::{IngestError, IngestResult};
use lore_core::Document;
use std::path::Path;

/// Reads the whole file as UTF-8.
pub struct TextParser;

impl TextParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for TextParser {
    fn parse(&self, path: &Path) -> IngestResult<Document> {
        if !path.exists() {
            return Err(IngestError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| IngestError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(located_document(path, content))
    }

    fn extensions(&self) -> &[&str] {
        &["txt", "text", "md", "markdown", "csv", "json", "xml", "html", "htm", "rst", "org"]
    }
}
