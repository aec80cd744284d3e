//! Office Open XML parser (`docx`, `xlsx`).
//!
//! Text is pulled straight out of the package XML: the document body for
//! Word files and the shared-string table for spreadsheets. Legacy binary
//! formats (`doc`, `xls`) are recognised but not parsed.

use super::{located_document, DocumentParser};
use crate::collector::extension_of;
use crate::error::{IngestError, IngestResult};
use lore_core::Document;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Tags that end a line of text in a Word body.
const DOCX_BREAKS: &[&str] = &["/w:p", "w:br", "w:tab"];
/// Each shared string is one spreadsheet cell value.
const XLSX_BREAKS: &[&str] = &["/si"];

pub struct OfficeParser;

impl OfficeParser {
    pub fn new() -> Self {
        Self
    }

    fn read_part(path: &Path, part: &str) -> IngestResult<String> {
        let parse_error = |message: String| IngestError::ParseError {
            path: path.to_path_buf(),
            message,
        };

        let file = File::open(path)?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| parse_error(format!("Not an OOXML package: {}", e)))?;
        let mut entry = archive
            .by_name(part)
            .map_err(|e| parse_error(format!("Missing {}: {}", part, e)))?;

        let mut xml = String::new();
        entry
            .read_to_string(&mut xml)
            .map_err(|e| parse_error(format!("Cannot read {}: {}", part, e)))?;
        Ok(xml)
    }
}

impl Default for OfficeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for OfficeParser {
    fn parse(&self, path: &Path) -> IngestResult<Document> {
        if !path.exists() {
            return Err(IngestError::FileNotFound(path.to_path_buf()));
        }

        let extension = extension_of(path);
        let (part, breaks) = match extension.as_str() {
            "docx" => ("word/document.xml", DOCX_BREAKS),
            "xlsx" => ("xl/sharedStrings.xml", XLSX_BREAKS),
            other => return Err(IngestError::UnsupportedFileType(other.to_string())),
        };

        debug!("Parsing {} part of {:?}", part, path);
        let xml = Self::read_part(path, part)?;
        Ok(located_document(path, xml_text(&xml, breaks)))
    }

    fn extensions(&self) -> &[&str] {
        &["doc", "docx", "xls", "xlsx"]
    }
}

/// Text content of an XML fragment. Tags named in `breaks` become line breaks.
fn xml_text(xml: &str, breaks: &[&str]) -> String {
    let mut out = String::with_capacity(xml.len() / 4);
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        out.push_str(&decode_entities(&rest[..start]));
        let Some(len) = rest[start..].find('>') else {
            rest = "";
            break;
        };
        let tag = rest[start + 1..start + len].trim_end_matches('/').trim();
        let name = tag.split_whitespace().next().unwrap_or("");
        if breaks.contains(&name) {
            out.push('\n');
        }
        rest = &rest[start + len + 1..];
    }
    out.push_str(&decode_entities(rest));

    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let decoded = after.find(';').and_then(|semi| {
            let entity = &after[1..semi];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, semi + 1))
        });

        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &after[consumed..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
