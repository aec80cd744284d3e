//! Cheap check for encrypted documents, run before any parser touches a file.

use crate::collector::extension_of;
use crate::pool::panic_message;
use std::fs::File;
use std::io::{self, Read};
use std::panic::{self, UnwindSafe};
use std::path::Path;
use tracing::{debug, warn};

/// Stream present in the OLE container of an encrypted office document.
const ENCRYPTION_INFO: &str = "/EncryptionInfo";

/// Whether `path` looks password protected.
///
/// Containers that cannot be opened at all count as protected, so such
/// files are skipped rather than failing in a parser.
pub fn is_password_protected(path: &Path) -> bool {
    let extension = extension_of(path);
    guarded(path, || match extension.as_str() {
        "pdf" => pdf_is_encrypted(path),
        "docx" | "xlsx" => ooxml_is_encrypted(path),
        "doc" | "xls" => ole_is_encrypted(path),
        "zip" => zip_is_encrypted(path),
        "rar" | "7z" => {
            debug!("Cannot probe {} archives, assuming unprotected: {:?}", extension, path);
            Ok(false)
        }
        _ => Ok(false),
    })
}

/// Run a container probe, treating errors and panics alike as protected.
fn guarded<F>(path: &Path, probe: F) -> bool
where
    F: FnOnce() -> io::Result<bool> + UnwindSafe,
{
    match panic::catch_unwind(probe) {
        Ok(Ok(protected)) => protected,
        Ok(Err(e)) => {
            debug!("Probe failed for {:?}, treating as protected: {}", path, e);
            true
        }
        Err(payload) => {
            warn!(
                "Probe panicked for {:?}, treating as protected: {}",
                path,
                panic_message(payload)
            );
            true
        }
    }
}

fn pdf_is_encrypted(path: &Path) -> io::Result<bool> {
    let doc = lopdf::Document::load(path).map_err(|e| io::Error::other(e.to_string()))?;
    Ok(doc.trailer.get(b"Encrypt").is_ok())
}

/// Unencrypted OOXML is a plain ZIP package; encrypted OOXML is wrapped in an
/// OLE compound file holding the encryption metadata.
fn ooxml_is_encrypted(path: &Path) -> io::Result<bool> {
    if zip::ZipArchive::new(File::open(path)?).is_ok() {
        return Ok(false);
    }
    ole_is_encrypted(path)
}

fn ole_is_encrypted(path: &Path) -> io::Result<bool> {
    let compound = cfb::open(path)?;
    Ok(compound.exists(ENCRYPTION_INFO))
}

fn zip_is_encrypted(path: &Path) -> io::Result<bool> {
    let mut archive =
        zip::ZipArchive::new(File::open(path)?).map_err(|e| io::Error::other(e.to_string()))?;
    if archive.is_empty() {
        return Ok(false);
    }
    let entry = archive
        .by_index(0)
        .map_err(|e| io::Error::other(e.to_string()))?;
    io::copy(&mut entry.take(1), &mut io::sink())?;
    Ok(false)
}
