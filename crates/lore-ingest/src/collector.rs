//! Candidate discovery: walk the documents root and keep files worth parsing.

use crate::error::{IngestError, IngestResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extensions that never carry indexable text.
const NON_DOCUMENT_EXTENSIONS: &[&str] = &[
    // Video
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "3gp", "3g2", "mpg", "mpeg", "m2v",
    "svi", "vob", "rm", "rmvb",
    // Image
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif", "svg", "ico", "raw", "arw", "cr2",
    "nrw", "k25", "dib", "heif", "heic", "ind", "indd", "indt", "jp2", "j2k", "jpf", "jpx", "jpm",
    "mj2", "svgz", "ai", "eps",
    // Archive
    "zip", "rar", "7z", "tar", "gz", "bz2", "xz", "tgz", "tbz2", "txz", "iso", "dmg", "jar", "war",
    "ear",
    // Executable
    "exe", "msi", "bat", "cmd", "sh", "bin", "app", "deb", "rpm",
    // Database
    "db", "sqlite", "mdb", "accdb", "dbf",
    // Log
    "log",
];

/// Formats that must go through a whole-document parser.
const BINARY_DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx"];

/// Lowercased extension of `path`, or an empty string.
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// True unless the extension belongs to a video, image, archive, executable,
/// database or log file.
pub fn filter_non_document_files(path: &Path) -> bool {
    let extension = extension_of(path);
    !NON_DOCUMENT_EXTENSIONS.contains(&extension.as_str())
}

/// PDF and office documents; these are never streamed.
pub fn is_binary_document(path: &Path) -> bool {
    let extension = extension_of(path);
    BINARY_DOCUMENT_EXTENSIONS.contains(&extension.as_str())
}

#[cfg(windows)]
fn is_hidden(path: &Path) -> std::io::Result<bool> {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    let meta = std::fs::metadata(path)?;
    Ok(meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
}

#[cfg(not(windows))]
fn is_hidden(path: &Path) -> std::io::Result<bool> {
    Ok(path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false))
}

/// Settings that decide which files are candidates.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub include_hidden: bool,
    pub state_file_name: String,
}

impl CollectorConfig {
    pub fn from_config(config: &lore_config::Config) -> Self {
        Self {
            include_hidden: config.ingest.include_hidden,
            state_file_name: config.state.file_name.clone(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            include_hidden: false,
            state_file_name: lore_config::DEFAULT_STATE_FILE_NAME.to_string(),
        }
    }
}

/// Walks a root directory and yields candidate files.
#[derive(Debug, Clone)]
pub struct PathCollector {
    config: CollectorConfig,
}

impl PathCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// Recursively collect candidate files under `root`, sorted by path.
    ///
    /// Fails only when the root itself cannot be read. Unreadable entries
    /// below it are logged and skipped.
    pub fn collect(&self, root: &Path) -> IngestResult<Vec<PathBuf>> {
        std::fs::read_dir(root).map_err(|source| IngestError::Enumeration {
            path: root.to_path_buf(),
            source,
        })?;

        let include_hidden = self.config.include_hidden;
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |e| {
                // Prune hidden directories; the root is always walked.
                include_hidden
                    || e.depth() == 0
                    || !e.file_type().is_dir()
                    || !is_hidden(e.path()).unwrap_or(false)
            });

        let mut candidates = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if self.accepts(path) {
                candidates.push(path.to_path_buf());
            } else {
                debug!("Filtered out: {:?}", path);
            }
        }

        candidates.sort();
        info!("Found {} candidate documents under {:?}", candidates.len(), root);
        Ok(candidates)
    }

    pub(crate) fn accepts(&self, path: &Path) -> bool {
        self.filter_hidden_file(path)
            && self.filter_state_file(path)
            && filter_non_document_files(path)
    }

    /// False for hidden files unless hidden files are included. A file whose
    /// hidden status cannot be determined is kept.
    pub fn filter_hidden_file(&self, path: &Path) -> bool {
        if self.config.include_hidden {
            return true;
        }
        match is_hidden(path) {
            Ok(hidden) => !hidden,
            Err(e) => {
                debug!("Cannot determine hidden status of {:?}, keeping it: {}", path, e);
                true
            }
        }
    }

    /// False for the state file and its in-flight temp copies.
    pub fn filter_state_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return true;
        };
        let state_name = self.config.state_file_name.as_str();
        !(name == state_name || name.starts_with(&format!("{}.", state_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, "content").unwrap();
    }

    #[test]
    fn test_filter_non_document_files() {
        assert!(!filter_non_document_files(Path::new("movie.mp4")));
        assert!(!filter_non_document_files(Path::new("photo.jpg")));
        assert!(!filter_non_document_files(Path::new("archive.zip")));
        assert!(!filter_non_document_files(Path::new("program.exe")));
        assert!(!filter_non_document_files(Path::new("server.LOG")));

        assert!(filter_non_document_files(Path::new("document.txt")));
        assert!(filter_non_document_files(Path::new("readme.md")));
        assert!(filter_non_document_files(Path::new("paper.pdf")));
        assert!(filter_non_document_files(Path::new("Makefile")));
    }

    #[test]
    fn test_binary_document_classification() {
        assert!(is_binary_document(Path::new("a.pdf")));
        assert!(is_binary_document(Path::new("a.DOCX")));
        assert!(is_binary_document(Path::new("a.xls")));
        assert!(!is_binary_document(Path::new("a.txt")));
        assert!(!is_binary_document(Path::new("a")));
    }

    #[test]
    fn test_filter_state_file() {
        let collector = PathCollector::new(CollectorConfig::default());
        assert!(collector.filter_state_file(Path::new("/docs/test.txt")));
        assert!(!collector.filter_state_file(Path::new("/docs/.rag-processing-state.json")));
        assert!(!collector.filter_state_file(Path::new(
            "/docs/.rag-processing-state.json.a1b2.tmp"
        )));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_filter_hidden_file() {
        let collector = PathCollector::new(CollectorConfig::default());
        assert!(!collector.filter_hidden_file(Path::new("/docs/.secret.txt")));
        assert!(collector.filter_hidden_file(Path::new("/docs/visible.txt")));

        let inclusive = PathCollector::new(CollectorConfig {
            include_hidden: true,
            ..Default::default()
        });
        assert!(inclusive.filter_hidden_file(Path::new("/docs/.secret.txt")));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_collect_applies_all_filters() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a.txt"));
        touch(&root.join("nested/deeper/b.md"));
        touch(&root.join("nested/c.pdf"));
        touch(&root.join("movie.mp4"));
        touch(&root.join(".hidden.txt"));
        touch(&root.join(".git/config.txt"));
        touch(&root.join(".rag-processing-state.json"));

        let collector = PathCollector::new(CollectorConfig::default());
        let found = collector.collect(root).unwrap();
        let rel: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            rel,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("nested/c.pdf"),
                PathBuf::from("nested/deeper/b.md"),
            ]
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn test_collect_includes_hidden_when_configured() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join(".hidden.txt"));
        touch(&root.join(".notes/todo.txt"));
        touch(&root.join(".rag-processing-state.json"));

        let collector = PathCollector::new(CollectorConfig {
            include_hidden: true,
            ..Default::default()
        });
        let found = collector.collect(root).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_collect_missing_root_fails() {
        let dir = tempdir().unwrap();
        let collector = PathCollector::new(CollectorConfig::default());
        let err = collector.collect(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, IngestError::Enumeration { .. }));
    }
}
