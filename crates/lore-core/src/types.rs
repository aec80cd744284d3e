//! Core domain types for Lore.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::UNIX_EPOCH;
use uuid::Uuid;

/// Unique identifier for segments.
pub type SegmentId = String;

/// Free-form document metadata, serialized alongside every segment.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key holding the source file name.
pub const FILE_NAME: &str = "file_name";

/// Metadata key holding the directory the source file lives in.
pub const ABSOLUTE_DIRECTORY_PATH: &str = "absolute_directory_path";

/// Generate a new unique ID.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fingerprint of a file used for change detection.
///
/// Two snapshots of the same path are equal when neither the size nor the
/// modification time moved between the two stats.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Snapshot {
    pub absolute_path: String,
    pub file_size: u64,
    pub last_modified_millis: i64,
}

impl Snapshot {
    pub fn new(absolute_path: impl Into<String>, file_size: u64, last_modified_millis: i64) -> Self {
        Self {
            absolute_path: absolute_path.into(),
            file_size,
            last_modified_millis,
        }
    }

    /// Stat `path` and capture its fingerprint. Directories are rejected.
    pub fn capture(path: &Path) -> Result<Self> {
        let absolute = std::path::absolute(path)?;
        let meta = std::fs::metadata(&absolute)?;
        if meta.is_dir() {
            return Err(Error::InvalidInput(format!(
                "{} is a directory",
                absolute.display()
            )));
        }
        let last_modified_millis = match meta.modified()?.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_millis() as i64,
            Err(e) => -(e.duration().as_millis() as i64),
        };

        Ok(Self::new(
            absolute.to_string_lossy(),
            meta.len(),
            last_modified_millis,
        ))
    }

    /// Zero fingerprint for a path that could not be stat'ed.
    ///
    /// Any later successful stat differs from it, so the file is retried.
    pub fn unreadable(path: &Path) -> Self {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        Self::new(absolute.to_string_lossy(), 0, 0)
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.absolute_path)
    }
}

/// Processing status of a single file.
///
/// Terminal states carry their own payload so a failure message can never be
/// attached to a successful record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Success {
        segments: u64,
    },
    Failed {
        message: String,
    },
    Skipped,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Success { .. } => "success",
            ProcessingStatus::Failed { .. } => "failed",
            ProcessingStatus::Skipped => "skipped",
        }
    }

    /// Whether a worker has finished with the file.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::Success { .. }
                | ProcessingStatus::Failed { .. }
                | ProcessingStatus::Skipped
        )
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted processing record for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingState {
    pub file_path: String,
    pub file_size: u64,
    pub last_modified: i64,
    #[serde(flatten)]
    pub status: ProcessingStatus,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingState {
    /// Build a fresh record for `snapshot` stamped with the current time.
    pub fn new(snapshot: &Snapshot, status: ProcessingStatus) -> Self {
        Self {
            file_path: snapshot.absolute_path.clone(),
            file_size: snapshot.file_size,
            last_modified: snapshot.last_modified_millis,
            status,
            updated_at: Utc::now(),
        }
    }

    /// Whether the recorded fingerprint still matches `snapshot`.
    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        self.file_size == snapshot.file_size && self.last_modified == snapshot.last_modified_millis
    }

    pub fn last_error(&self) -> Option<&str> {
        match &self.status {
            ProcessingStatus::Failed { message } => Some(message),
            _ => None,
        }
    }

    pub fn processed_segments(&self) -> u64 {
        match self.status {
            ProcessingStatus::Success { segments } => segments,
            _ => 0,
        }
    }
}

/// A unit of text handed to the indexing sink: a whole parsed document or a
/// streamed chunk of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn file_name(&self) -> Option<&str> {
        self.metadata.get(FILE_NAME).and_then(|v| v.as_str())
    }

    /// Length of the text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A split piece of a document, ready for embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub index: usize,
    pub text: String,
    pub metadata: Metadata,
}

impl Segment {
    pub fn new(index: usize, text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: new_id(),
            index,
            text: text.into(),
            metadata,
        }
    }
}
