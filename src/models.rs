//! Core data models shared by the migration pipeline.
//!
//! Documents and assets flow through the phases as these types:
//! [`SourceDocument`] out of the scanner, [`AssetRecord`] out of the
//! analyzer, [`UploadOutcome`] out of the upload engine.

use serde::Serialize;
use std::path::PathBuf;

use crate::error::UploadError;
use crate::frontmatter::FrontMatter;

/// A file mentioned by a document, before it has been located on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    pub name: String,
    pub display: Option<String>,
}

impl FileReference {
    pub fn new(name: impl Into<String>, display: Option<String>) -> Self {
        Self {
            name: name.into(),
            display,
        }
    }
}

/// A Markdown document read from the vault.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub title: String,
    /// Body with the front matter removed.
    pub body: String,
    pub front_matter: FrontMatter,
    pub references: Vec<FileReference>,
}

/// A resolved, analyzed attachment ready for upload.
#[derive(Debug, Clone)]
pub struct AssetRecord {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    /// Hex-encoded SHA-256 of the file contents.
    pub hash: String,
}

impl AssetRecord {
    /// Lowercased extension including the leading dot, or empty.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default()
    }
}

/// Result of one upload attempt.
#[derive(Debug)]
pub struct UploadOutcome {
    pub path: PathBuf,
    pub result: Result<String, UploadError>,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn upload_id(&self) -> Option<&str> {
        self.result.as_deref().ok()
    }
}

/// One entry of the report's `migrated_pages` list.
#[derive(Debug, Clone, Serialize)]
pub struct MigratedPage {
    pub source_file: String,
    pub page_id: String,
    pub title: String,
    pub frontmatter: serde_json::Value,
    pub block_count: usize,
    pub missing_files: Vec<String>,
    pub partial: bool,
}
