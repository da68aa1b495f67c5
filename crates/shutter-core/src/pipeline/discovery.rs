//! File discovery for batch ingestion from a directory.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::types::ImageKind;

/// Discovers candidate upload files in directories.
#[derive(Debug, Clone, Default)]
pub struct FileDiscovery;

/// Information about a discovered file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Format implied by the extension; used as the declared content type
    pub kind: ImageKind,
}

impl DiscoveredFile {
    /// Content type a browser would declare for this file.
    pub fn content_type(&self) -> &'static str {
        self.kind.mime_type()
    }

    /// Bare filename, sent along as the client filename.
    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self
    }

    /// Discover all JPEG, PNG, and GIF files at a path.
    ///
    /// If path is a file, returns it if supported.
    /// If path is a directory, recursively finds all supported files.
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredFile> {
        if path.is_file() {
            return Self::describe(path)
                .and_then(|kind| {
                    std::fs::metadata(path).ok().map(|meta| DiscoveredFile {
                        path: path.to_path_buf(),
                        size: meta.len(),
                        kind,
                    })
                })
                .into_iter()
                .collect();
        }

        let mut files: Vec<DiscoveredFile> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|entry| {
                let kind = Self::describe(entry.path())?;
                let meta = entry.metadata().ok()?;
                Some(DiscoveredFile {
                    path: entry.path().to_path_buf(),
                    size: meta.len(),
                    kind,
                })
            })
            .collect();

        // Sort by path for deterministic ordering
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    fn describe(path: &Path) -> Option<ImageKind> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageKind::from_extension)
    }
}
