//! Receipt document discovery in an unpacked archive
//!
//! Walks the scratch directory and returns every `.pdf` file
//! (case-insensitive) in sorted path order. Archiver noise such as
//! `__MACOSX/` resource forks, `.DS_Store` and `Thumbs.db` is skipped.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Document scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Directory walk failed below the root
    #[error("Walk error under {0}: {1}")]
    Walk(PathBuf, String),
}

/// Document scanner
pub struct DocumentScanner {
    ignore_names: Vec<String>,
}

impl DocumentScanner {
    /// Create new scanner with default ignore names
    pub fn new() -> Self {
        Self {
            ignore_names: vec![
                "__MACOSX".to_string(),
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
            ],
        }
    }

    /// Scan `root` for documents, sorted by path
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root.exists() {
            return Err(ScanError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut documents = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_ignored(e));

        for entry in walker {
            let entry = entry.map_err(|e| ScanError::Walk(root.to_path_buf(), e.to_string()))?;
            if entry.file_type().is_file() && is_document(entry.path()) {
                documents.push(entry.into_path());
            } else if entry.file_type().is_file() {
                tracing::debug!(file = %entry.path().display(), "Skipping non-document entry");
            }
        }

        documents.sort();
        Ok(documents)
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        // AppleDouble companions ("._name.pdf") are not documents
        name.starts_with("._") || self.ignore_names.iter().any(|ignored| *ignored == name)
    }
}

impl Default for DocumentScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `path` has a `.pdf` extension, any case
pub fn is_document(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_scanner_creation() {
        let scanner = DocumentScanner::new();
        assert!(scanner.ignore_names.contains(&"__MACOSX".to_string()));
    }

    #[test]
    fn test_is_document() {
        assert!(is_document(Path::new("a.pdf")));
        assert!(is_document(Path::new("dir/B.PDF")));
        assert!(!is_document(Path::new("notes.txt")));
        assert!(!is_document(Path::new("pdf")));
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "z.pdf");
        touch(dir.path(), "a/b.PDF");
        touch(dir.path(), "readme.txt");
        touch(dir.path(), "__MACOSX/a/._b.PDF");
        touch(dir.path(), "._z.pdf");
        touch(dir.path(), ".DS_Store");

        let found = DocumentScanner::new().scan(dir.path()).unwrap();
        let relative: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(relative, vec![PathBuf::from("a/b.PDF"), PathBuf::from("z.pdf")]);
    }

    #[test]
    fn test_scan_missing_root() {
        let result = DocumentScanner::new().scan(Path::new("/nonexistent/scratch"));
        assert!(matches!(result, Err(ScanError::PathNotFound(_))));
    }

    #[test]
    fn test_scan_file_root() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.pdf");
        let result = DocumentScanner::new().scan(&dir.path().join("a.pdf"));
        assert!(matches!(result, Err(ScanError::NotADirectory(_))));
    }
}
