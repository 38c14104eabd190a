//! Load documents from files and directories.

use std::path::{Path, PathBuf};

use arag_core::{AppError, AppResult};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::parser::{self, ContentType};
use crate::types::Document;

/// Documents loaded from a set of paths, plus what was skipped.
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    pub documents: Vec<Document>,
    pub skipped: Vec<PathBuf>,
}

/// Load every supported document under `paths`.
///
/// Directories are walked recursively and unsupported files inside them are
/// skipped with a warning. A file named explicitly must be supported.
/// `provenance` replaces the file-name provenance; with several files it is
/// suffixed with the file name to keep chunk identities distinct.
pub fn load_documents(paths: &[PathBuf], provenance: Option<&str>) -> AppResult<LoadedDocuments> {
    let mut files = Vec::new();
    let mut loaded = LoadedDocuments::default();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if !entry_path.is_file() {
                    continue;
                }
                if ContentType::from_path(entry_path).is_some() {
                    files.push(entry_path.to_path_buf());
                } else {
                    warn!("Skipping unsupported file: {:?}", entry_path);
                    loaded.skipped.push(entry_path.to_path_buf());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(AppError::NotFound(format!("{:?} does not exist", path)));
        }
    }

    let single = files.len() == 1;
    for file in files {
        let text = parser::parse_file(&file)?;
        let provenance = document_provenance(&file, provenance, single)?;
        debug!("Loaded {:?} as '{}' ({} bytes)", file, provenance, text.len());
        loaded.documents.push(Document::new(text, provenance));
    }

    Ok(loaded)
}

fn document_provenance(path: &Path, provided: Option<&str>, single: bool) -> AppResult<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::UnsupportedDocument(format!("{:?} has no file name", path)))?;

    Ok(match provided {
        Some(name) if single => name.to_string(),
        Some(name) => format!("{}/{}", name, file_name),
        None => file_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_directory_walk_skips_unsupported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.txt", "Whales live in the ocean.");
        write(dir.path(), "nested/b.md", "# Krill\nKrill are small.");
        write(dir.path(), "image.png", "not text");

        let loaded = load_documents(&[dir.path().to_path_buf()], None).unwrap();

        let names: Vec<_> = loaded.documents.iter().map(|d| d.provenance.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.md"]);
        assert_eq!(loaded.skipped.len(), 1);
    }

    #[test]
    fn test_explicit_unsupported_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "data.csv", "a,b");

        let err = load_documents(&[path], None).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedDocument(_)));
    }

    #[test]
    fn test_provenance_override() {
        let dir = TempDir::new().unwrap();
        let single = write(dir.path(), "a.txt", "Whales.");
        let loaded = load_documents(&[single.clone()], Some("doc1")).unwrap();
        assert_eq!(loaded.documents[0].provenance, "doc1");

        let other = write(dir.path(), "b.txt", "Krill.");
        let loaded = load_documents(&[single, other], Some("notes")).unwrap();
        assert_eq!(loaded.documents[0].provenance, "notes/a.txt");
        assert_eq!(loaded.documents[1].provenance, "notes/b.txt");
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let err = load_documents(&[PathBuf::from("/no/such/path.txt")], None).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
