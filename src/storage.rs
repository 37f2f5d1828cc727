//! Batch persistence: writes generated file records under an output root.
//!
//! Writes happen in record order and abort on the first failure; files
//! already written stay on disk (no rollback).

use crate::data::FileRecord;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// A write failure is fatal for the batch and names the offending path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    UnsafePath(String),
    Io { path: String, detail: String },
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WriteError::UnsafePath(path) => {
                write!(f, "refusing to write outside the output root: '{}'", path)
            }
            WriteError::Io { path, detail } => {
                write!(f, "failed to write '{}': {}", path, detail)
            }
        }
    }
}

impl std::error::Error for WriteError {}

/// One successfully written file, echoed back in the success payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub path: String,
    pub size_bytes: usize,
}

/// Writes every record under `root`, creating parent directories and
/// overwriting existing files. Binary payloads are written as raw bytes,
/// text payloads as UTF-8.
pub fn write_batch(root: &Path, records: &[FileRecord]) -> Result<Vec<WrittenFile>, WriteError> {
    let mut written = Vec::with_capacity(records.len());

    for record in records {
        let relative = safe_relative_path(&record.path)?;
        let target = root.join(relative);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| WriteError::Io {
                path: record.path.clone(),
                detail: e.to_string(),
            })?;
        }

        let size_bytes = match &record.content_binary {
            Some(bytes) => {
                fs::write(&target, bytes).map_err(|e| WriteError::Io {
                    path: record.path.clone(),
                    detail: e.to_string(),
                })?;
                bytes.len()
            }
            None => {
                let text = record.content.as_deref().unwrap_or_default();
                fs::write(&target, text.as_bytes()).map_err(|e| WriteError::Io {
                    path: record.path.clone(),
                    detail: e.to_string(),
                })?;
                text.len()
            }
        };

        written.push(WrittenFile {
            path: record.path.clone(),
            size_bytes,
        });
    }

    Ok(written)
}

/// Model output is untrusted: absolute paths, drive prefixes, backslashes
/// and `..` segments must not escape the output root.
fn safe_relative_path(path: &str) -> Result<PathBuf, WriteError> {
    if path.contains('\\') || path.contains(':') {
        return Err(WriteError::UnsafePath(path.to_string()));
    }

    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Err(WriteError::UnsafePath(path.to_string()));
    }
    for component in candidate.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(WriteError::UnsafePath(path.to_string())),
        }
    }

    Ok(candidate.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("plugforge_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&root);
        root
    }

    #[test]
    fn writes_text_records_under_nested_directories() {
        let root = test_root("text");
        let records = vec![FileRecord::text("a/b.txt", "hi")];

        let written = write_batch(&root, &records).unwrap();

        assert_eq!(
            written,
            vec![WrittenFile {
                path: "a/b.txt".to_string(),
                size_bytes: 2,
            }]
        );
        assert_eq!(fs::read_to_string(root.join("a/b.txt")).unwrap(), "hi");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn writes_binary_records_as_raw_bytes() {
        let root = test_root("binary");
        let mut record = FileRecord::text("icons/icon.png", "");
        record.content = None;
        record.content_binary = Some(vec![0, 1, 2, 3]);

        let written = write_batch(&root, &[record]).unwrap();

        assert_eq!(written[0].size_bytes, 4);
        assert_eq!(fs::read(root.join("icons/icon.png")).unwrap(), vec![0, 1, 2, 3]);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn overwrites_existing_files() {
        let root = test_root("overwrite");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("pom.xml"), "old").unwrap();

        write_batch(&root, &[FileRecord::text("pom.xml", "new")]).unwrap();

        assert_eq!(fs::read_to_string(root.join("pom.xml")).unwrap(), "new");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn rejects_parent_dir_segments() {
        let root = test_root("traversal");
        let records = vec![FileRecord::text("../escape.txt", "x")];

        assert_eq!(
            write_batch(&root, &records),
            Err(WriteError::UnsafePath("../escape.txt".to_string()))
        );
    }

    #[test]
    fn rejects_absolute_and_windows_style_paths() {
        assert!(safe_relative_path("/etc/passwd").is_err());
        assert!(safe_relative_path("C:\\plugin\\a.txt").is_err());
        assert!(safe_relative_path("a\\b.txt").is_err());
        assert!(safe_relative_path("GENERATED_PLUGIN/pom.xml").is_ok());
    }

    #[test]
    fn aborts_on_first_failure_and_keeps_earlier_files() {
        let root = test_root("abort");
        let records = vec![
            FileRecord::text("first.txt", "ok"),
            FileRecord::text("../bad.txt", "nope"),
            FileRecord::text("third.txt", "never"),
        ];

        let result = write_batch(&root, &records);

        assert_eq!(
            result,
            Err(WriteError::UnsafePath("../bad.txt".to_string()))
        );
        assert!(root.join("first.txt").exists());
        assert!(!root.join("third.txt").exists());

        let _ = fs::remove_dir_all(&root);
    }
}
