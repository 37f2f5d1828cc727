use serde::Serialize;

/// A single generated file, as parsed from the model's response array.
///
/// After binary decoding, exactly one of `content` and `content_binary` is
/// populated. `content_binary` is always set explicitly — `None` for text
/// records and for records whose base64 payload failed to decode — so the
/// writer only has a two-branch decision to make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Slash-separated relative path, unique within a batch.
    pub path: String,
    pub content: Option<String>,
    #[serde(skip)]
    pub content_binary: Option<Vec<u8>>,
}

impl FileRecord {
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Some(content.into()),
            content_binary: None,
        }
    }

    /// Size of the payload that would be written to disk, in bytes.
    pub fn byte_len(&self) -> usize {
        match &self.content_binary {
            Some(bytes) => bytes.len(),
            None => self.content.as_deref().map(str::len).unwrap_or(0),
        }
    }

    /// True when the record's path ends with `extension` (case-insensitive).
    pub fn has_extension(&self, extension: &str) -> bool {
        self.path.to_lowercase().ends_with(&extension.to_lowercase())
    }
}
