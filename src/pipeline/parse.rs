use crate::data::{FileRecord, SanitizationPolicy};
use std::collections::HashSet;
use std::fmt;

/// Validation failures while turning extracted array text into a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    NotAnArray(String),
    ElementNotObject(usize),
    MissingPath(usize),
    MissingContent(String),
    DegenerateContent { path: String, occurrences: usize },
    DuplicatePath(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FormatError::NotAnArray(detail) => {
                write!(f, "response is not a JSON array of file objects: {}", detail)
            }
            FormatError::ElementNotObject(index) => {
                write!(f, "array element {} is not a file object", index)
            }
            FormatError::MissingPath(index) => {
                write!(f, "array element {} has no usable 'path' field", index)
            }
            FormatError::MissingContent(path) => {
                write!(f, "file '{}' has no 'content' field", path)
            }
            FormatError::DegenerateContent { path, occurrences } => write!(
                f,
                "file '{}' looks like runaway generation ({} elision markers)",
                path, occurrences
            ),
            FormatError::DuplicatePath(path) => {
                write!(f, "file '{}' appears more than once in the batch", path)
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// Parses extracted array text into an ordered batch of file records.
///
/// Pure validation: binary decoding and sanitization run afterwards. A
/// record whose content repeats the policy's degenerate marker more than the
/// configured limit rejects the whole batch — that many elision comments in
/// one file means the model truncated or looped rather than finishing.
pub fn parse_batch(
    text: &str,
    policy: &SanitizationPolicy,
) -> Result<Vec<FileRecord>, FormatError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| FormatError::NotAnArray(e.to_string()))?;

    let elements = value
        .as_array()
        .ok_or_else(|| FormatError::NotAnArray(format!("got {}", json_type_name(&value))))?;

    let mut records = Vec::with_capacity(elements.len());
    let mut seen_paths: HashSet<String> = HashSet::new();

    for (index, element) in elements.iter().enumerate() {
        let object = element
            .as_object()
            .ok_or(FormatError::ElementNotObject(index))?;

        let path = object
            .get("path")
            .and_then(|v| v.as_str())
            .filter(|p| !p.is_empty())
            .ok_or(FormatError::MissingPath(index))?;

        let content = object
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FormatError::MissingContent(path.to_string()))?;

        let occurrences = content.matches(policy.degenerate_marker.as_str()).count();
        if occurrences > policy.degenerate_limit {
            return Err(FormatError::DegenerateContent {
                path: path.to_string(),
                occurrences,
            });
        }

        if !seen_paths.insert(path.to_string()) {
            return Err(FormatError::DuplicatePath(path.to_string()));
        }

        records.push(FileRecord::text(path, content));
    }

    Ok(records)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
