use std::fmt;

/// The response contains no array-open delimiter at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    NoArrayDelimiter,
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExtractError::NoArrayDelimiter => {
                write!(f, "response contains no '[' array delimiter")
            }
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extracts the first complete `[...]` array embedded in `text`.
///
/// Scans from the first `[`, tracking nesting depth outside of string
/// literals. A quote toggles string context unless escaped; a backslash
/// consumes exactly one following character, so `\\` does not start a new
/// escape. When the depth returns to zero the array substring (delimiters
/// inclusive) is returned.
///
/// If the scan exhausts the text before the array closes, the substring from
/// the open delimiter to end-of-text is returned as a best-effort fallback —
/// the strict parser downstream reports the format error instead.
pub fn extract_array(text: &str) -> Result<&str, ExtractError> {
    let start = text.find('[').ok_or(ExtractError::NoArrayDelimiter)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    Ok(&text[start..])
}
