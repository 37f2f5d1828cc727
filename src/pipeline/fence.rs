use regex::Regex;
use std::sync::OnceLock;

static FENCE_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Matches a fenced code block spanning the entire (trimmed) input:
/// optional language tag, one newline, body, one newline, closing fence.
fn fence_pattern() -> &'static Regex {
    FENCE_PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\A```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*)\r?\n```\z")
            .expect("fence pattern is valid")
    })
}

/// Removes a single enclosing markdown code fence, if present.
///
/// The fence must cover the whole trimmed input; fences that only partially
/// cover the text, and fences nested inside the body, are left untouched.
/// Stripping an already-stripped text is a no-op.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match fence_pattern().captures(trimmed) {
        Some(caps) => caps
            .get(1)
            .map(|body| body.as_str().trim())
            .unwrap_or(trimmed),
        None => trimmed,
    }
}
