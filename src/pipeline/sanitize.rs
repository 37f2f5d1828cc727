use crate::data::{FileRecord, SanitizationPolicy};
use regex::Regex;
use std::sync::OnceLock;

/// Class name used for the replacement stub when the original declaration
/// cannot be recovered.
pub const FALLBACK_CLASS_NAME: &str = "GeneratedPlugin";

static CLASS_PATTERN: OnceLock<Regex> = OnceLock::new();
static PACKAGE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn class_pattern() -> &'static Regex {
    CLASS_PATTERN.get_or_init(|| {
        Regex::new(r"public\s+class\s+([A-Za-z_$][A-Za-z0-9_$]*)").expect("class pattern is valid")
    })
}

fn package_pattern() -> &'static Regex {
    PACKAGE_PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^\s*package\s+([A-Za-z_][A-Za-z0-9_.]*)\s*;").expect("package pattern is valid")
    })
}

/// Removes lines containing forbidden tokens from every `.java` record, and
/// replaces records that no longer form a usable class with a stub.
///
/// This is a safety net for a generative process that cannot be fully
/// trusted, not a general-purpose source sanitizer — it only guards against
/// the policy's fixed token set. Returns the paths of records that were
/// replaced by a stub.
pub fn sanitize_java_records(
    records: &mut [FileRecord],
    policy: &SanitizationPolicy,
) -> Vec<String> {
    let mut stubbed = Vec::new();

    for record in records.iter_mut() {
        if !record.has_extension(".java") {
            continue;
        }
        let Some(original) = record.content.clone() else {
            continue;
        };

        let cleaned = drop_forbidden_lines(&original, &policy.forbidden_tokens);

        if passes_structural_check(&cleaned) {
            record.content = Some(cleaned);
        } else {
            record.content = Some(stub_for(&original));
            stubbed.push(record.path.clone());
        }
    }

    stubbed
}

/// Drops every line containing any forbidden token as a literal substring.
/// The content is returned unchanged when nothing matched.
fn drop_forbidden_lines(content: &str, forbidden_tokens: &[String]) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut removed = false;

    for line in content.lines() {
        if forbidden_tokens
            .iter()
            .any(|token| line.contains(token.as_str()))
        {
            removed = true;
        } else {
            kept.push(line);
        }
    }

    if removed {
        kept.join("\n")
    } else {
        content.to_string()
    }
}

/// A cleaned record must still contain a `public class <Name>` header, braces,
/// and — ignoring comments and whitespace — more than an empty class body.
fn passes_structural_check(content: &str) -> bool {
    let Some(name) = declared_class_name(content) else {
        return false;
    };
    if !content.contains('{') || !content.contains('}') {
        return false;
    }

    let stripped = strip_comments_and_whitespace(content);
    let skeleton_prefix = format!("publicclass{}{{", name);
    match stripped.find(&skeleton_prefix) {
        // Only the closing brace after the prefix means the class body is
        // empty: everything of substance was removed.
        Some(position) => &stripped[position + skeleton_prefix.len()..] != "}",
        // Extends/implements clauses interrupt the skeleton prefix, so the
        // minimal-skeleton failure cannot apply.
        None => true,
    }
}

fn declared_class_name(content: &str) -> Option<String> {
    class_pattern()
        .captures(content)
        .map(|caps| caps[1].to_string())
}

fn declared_package(content: &str) -> Option<String> {
    package_pattern()
        .captures(content)
        .map(|caps| caps[1].to_string())
}

/// Builds the replacement stub: the original package declaration (if any)
/// and an empty class under the original name, with a marker comment in
/// place of the removed behavior.
fn stub_for(original: &str) -> String {
    let name = declared_class_name(original)
        .unwrap_or_else(|| FALLBACK_CLASS_NAME.to_string());

    let mut stub = String::new();
    if let Some(package) = declared_package(original) {
        stub.push_str(&format!("package {};\n\n", package));
    }
    stub.push_str(&format!(
        "public class {} {{\n    // The requested behavior could not be generated with the permitted libraries.\n}}\n",
        name
    ));
    stub
}

/// Strips `//` line comments, `/* */` block comments and all whitespace.
fn strip_comments_and_whitespace(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
            }
            c if c.is_whitespace() => {}
            c => out.push(c),
        }
    }

    out
}
