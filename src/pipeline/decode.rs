use crate::data::{FileRecord, SanitizationPolicy};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Non-fatal diagnostic for a record whose base64 payload could not be
/// decoded. The record stays in the batch with `content_binary` absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeWarning {
    pub path: String,
    pub detail: String,
}

/// Decodes base64 payloads for records whose path ends with a configured
/// binary extension (case-insensitive). Whitespace is stripped before
/// decoding. On success the text payload is replaced by raw bytes; on
/// failure the record keeps its text payload and a warning is surfaced
/// instead of failing the batch.
pub fn decode_binary_records(
    records: &mut [FileRecord],
    policy: &SanitizationPolicy,
) -> Vec<DecodeWarning> {
    let mut warnings = Vec::new();

    for record in records.iter_mut() {
        let is_binary = policy
            .binary_extensions
            .iter()
            .any(|ext| record.has_extension(ext));
        if !is_binary {
            record.content_binary = None;
            continue;
        }

        let compact: String = record
            .content
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .collect();

        match STANDARD.decode(compact.as_bytes()) {
            Ok(bytes) => {
                record.content_binary = Some(bytes);
                record.content = None;
            }
            Err(e) => {
                record.content_binary = None;
                warnings.push(DecodeWarning {
                    path: record.path.clone(),
                    detail: e.to_string(),
                });
            }
        }
    }

    warnings
}
