mod decode;
mod extract;
mod fence;
mod parse;
mod sanitize;

pub use decode::{decode_binary_records, DecodeWarning};
pub use extract::{extract_array, ExtractError};
pub use fence::strip_code_fence;
pub use parse::{parse_batch, FormatError};
pub use sanitize::{sanitize_java_records, FALLBACK_CLASS_NAME};
