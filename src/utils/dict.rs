//! Label dictionaries.
//!
//! Dictionary files hold one entry per line. Only line terminators are
//! stripped: recognition dictionaries may contain whitespace characters and
//! table dictionaries contain attribute fragments with a leading space such
//! as ` colspan="2"`.

use crate::core::{OCRError, OcrResult};
use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;

/// PubLayNet class names.
pub const DEFAULT_LAYOUT_LABELS: [&str; 5] = ["text", "title", "list", "table", "figure"];

/// Orientation classifier class names.
pub const DEFAULT_CLS_LABELS: [&str; 2] = ["0", "180"];

/// The PubTabNet structure vocabulary: plain tags, then split cell openers
/// with `colspan` and `rowspan` attributes from 2 to 20.
pub static DEFAULT_TABLE_DICT: Lazy<Vec<String>> = Lazy::new(|| {
    let tags = [
        "<thead>", "</thead>", "<tbody>", "</tbody>", "<tr>", "</tr>", "<td>", "<td", ">", "</td>",
    ];
    tags.iter()
        .map(|t| t.to_string())
        .chain((2..=20).map(|n| format!(" colspan=\"{n}\"")))
        .chain((2..=20).map(|n| format!(" rowspan=\"{n}\"")))
        .collect()
});

/// Reads a dictionary file, one entry per line.
///
/// Blank lines are kept as empty entries so that later entries keep their
/// class index.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or has no lines.
pub fn read_dict(path: &Path) -> OcrResult<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        OCRError::config_error(format!(
            "failed to read dictionary '{}': {e}",
            path.display()
        ))
    })?;

    let entries: Vec<String> = content
        .lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect();

    if entries.is_empty() {
        return Err(OCRError::config_error(format!(
            "dictionary '{}' is empty",
            path.display()
        )));
    }
    Ok(entries)
}

/// Splits a character string into single-character entries.
pub fn chars_to_dict(characters: &str) -> Vec<String> {
    characters.chars().map(String::from).collect()
}
