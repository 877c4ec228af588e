//! Field validation and working-file naming.

use crate::error::{Error, Result};
use std::path::Path;

/// Sentinel written for fields that do not apply (the version-0 record).
pub const NONE_SENTINEL: &str = "none";

/// Check a value can be stored as a single whitespace-separated table field.
///
/// The `none` sentinel is refused too: a record at version 1 or later that
/// carries it in any column no longer parses.
pub fn validate_field(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_field(field, "must not be empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(Error::invalid_field(
            field,
            format!("{:?} must not contain whitespace", value),
        ));
    }
    if value == NONE_SENTINEL {
        return Err(Error::invalid_field(field, "\"none\" is reserved"));
    }
    Ok(())
}

/// Like [`validate_field`], and additionally rejects path separators and
/// `..`, so the value is safe to embed in a file name.
pub fn validate_name(field: &str, value: &str) -> Result<()> {
    validate_field(field, value)?;
    if value.contains("..") || value.contains('/') || value.contains('\\') {
        return Err(Error::invalid_field(
            field,
            format!("{:?} must not contain .. or path separators", value),
        ));
    }
    Ok(())
}

/// Build the working-file name for a version: `{template}_{version}_{tag}{ext}`,
/// where `ext` is taken from `input` (including the dot).
pub fn stored_filename(template: &str, version: u32, tag: &str, input: &Path) -> String {
    let ext = input
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{}_{}_{}{}", template, version, tag, ext)
}

/// Base name of `path` as a string, if it has a UTF-8 one.
pub fn base_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}
