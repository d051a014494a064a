//! File-extension based classification.
//!
//! Resource types, tool types and MIME types are pure functions of the
//! extension (case-insensitive) of a path. They are computed once, when a
//! descriptor is built, and never re-derived afterwards.

use std::path::Path;

use super::descriptor::{ResourceType, ToolType};

/// Extensions recognised as dynamically loadable native modules.
const NATIVE_EXTENSIONS: &[&str] = &["so", "dylib", "dll"];

/// Lower-cased extension of `path`, without the leading dot.
fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Classify a resource file.
///
/// Only `.sql` is singled out; everything else is a plain file resource.
pub fn resource_type(path: &Path) -> ResourceType {
    match extension(path).as_deref() {
        Some("sql") => ResourceType::Database,
        _ => ResourceType::File,
    }
}

/// Classify a tool file.
pub fn tool_type(path: &Path) -> ToolType {
    match extension(path).as_deref() {
        Some(ext) if NATIVE_EXTENSIONS.contains(&ext) => ToolType::NativePlugin,
        Some("py") => ToolType::InterpretedScript,
        _ => ToolType::Unknown,
    }
}

/// Determine the MIME type of a resource file.
///
/// A fixed table covers the common data formats; other extensions fall back
/// to the standard MIME database, and an unknown extension yields an empty
/// string.
pub fn mime_type(path: &Path) -> String {
    let Some(ext) = extension(path) else {
        return String::new();
    };

    let fixed = match ext.as_str() {
        "json" => Some("application/json"),
        "yaml" | "yml" => Some("application/x-yaml"),
        "xml" => Some("application/xml"),
        "md" => Some("text/markdown"),
        "txt" => Some("text/plain"),
        "csv" => Some("text/csv"),
        "sql" => Some("text/sql"),
        _ => None,
    };

    match fixed {
        Some(mime) => mime.to_string(),
        None => mime_guess::from_ext(&ext)
            .first_raw()
            .unwrap_or_default()
            .to_string(),
    }
}
