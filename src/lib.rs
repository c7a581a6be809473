//! # treefilter: incremental search and filtering for file-tree browsers
//!
//! The engine behind an interactive tree view's filter prompt: filename
//! filtering (Files mode) and streaming content search (Content mode) across
//! one or more workspace roots, without blocking the UI thread.
//!
//! ## Library usage
//!
//! The entry point is [`session::FilterModeController`]. The caller forwards
//! prompt edits and navigation keys to it, calls
//! [`poll_updates`](session::FilterModeController::poll_updates) once per UI
//! tick, and redraws when told something changed.
//!
//! Lower layers are public for embedding and benchmarking: [`search`] (per-root
//! backends, multi-root merge, cache, worker), [`tree`] (entry building and
//! selection reconciliation) and [`fuzzy`] (Files mode matching).

use std::path::{Path, PathBuf};

pub mod config;
pub mod error;
pub mod fuzzy;
pub mod search;
pub mod session;
pub mod tree;

pub use config::{EngineConfig, SearchBackend};
pub use error::FilterError;
pub use session::{FilterHost, FilterMode, FilterModeController};

// ─── Path helpers ───────────────────────────────────────────────────

/// Canonicalize a path, falling back to the input when it cannot be
/// resolved (missing path, permission error).
#[must_use]
pub fn resolve_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .map(|p| clean_path(&p))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Strip the `\\?\` extended-length prefix that Windows canonicalize adds.
fn clean_path(path: &Path) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_prefix(r"\\?\")) {
        Some(stripped) => PathBuf::from(stripped),
        None => path.to_path_buf(),
    }
}

/// Read a file as a String, using lossy UTF-8 conversion for non-UTF8 files.
/// Returns `(content, was_lossy)`.
pub fn read_file_lossy(path: &Path) -> std::io::Result<(String, bool)> {
    let raw = std::fs::read(path)?;
    match String::from_utf8(raw) {
        Ok(s) => Ok((s, false)),
        Err(e) => Ok((String::from_utf8_lossy(e.as_bytes()).into_owned(), true)),
    }
}

/// Root-relative display label with `/` separators.
pub fn relative_label(root: &Path, path: &Path) -> String {
    let Ok(rel) = path.strip_prefix(root) else {
        return path.to_string_lossy().into_owned();
    };
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
