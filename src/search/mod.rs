//! Content search: request/result types, per-root backends, multi-root
//! fan-out, the result cache and the background worker.
//!
//! Data flows one way: a [`worker::SearchWorker`] runs a
//! [`coordinator::MultiRootCoordinator`] over a [`SearchRequest`], which calls
//! a [`RootSearcher`] once per root and merges the outcomes into one
//! [`SearchResult`]. Workers talk back to the session only through
//! [`worker::SearchEvent`]s on a channel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

pub mod cache;
pub mod cancel;
pub mod coordinator;
pub mod ripgrep;
pub mod walk;
pub mod worker;

pub use cache::{CacheKey, ResultCache};
pub use cancel::CancelToken;
pub use coordinator::MultiRootCoordinator;
pub use ripgrep::RipgrepSearcher;
pub use walk::WalkSearcher;
pub use worker::{SearchEvent, SearchPayload, SearchWorker};

/// Maximum preview length in characters, including the trailing ellipsis.
pub const PREVIEW_MAX_CHARS: usize = 220;

// ─── Core types ─────────────────────────────────────────────────────

/// One content hit. Line and column are 1-based; column is a byte offset.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ContentMatch {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub preview: String,
}

/// Matches from one root search, keyed by absolute file path.
pub type MatchesByFile = HashMap<PathBuf, Vec<ContentMatch>>;

/// What a single [`RootSearcher`] call returns.
#[derive(Clone, Debug, Default)]
pub struct RootSearchOutcome {
    pub matches_by_file: MatchesByFile,
    pub truncated: bool,
    pub error: Option<String>,
}

impl RootSearchOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Parameters for searching one workspace root.
#[derive(Clone, Copy, Debug)]
pub struct RootQuery<'a> {
    pub root: &'a Path,
    pub text: &'a str,
    pub show_hidden: bool,
    pub skip_gitignored: bool,
    pub max_matches: usize,
    pub max_files: usize,
}

/// Per-root text search backend.
///
/// Implementations block until the root is exhausted, a limit is hit, or
/// `should_cancel` returns true. Every accepted match is streamed through
/// `on_match` before it is added to the outcome.
pub trait RootSearcher: Send + Sync {
    fn search(
        &self,
        query: &RootQuery<'_>,
        on_match: &mut dyn FnMut(&ContentMatch),
        should_cancel: &dyn Fn() -> bool,
    ) -> RootSearchOutcome;
}

/// Immutable snapshot of one content query, handed to a worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    /// Workspace roots in display order.
    pub roots: Vec<PathBuf>,
    pub query: String,
    pub show_hidden: bool,
    pub skip_gitignored: bool,
    pub max_matches: usize,
    pub max_files: usize,
}

/// All matches for one file, ordered by (line, column, preview).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileMatches {
    pub path: PathBuf,
    pub matches: Vec<ContentMatch>,
}

/// Merged outcome of a content query across all roots.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub files: Vec<FileMatches>,
    pub truncated: bool,
    pub error: Option<String>,
}

impl SearchResult {
    pub fn match_count(&self) -> usize {
        self.files.iter().map(|f| f.matches.len()).sum()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn matches_for(&self, path: &Path) -> Option<&[ContentMatch]> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.matches.as_slice())
    }

    /// Build a display snapshot from streamed, not yet merged matches.
    pub fn from_partial(matches_by_file: &MatchesByFile, truncated: bool) -> Self {
        let mut paths: Vec<&PathBuf> = matches_by_file.keys().collect();
        paths.sort_by_cached_key(|p| (casefold_path_key(p), *p));
        let files = paths
            .into_iter()
            .filter_map(|path| {
                let mut matches = matches_by_file.get(path)?.clone();
                if matches.is_empty() {
                    return None;
                }
                sort_matches(&mut matches);
                Some(FileMatches { path: path.clone(), matches })
            })
            .collect();
        Self { files, truncated, error: None }
    }
}

/// The per-root backend selected in the config.
pub fn searcher_for(backend: crate::config::SearchBackend) -> Arc<dyn RootSearcher> {
    match backend {
        crate::config::SearchBackend::Ripgrep => Arc::new(RipgrepSearcher::new()),
        crate::config::SearchBackend::Walk => Arc::new(WalkSearcher::new()),
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Order matches within a file by (line, column, preview).
pub fn sort_matches(matches: &mut [ContentMatch]) {
    matches.sort_by(|a, b| {
        (a.line, a.column, a.preview.as_str()).cmp(&(b.line, b.column, b.preview.as_str()))
    });
}

/// Case-insensitive ordering key for paths.
pub fn casefold_path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// Normalize a raw line for display: strip the line terminator, expand tabs,
/// and cap the length.
pub fn preview_line(text: &str) -> String {
    let clean = text.trim_end_matches(['\r', '\n']).replace('\t', "    ");
    if clean.chars().count() <= PREVIEW_MAX_CHARS {
        return clean;
    }
    let keep = PREVIEW_MAX_CHARS.saturating_sub(3).max(1);
    let mut out: String = clean.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Smart case: a query with any uppercase character is case-sensitive.
pub fn is_case_sensitive(query: &str) -> bool {
    query.chars().any(char::is_uppercase)
}

#[cfg(test)]
pub(crate) mod search_test_utils;
