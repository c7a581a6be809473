//! Multi-root fan-out: one search task per workspace root, bounded
//! parallelism, global dedupe and global limits.
//!
//! The single-root path runs on the calling thread but goes through the same
//! streaming filter and merge, so callers cannot tell the two apart.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::FilterError;
use crate::resolve_path;

use super::cancel::CancelToken;
use super::{
    casefold_path_key, sort_matches, ContentMatch, FileMatches, RootQuery, RootSearchOutcome,
    RootSearcher, SearchRequest, SearchResult,
};

/// Hard ceiling on concurrent per-root searches.
pub const MAX_PARALLEL_ROOTS: usize = 8;

/// Identity of one hit across overlapping roots.
type MatchKey = (PathBuf, usize, usize, String);

fn match_key(path: &Path, m: &ContentMatch) -> MatchKey {
    (path.to_path_buf(), m.line, m.column, m.preview.clone())
}

// ─── Streaming filter ───────────────────────────────────────────────

/// Shared by every per-root task of one request. Decides which streamed
/// matches are forwarded and stops all roots once a global limit is hit.
struct StreamGate<'a> {
    state: Mutex<StreamState>,
    truncated: AtomicBool,
    local_cancel: CancelToken,
    max_matches: usize,
    max_files: usize,
    on_match: &'a (dyn Fn(&ContentMatch) + Sync),
}

#[derive(Default)]
struct StreamState {
    seen_keys: HashSet<MatchKey>,
    seen_files: HashSet<PathBuf>,
    resolved: HashMap<PathBuf, PathBuf>,
    accepted: usize,
}

impl StreamGate<'_> {
    fn offer(&self, m: &ContentMatch) {
        if self.local_cancel.is_cancelled() {
            return;
        }
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let path = match state.resolved.get(&m.path) {
            Some(path) => path.clone(),
            None => {
                let path = resolve_path(&m.path);
                state.resolved.insert(m.path.clone(), path.clone());
                path
            }
        };
        let key = match_key(&path, m);
        if state.seen_keys.contains(&key) {
            return;
        }
        if state.accepted >= self.max_matches
            || (!state.seen_files.contains(&path) && state.seen_files.len() >= self.max_files)
        {
            self.stop();
            return;
        }
        state.seen_keys.insert(key);
        state.seen_files.insert(path.clone());
        state.accepted += 1;
        let reached_limit = state.accepted >= self.max_matches;

        let emitted = ContentMatch { path, ..m.clone() };
        // Forwarded under the lock so the consumer sees the accepted order
        (self.on_match)(&emitted);
        drop(state);

        if reached_limit {
            self.stop();
        }
    }

    fn stop(&self) {
        self.truncated.store(true, Ordering::Release);
        self.local_cancel.cancel();
    }
}

// ─── Coordinator ────────────────────────────────────────────────────

/// Runs a [`SearchRequest`] over all of its roots with a [`RootSearcher`].
#[derive(Clone)]
pub struct MultiRootCoordinator {
    searcher: Arc<dyn RootSearcher>,
    max_parallel: usize,
}

impl MultiRootCoordinator {
    pub fn new(searcher: Arc<dyn RootSearcher>) -> Self {
        Self {
            searcher,
            max_parallel: MAX_PARALLEL_ROOTS,
        }
    }

    /// Lower the parallelism bound. Values are clamped to `1..=8`.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.clamp(1, MAX_PARALLEL_ROOTS);
        self
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Search every root, streaming accepted matches through `on_match`, and
    /// return the merged result. Blocks until all roots finish or stop.
    ///
    /// Returns an empty result when `cancel` fires; callers discard
    /// cancelled output by generation anyway.
    pub fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancelToken,
        on_match: &(dyn Fn(&ContentMatch) + Sync),
    ) -> SearchResult {
        let roots: Vec<PathBuf> = request.roots.iter().map(|r| resolve_path(r)).collect();
        if roots.is_empty() || request.query.is_empty() {
            return SearchResult::default();
        }
        let start = Instant::now();
        let max_matches = request.max_matches.max(1);
        let max_files = request.max_files.max(1);

        let gate = StreamGate {
            state: Mutex::new(StreamState::default()),
            truncated: AtomicBool::new(false),
            local_cancel: cancel.child(),
            max_matches,
            max_files,
            on_match,
        };

        let outcomes: Vec<RootSearchOutcome> = if roots.len() == 1 {
            vec![self.search_one_root(&roots[0], request, &gate)]
        } else {
            self.search_parallel(&roots, request, &gate)
        };

        let result = merge_root_results(
            &roots,
            &outcomes,
            max_matches,
            max_files,
            gate.truncated.load(Ordering::Acquire),
        );
        debug!(
            roots = roots.len(),
            query = %request.query,
            matches = result.match_count(),
            files = result.file_count(),
            truncated = result.truncated,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "multi-root search finished"
        );
        result
    }

    fn search_parallel(
        &self,
        roots: &[PathBuf],
        request: &SearchRequest,
        gate: &StreamGate<'_>,
    ) -> Vec<RootSearchOutcome> {
        let workers = self.max_parallel.min(roots.len());
        let next = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<RootSearchOutcome>>> = Mutex::new(vec![None; roots.len()]);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        if idx >= roots.len() {
                            break;
                        }
                        let outcome = self.search_one_root(&roots[idx], request, gate);
                        let mut slots = match slots.lock() {
                            Ok(slots) => slots,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        slots[idx] = Some(outcome);
                    }
                });
            }
        });

        let slots = match slots.into_inner() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.into_iter().map(Option::unwrap_or_default).collect()
    }

    fn search_one_root(
        &self,
        root: &Path,
        request: &SearchRequest,
        gate: &StreamGate<'_>,
    ) -> RootSearchOutcome {
        if gate.local_cancel.is_cancelled() {
            return RootSearchOutcome::default();
        }
        let query = RootQuery {
            root,
            text: &request.query,
            show_hidden: request.show_hidden,
            skip_gitignored: request.skip_gitignored,
            max_matches: gate.max_matches,
            max_files: gate.max_files,
        };
        let should_cancel = || gate.local_cancel.is_cancelled();
        let mut forward = |m: &ContentMatch| gate.offer(m);

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.searcher.search(&query, &mut forward, &should_cancel)
        }));
        match outcome {
            Ok(outcome) => {
                if let Some(error) = &outcome.error {
                    debug!(root = %root.display(), error = %error, "root search reported an error");
                }
                outcome
            }
            Err(payload) => {
                let message = FilterError::from_panic(payload.as_ref()).to_string();
                warn!(root = %root.display(), error = %message, "root search panicked");
                RootSearchOutcome::failed(message)
            }
        }
    }
}

// ─── Merge ──────────────────────────────────────────────────────────

/// Merge per-root outcomes into one result.
///
/// Roots are visited in order and files within a root in case-insensitive
/// path order. Duplicate (resolved path, line, column, preview) hits count
/// once. The first root error is reported only when nothing matched.
pub fn merge_root_results(
    roots: &[PathBuf],
    outcomes: &[RootSearchOutcome],
    max_matches: usize,
    max_files: usize,
    stream_truncated: bool,
) -> SearchResult {
    let mut merged: HashMap<PathBuf, Vec<ContentMatch>> = HashMap::new();
    let mut seen: HashSet<MatchKey> = HashSet::new();
    let mut total = 0usize;
    let mut truncated = stream_truncated;
    let mut first_error: Option<String> = None;

    'roots: for (idx, outcome) in outcomes.iter().enumerate() {
        if let Some(error) = &outcome.error {
            if first_error.is_none() {
                first_error = Some(match roots.get(idx) {
                    Some(root) => FilterError::SearchFailed {
                        root: root.display().to_string(),
                        message: error.clone(),
                    }
                    .to_string(),
                    None => error.clone(),
                });
            }
        }
        truncated |= outcome.truncated;

        let mut paths: Vec<&PathBuf> = outcome.matches_by_file.keys().collect();
        paths.sort_by_cached_key(|p| (casefold_path_key(p), (*p).clone()));
        for path in paths {
            let resolved = resolve_path(path);
            for m in &outcome.matches_by_file[path] {
                let key = match_key(&resolved, m);
                if seen.contains(&key) {
                    continue;
                }
                if total >= max_matches {
                    truncated = true;
                    break 'roots;
                }
                if !merged.contains_key(&resolved) && merged.len() >= max_files {
                    truncated = true;
                    break 'roots;
                }
                seen.insert(key);
                merged.entry(resolved.clone()).or_default().push(ContentMatch {
                    path: resolved.clone(),
                    ..m.clone()
                });
                total += 1;
            }
        }
    }

    if merged.is_empty() {
        return SearchResult {
            files: Vec::new(),
            truncated,
            error: first_error,
        };
    }

    let mut files: Vec<FileMatches> = merged
        .into_iter()
        .map(|(path, mut matches)| {
            sort_matches(&mut matches);
            FileMatches { path, matches }
        })
        .collect();
    files.sort_by_cached_key(|f| (casefold_path_key(&f.path), f.path.clone()));
    SearchResult {
        files,
        truncated,
        error: None,
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
