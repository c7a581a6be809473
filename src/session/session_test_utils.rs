//! Fixtures for controller tests: a recording host, a call-counting
//! searcher wrapper and a helper that polls until a search settles.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::search::{ContentMatch, RootQuery, RootSearchOutcome, RootSearcher};
use crate::tree::DisplayEntry;

use super::{FilterHost, FilterModeController, ViewLocation};

/// Host that records every callback. Previewing an entry moves the viewer
/// to that file, as a real source pane would.
#[derive(Debug, Default)]
pub(crate) struct RecordingHost {
    pub location: ViewLocation,
    pub previews: Vec<(PathBuf, Option<usize>)>,
    pub opened: Vec<(PathBuf, Option<usize>)>,
    pub restored: Vec<ViewLocation>,
    pub changes: usize,
}

impl RecordingHost {
    pub(crate) fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            location: ViewLocation::at(path),
            ..Self::default()
        }
    }
}

impl FilterHost for RecordingHost {
    fn current_location(&self) -> ViewLocation {
        self.location.clone()
    }

    fn restore_location(&mut self, location: &ViewLocation) {
        self.location = location.clone();
        self.restored.push(location.clone());
    }

    fn preview_entry(&mut self, entry: &DisplayEntry) {
        if !entry.is_dir {
            self.location = ViewLocation {
                path: entry.path.clone(),
                start_line: entry.line.map_or(0, |l| l.saturating_sub(1)),
                text_x: 0,
            };
        }
        self.previews.push((entry.path.clone(), entry.line));
    }

    fn open_path(&mut self, path: &Path, line: Option<usize>) {
        self.location = ViewLocation::at(path);
        self.opened.push((path.to_path_buf(), line));
    }

    fn on_change(&mut self) {
        self.changes += 1;
    }
}

/// Wraps a real backend and counts root searches.
pub(crate) struct CountingSearcher<S> {
    inner: S,
    calls: AtomicUsize,
}

impl<S: RootSearcher> CountingSearcher<S> {
    pub(crate) fn new(inner: S) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<S: RootSearcher> RootSearcher for CountingSearcher<S> {
    fn search(
        &self,
        query: &RootQuery<'_>,
        on_match: &mut dyn FnMut(&ContentMatch),
        should_cancel: &dyn Fn() -> bool,
    ) -> RootSearchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.search(query, on_match, should_cancel)
    }
}

/// Poll until no search is running (at most five seconds).
pub(crate) fn settle<H: FilterHost>(controller: &mut FilterModeController<H>) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while controller.loading() && Instant::now() < deadline {
        controller.poll_updates(Duration::from_millis(20));
    }
    assert!(!controller.loading(), "search did not finish in time");
}

/// Spin until `cond` holds (at most five seconds).
pub(crate) fn wait_for(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(cond(), "condition not reached in time");
}

/// Compact view of entries: `path` for rows, `path:line` for hits.
pub(crate) fn labels(entries: &[DisplayEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| match e.line {
            Some(line) if e.is_hit() => format!("{}:{}", e.path.display(), line),
            _ => e.path.display().to_string(),
        })
        .collect()
}
