//! Shared fixtures for search, session and controller tests.
//!
//! `FakeSearcher` is a scripted [`RootSearcher`]: each root holds a list of
//! text lines, a line matches when it contains the query (smart case), and
//! every call is counted so tests can assert cache hits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use super::{
    is_case_sensitive, preview_line, sort_matches, ContentMatch, RootQuery, RootSearchOutcome,
    RootSearcher,
};

struct FakeLine {
    relative: String,
    line: usize,
    text: String,
}

#[derive(Default)]
pub(crate) struct FakeSearcher {
    lines: HashMap<PathBuf, Vec<FakeLine>>,
    errors: HashMap<PathBuf, String>,
    panics: Vec<PathBuf>,
    gates: Mutex<HashMap<String, Receiver<()>>>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl FakeSearcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add one line of file content under `root`.
    pub(crate) fn with_line(mut self, root: &Path, relative: &str, line: usize, text: &str) -> Self {
        self.lines.entry(root.to_path_buf()).or_default().push(FakeLine {
            relative: relative.to_string(),
            line,
            text: text.to_string(),
        });
        self
    }

    /// `count` consecutive matching lines in one file.
    pub(crate) fn with_repeated(mut self, root: &Path, relative: &str, count: usize, text: &str) -> Self {
        for line in 1..=count {
            self = self.with_line(root, relative, line, text);
        }
        self
    }

    pub(crate) fn with_error(mut self, root: &Path, message: &str) -> Self {
        self.errors.insert(root.to_path_buf(), message.to_string());
        self
    }

    pub(crate) fn with_panic(mut self, root: &Path) -> Self {
        self.panics.push(root.to_path_buf());
        self
    }

    /// Block searches for `query` until the returned sender fires (or drops).
    pub(crate) fn gate(&self, query: &str) -> Sender<()> {
        let (tx, rx) = mpsc::channel();
        self.gates.lock().unwrap().insert(query.to_string(), rx);
        tx
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl RootSearcher for FakeSearcher {
    fn search(
        &self,
        query: &RootQuery<'_>,
        on_match: &mut dyn FnMut(&ContentMatch),
        should_cancel: &dyn Fn() -> bool,
    ) -> RootSearchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.text.to_string());

        let gate = self.gates.lock().unwrap().remove(query.text);
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        if self.panics.iter().any(|p| p == query.root) {
            panic!("scripted failure in {}", query.root.display());
        }
        if let Some(message) = self.errors.get(query.root) {
            return RootSearchOutcome::failed(message.clone());
        }

        let sensitive = is_case_sensitive(query.text);
        let needle = if sensitive { query.text.to_string() } else { query.text.to_lowercase() };
        let mut outcome = RootSearchOutcome::default();
        let mut total = 0usize;

        for fake in self.lines.get(query.root).map(Vec::as_slice).unwrap_or_default() {
            if should_cancel() {
                break;
            }
            let haystack = if sensitive { fake.text.clone() } else { fake.text.to_lowercase() };
            let Some(pos) = haystack.find(&needle) else { continue };
            let path = query.root.join(&fake.relative);
            if !outcome.matches_by_file.contains_key(&path)
                && outcome.matches_by_file.len() >= query.max_files
            {
                outcome.truncated = true;
                break;
            }
            let m = ContentMatch {
                path: path.clone(),
                line: fake.line,
                column: pos + 1,
                preview: preview_line(&fake.text),
            };
            on_match(&m);
            outcome.matches_by_file.entry(path).or_default().push(m);
            total += 1;
            if total >= query.max_matches {
                outcome.truncated = true;
                break;
            }
        }
        for matches in outcome.matches_by_file.values_mut() {
            sort_matches(matches);
        }
        outcome
    }
}

/// Convenience constructor for expected matches.
pub(crate) fn content_match(path: &Path, line: usize, column: usize, preview: &str) -> ContentMatch {
    ContentMatch {
        path: path.to_path_buf(),
        line,
        column,
        preview: preview.to_string(),
    }
}
