//! Files mode: filename label index and label matching.
//!
//! Labels are root-relative paths with `/` separators. Matching is
//! synchronous and runs on the session thread; only label collection fans
//! out across roots.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tracing::debug;

use crate::search::coordinator::MAX_PARALLEL_ROOTS;
use crate::search::walk::walk_files;
use crate::relative_label;

/// Label count at which matching switches to strict substring mode.
pub const STRICT_SUBSTRING_MIN_LABELS: usize = 1_000;

/// Characters after which a fuzzy hit counts as a word boundary.
const BOUNDARY_CHARS: &[char] = &['/', '_', '-', '.', ' '];

/// One matched label: its position in the input slice and its score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabelMatch {
    pub index: usize,
    pub score: i64,
}

/// Filename matcher used by Files mode.
///
/// Returns at most `limit` matches, best first.
pub trait FuzzyMatcher: Send + Sync {
    fn match_labels(&self, query: &str, labels: &[String], limit: usize) -> Vec<LabelMatch>;
}

// ─── Scoring ────────────────────────────────────────────────────────

fn substring_score(position: usize, label_len: usize) -> i64 {
    10_000 - (position as i64) * 50 - label_len as i64
}

/// Character position of `needle` in `haystack`, both already casefolded.
fn substring_position(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .find(needle)
        .map(|byte| haystack[..byte].chars().count())
}

/// Subsequence score: consecutive runs and word boundaries earn points,
/// gaps and long candidates cost points. `None` when `query` is not a
/// subsequence of `candidate`.
pub fn fuzzy_score(query: &str, candidate: &str) -> Option<i64> {
    if query.is_empty() {
        return Some(0);
    }
    let folded: Vec<char> = candidate.to_lowercase().chars().collect();
    let mut score: i64 = 0;
    let mut prev: Option<usize> = None;
    let mut run: i64 = 0;

    for needle in query.to_lowercase().chars() {
        let from = prev.map_or(0, |p| p + 1);
        let offset = folded.get(from..)?.iter().position(|&c| c == needle)?;
        let idx = from + offset;
        if offset == 0 {
            run += 1;
            score += 20 + (run * 4).min(16);
        } else {
            run = 0;
            score -= (offset as i64 * 2).min(40);
        }
        if idx == 0 || BOUNDARY_CHARS.contains(&folded[idx - 1]) {
            score += 35;
        }
        prev = Some(idx);
    }
    Some(score - folded.len() as i64 / 5)
}

// ─── LabelMatcher ───────────────────────────────────────────────────

/// Default [`FuzzyMatcher`].
///
/// Substring hits rank by (position, length, label). When no label contains
/// the query, subsequence scoring takes over. Large label sets stay in
/// strict substring mode, keep index order and stop after `limit` hits.
#[derive(Clone, Debug)]
pub struct LabelMatcher {
    strict_substring_min_labels: usize,
}

impl Default for LabelMatcher {
    fn default() -> Self {
        Self {
            strict_substring_min_labels: STRICT_SUBSTRING_MIN_LABELS,
        }
    }
}

impl LabelMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_threshold(mut self, labels: usize) -> Self {
        self.strict_substring_min_labels = labels;
        self
    }

    fn strict(&self, needle: &str, labels: &[String], limit: usize) -> Vec<LabelMatch> {
        let mut out = Vec::new();
        for (index, label) in labels.iter().enumerate() {
            let Some(pos) = substring_position(&label.to_lowercase(), needle) else { continue };
            out.push(LabelMatch {
                index,
                score: substring_score(pos, label.chars().count()),
            });
            if out.len() >= limit {
                break;
            }
        }
        out
    }
}

impl FuzzyMatcher for LabelMatcher {
    fn match_labels(&self, query: &str, labels: &[String], limit: usize) -> Vec<LabelMatch> {
        let limit = limit.max(1);
        let needle = query.to_lowercase();
        if labels.len() >= self.strict_substring_min_labels {
            return self.strict(&needle, labels, limit);
        }

        let mut substring: Vec<(usize, usize, &str, usize)> = labels
            .iter()
            .enumerate()
            .filter_map(|(index, label)| {
                let pos = substring_position(&label.to_lowercase(), &needle)?;
                Some((pos, label.chars().count(), label.as_str(), index))
            })
            .collect();
        if !substring.is_empty() {
            substring.sort();
            return substring
                .into_iter()
                .take(limit)
                .map(|(pos, len, _, index)| LabelMatch {
                    index,
                    score: substring_score(pos, len),
                })
                .collect();
        }

        let mut scored: Vec<(i64, usize, &str, usize)> = labels
            .iter()
            .enumerate()
            .filter_map(|(index, label)| {
                let score = fuzzy_score(query, label)?;
                Some((score, label.chars().count(), label.as_str(), index))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(b.2)));
        scored
            .into_iter()
            .take(limit)
            .map(|(score, _, _, index)| LabelMatch { index, score })
            .collect()
    }
}

// ─── Label collection ───────────────────────────────────────────────

/// Root-relative labels of every visible file under `root`, in
/// case-insensitive order.
pub fn collect_file_labels(root: &Path, show_hidden: bool, skip_gitignored: bool) -> Vec<String> {
    let mut labels: Vec<String> = walk_files(root, show_hidden, skip_gitignored)
        .iter()
        .map(|path| relative_label(root, path))
        .collect();
    labels.sort_by_cached_key(|label| label.to_lowercase());
    labels
}

/// Labels for each root, collected on up to eight threads. The outer vector
/// follows `roots` order.
pub fn collect_workspace_labels(roots: &[PathBuf], show_hidden: bool, skip_gitignored: bool) -> Vec<Vec<String>> {
    if roots.len() <= 1 {
        return roots
            .iter()
            .map(|root| collect_file_labels(root, show_hidden, skip_gitignored))
            .collect();
    }

    let workers = MAX_PARALLEL_ROOTS.min(roots.len());
    let next = AtomicUsize::new(0);
    let slots: Mutex<Vec<Vec<String>>> = Mutex::new(vec![Vec::new(); roots.len()]);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let idx = next.fetch_add(1, Ordering::Relaxed);
                if idx >= roots.len() {
                    break;
                }
                let labels = collect_file_labels(&roots[idx], show_hidden, skip_gitignored);
                let mut slots = match slots.lock() {
                    Ok(slots) => slots,
                    Err(poisoned) => poisoned.into_inner(),
                };
                slots[idx] = labels;
            });
        }
    });

    match slots.into_inner() {
        Ok(slots) => slots,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ─── FileLabelIndex ─────────────────────────────────────────────────

/// Flattened labels of all workspace sections. Rebuilt only when the roots
/// or the hidden switch change.
#[derive(Clone, Debug, Default)]
pub struct FileLabelIndex {
    roots_signature: Vec<PathBuf>,
    show_hidden: bool,
    labels: Vec<String>,
    paths: Vec<PathBuf>,
    sections: Vec<usize>,
}

impl FileLabelIndex {
    pub fn build(roots: &[PathBuf], show_hidden: bool) -> Self {
        let start = Instant::now();
        let skip_gitignored = crate::config::skip_gitignored_for_hidden_mode(show_hidden);
        let per_root = collect_workspace_labels(roots, show_hidden, skip_gitignored);

        let mut index = Self {
            roots_signature: roots.to_vec(),
            show_hidden,
            ..Self::default()
        };
        for (section, (root, labels)) in roots.iter().zip(per_root).enumerate() {
            for label in labels {
                index.paths.push(root.join(&label));
                index.sections.push(section);
                index.labels.push(label);
            }
        }
        debug!(
            roots = roots.len(),
            labels = index.labels.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "built file label index"
        );
        index
    }

    pub fn is_current(&self, roots: &[PathBuf], show_hidden: bool) -> bool {
        self.roots_signature == roots && self.show_hidden == show_hidden
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Group matched label indices into absolute paths per section.
    pub fn paths_by_section(&self, matches: &[LabelMatch]) -> HashMap<usize, Vec<PathBuf>> {
        let mut by_section: HashMap<usize, Vec<PathBuf>> = HashMap::new();
        for m in matches {
            let (Some(path), Some(section)) = (self.paths.get(m.index), self.sections.get(m.index)) else {
                continue;
            };
            by_section.entry(*section).or_default().push(path.clone());
        }
        by_section
    }
}

/// Outcome of one Files-mode query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileFilterResult {
    pub paths_by_section: HashMap<usize, Vec<PathBuf>>,
    pub match_count: usize,
    pub truncated: bool,
}

/// Run `query` against the index with the adaptive result cap. One extra
/// match is requested so truncation is detected without a second pass.
pub fn filter_files(matcher: &dyn FuzzyMatcher, index: &FileLabelIndex, query: &str) -> FileFilterResult {
    let limit = index.len().min(crate::config::file_filter_match_limit(query));
    if limit == 0 {
        return FileFilterResult::default();
    }
    let mut matched = matcher.match_labels(query, index.labels(), limit + 1);
    let truncated = matched.len() > limit;
    matched.truncate(limit);
    let paths_by_section = index.paths_by_section(&matched);
    FileFilterResult {
        match_count: paths_by_section.values().map(Vec::len).sum(),
        paths_by_section,
        truncated,
    }
}
