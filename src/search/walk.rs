//! In-process content search over a gitignore-aware directory walk.
//!
//! Used when `rg` is not available or when a self-contained backend is
//! wanted (tests, sandboxes). Semantics follow the ripgrep backend:
//! smart-case fixed-string matching, one hit per line at the first
//! occurrence, the same per-root limits.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::{read_file_lossy, resolve_path};

use super::{
    is_case_sensitive, preview_line, ContentMatch, RootQuery, RootSearchOutcome, RootSearcher,
};

/// Bytes inspected for a NUL when deciding whether a file is binary.
const BINARY_SNIFF_BYTES: usize = 8 * 1024;

#[derive(Clone, Debug, Default)]
pub struct WalkSearcher;

impl WalkSearcher {
    pub fn new() -> Self {
        Self
    }
}

fn build_matcher(query: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(!is_case_sensitive(query))
        .build()
}

/// Sorted list of candidate files under `root`, honoring the hidden and
/// gitignore switches.
pub(crate) fn walk_files(root: &Path, show_hidden: bool, skip_gitignored: bool) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(root);
    builder.hidden(!show_hidden);
    builder.git_ignore(skip_gitignored);
    builder.git_global(skip_gitignored);
    builder.git_exclude(skip_gitignored);
    builder.ignore(skip_gitignored);
    builder.parents(skip_gitignored);
    // .gitignore is honored even outside a git checkout
    builder.require_git(false);
    builder.sort_by_file_name(|a, b| a.cmp(b));

    builder
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .collect()
}

fn looks_binary(raw: &[u8]) -> bool {
    raw.iter().take(BINARY_SNIFF_BYTES).any(|&b| b == 0)
}

impl RootSearcher for WalkSearcher {
    fn search(
        &self,
        query: &RootQuery<'_>,
        on_match: &mut dyn FnMut(&ContentMatch),
        should_cancel: &dyn Fn() -> bool,
    ) -> RootSearchOutcome {
        if query.text.is_empty() {
            return RootSearchOutcome::default();
        }
        let root = resolve_path(query.root);
        if !root.is_dir() {
            return RootSearchOutcome::failed(format!("not a directory: {}", root.display()));
        }
        let matcher = match build_matcher(query.text) {
            Ok(re) => re,
            Err(e) => return RootSearchOutcome::failed(format!("invalid query: {}", e)),
        };

        let mut outcome = RootSearchOutcome::default();
        let mut total_matches = 0usize;

        'files: for path in walk_files(&root, query.show_hidden, query.skip_gitignored) {
            if should_cancel() {
                break;
            }
            let raw = match std::fs::read(&path) {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            if looks_binary(&raw) {
                continue;
            }
            // Re-read through the lossy helper only when the bytes are not UTF-8
            let text = match String::from_utf8(raw) {
                Ok(text) => text,
                Err(_) => match read_file_lossy(&path) {
                    Ok((text, _)) => text,
                    Err(_) => continue,
                },
            };

            let mut file_matches: BTreeMap<usize, ContentMatch> = BTreeMap::new();
            for (idx, line) in text.lines().enumerate() {
                let Some(found) = matcher.find(line) else { continue };
                if file_matches.is_empty() && outcome.matches_by_file.len() >= query.max_files {
                    outcome.truncated = true;
                    break 'files;
                }
                if should_cancel() {
                    break 'files;
                }
                let m = ContentMatch {
                    path: path.clone(),
                    line: idx + 1,
                    column: found.start() + 1,
                    preview: preview_line(line),
                };
                on_match(&m);
                file_matches.insert(m.line, m);
                total_matches += 1;
                if total_matches >= query.max_matches {
                    outcome.truncated = true;
                    outcome
                        .matches_by_file
                        .insert(path.clone(), file_matches.into_values().collect());
                    break 'files;
                }
            }
            if !file_matches.is_empty() {
                outcome
                    .matches_by_file
                    .insert(path, file_matches.into_values().collect());
            }
        }

        debug!(
            root = %root.display(),
            matches = total_matches,
            files = outcome.matches_by_file.len(),
            truncated = outcome.truncated,
            "walk search finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn query<'a>(root: &'a Path, text: &'a str) -> RootQuery<'a> {
        RootQuery {
            root,
            text,
            show_hidden: false,
            skip_gitignored: true,
            max_matches: 100,
            max_files: 100,
        }
    }

    fn run(searcher: &WalkSearcher, q: &RootQuery<'_>) -> (RootSearchOutcome, Vec<ContentMatch>) {
        let mut streamed = Vec::new();
        let outcome = searcher.search(q, &mut |m| streamed.push(m.clone()), &|| false);
        (outcome, streamed)
    }

    #[test]
    fn test_finds_match_with_line_and_column() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.py"), "one\ntwo\n  needle here\n").unwrap();
        let (outcome, streamed) = run(&WalkSearcher, &query(tmp.path(), "needle"));
        assert!(outcome.error.is_none());
        assert_eq!(streamed.len(), 1);
        assert_eq!(streamed[0].line, 3);
        assert_eq!(streamed[0].column, 3);
        assert_eq!(streamed[0].preview, "  needle here");
        assert_eq!(outcome.matches_by_file.len(), 1);
    }

    #[test]
    fn test_smart_case() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "Needle\nneedle\n").unwrap();
        let (lower, _) = run(&WalkSearcher, &query(tmp.path(), "needle"));
        let (upper, _) = run(&WalkSearcher, &query(tmp.path(), "Needle"));
        let count = |o: &RootSearchOutcome| o.matches_by_file.values().map(Vec::len).sum::<usize>();
        assert_eq!(count(&lower), 2);
        assert_eq!(count(&upper), 1);
    }

    #[test]
    fn test_query_is_literal_not_regex() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "a.b\naxb\n").unwrap();
        let (outcome, streamed) = run(&WalkSearcher, &query(tmp.path(), "a.b"));
        assert!(outcome.error.is_none());
        assert_eq!(streamed.len(), 1);
        assert_eq!(streamed[0].line, 1);
    }

    #[test]
    fn test_max_matches_truncates() {
        let tmp = tempfile::tempdir().unwrap();
        let body: String = (0..10).map(|i| format!("needle {}\n", i)).collect();
        fs::write(tmp.path().join("a.txt"), body).unwrap();
        let mut q = query(tmp.path(), "needle");
        q.max_matches = 5;
        let (outcome, streamed) = run(&WalkSearcher, &q);
        assert!(outcome.truncated);
        assert_eq!(streamed.len(), 5);
        assert_eq!(outcome.matches_by_file.values().map(Vec::len).sum::<usize>(), 5);
    }

    #[test]
    fn test_max_files_truncates() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(tmp.path().join(name), "needle\n").unwrap();
        }
        let mut q = query(tmp.path(), "needle");
        q.max_files = 2;
        let (outcome, _) = run(&WalkSearcher, &q);
        assert!(outcome.truncated);
        assert_eq!(outcome.matches_by_file.len(), 2);
    }

    #[test]
    fn test_hidden_and_gitignored_switches() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(".gitignore"), "ignored.txt\n").unwrap();
        fs::write(tmp.path().join("ignored.txt"), "needle\n").unwrap();
        fs::write(tmp.path().join(".secret"), "needle\n").unwrap();
        fs::write(tmp.path().join("seen.txt"), "needle\n").unwrap();

        let (plain, _) = run(&WalkSearcher, &query(tmp.path(), "needle"));
        assert_eq!(plain.matches_by_file.len(), 1);

        let mut q = query(tmp.path(), "needle");
        q.show_hidden = true;
        q.skip_gitignored = false;
        let (all, _) = run(&WalkSearcher, &q);
        assert_eq!(all.matches_by_file.len(), 3);
    }

    #[test]
    fn test_binary_files_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("blob.bin"), b"needle\0\x01\x02").unwrap();
        let (outcome, _) = run(&WalkSearcher, &query(tmp.path(), "needle"));
        assert!(outcome.matches_by_file.is_empty());
    }

    #[test]
    fn test_cancel_stops_before_first_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "needle\n").unwrap();
        let mut streamed = 0;
        let outcome = WalkSearcher.search(&query(tmp.path(), "needle"), &mut |_| streamed += 1, &|| true);
        assert_eq!(streamed, 0);
        assert!(outcome.matches_by_file.is_empty());
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("gone");
        let (outcome, _) = run(&WalkSearcher, &query(&missing, "needle"));
        assert!(outcome.error.is_some());
    }
}
