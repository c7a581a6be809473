//! Display-entry construction for the tree pane.
//!
//! Three projections of a workspace: the unfiltered browse tree (read from
//! the filesystem), the Files-mode tree (matched files plus ancestors) and
//! the Content-mode tree (matched files plus ancestors, with one hit row per
//! match). All three are deterministic given their inputs: children are
//! ordered directories first, then by lowercase name.
//!
//! Every path stored in an entry is resolved, so selection code compares
//! paths without touching the filesystem.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::Serialize;

use crate::resolve_path;
use crate::search::{ContentMatch, SearchResult};

pub mod reconcile;

pub use reconcile::{Direction, Reselect, SelectionAnchor};

// ─── Entry types ────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Path,
    SearchHit,
}

/// One row of the tree pane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayEntry {
    pub path: PathBuf,
    pub depth: usize,
    pub is_dir: bool,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    /// Hit rows only: the matched line as shown in the tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    pub workspace_root: Option<PathBuf>,
    pub workspace_section: Option<usize>,
}

impl DisplayEntry {
    pub fn path_row(path: PathBuf, depth: usize, is_dir: bool, root: &Path, section: usize) -> Self {
        Self {
            path,
            depth,
            is_dir,
            kind: EntryKind::Path,
            line: None,
            column: None,
            preview: None,
            workspace_root: Some(root.to_path_buf()),
            workspace_section: Some(section),
        }
    }

    pub fn hit_row(hit: &ContentMatch, path: &Path, depth: usize, root: &Path, section: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            depth,
            is_dir: false,
            kind: EntryKind::SearchHit,
            line: Some(hit.line),
            column: Some(hit.column),
            preview: Some(hit.preview.clone()),
            workspace_root: Some(root.to_path_buf()),
            workspace_section: Some(section),
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        self.kind == EntryKind::SearchHit
    }

    /// A selectable file row (not a directory, not a hit).
    #[inline]
    pub fn is_file(&self) -> bool {
        !self.is_dir && self.kind == EntryKind::Path
    }
}

// ─── Workspace ──────────────────────────────────────────────────────

/// Deduplicate roots by resolved path, keeping first-seen order.
pub fn normalized_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    roots
        .iter()
        .map(|root| resolve_path(root))
        .filter(|root| seen.insert(root.clone()))
        .collect()
}

/// The set of roots shown in the tree, with per-section expansion state.
#[derive(Clone, Debug)]
pub struct Workspace {
    roots: Vec<PathBuf>,
    expanded: Vec<HashSet<PathBuf>>,
    show_hidden: bool,
}

impl Workspace {
    pub fn new(roots: &[PathBuf], show_hidden: bool) -> Self {
        let roots = normalized_roots(roots);
        let expanded = roots.iter().map(|root| HashSet::from([root.clone()])).collect();
        Self {
            roots,
            expanded,
            show_hidden,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    pub fn skip_gitignored(&self) -> bool {
        crate::config::skip_gitignored_for_hidden_mode(self.show_hidden)
    }

    pub fn set_show_hidden(&mut self, show_hidden: bool) {
        self.show_hidden = show_hidden;
    }

    /// Replace the roots. Expansion state survives for roots that stay.
    pub fn set_roots(&mut self, roots: &[PathBuf]) {
        let roots = normalized_roots(roots);
        let mut previous: HashMap<PathBuf, HashSet<PathBuf>> =
            self.roots.drain(..).zip(self.expanded.drain(..)).collect();
        self.expanded = roots
            .iter()
            .map(|root| {
                previous
                    .remove(root)
                    .unwrap_or_else(|| HashSet::from([root.clone()]))
            })
            .collect();
        self.roots = roots;
    }

    pub fn expanded(&self, section: usize) -> Option<&HashSet<PathBuf>> {
        self.expanded.get(section)
    }

    /// Flip a directory's expansion in the browse tree. Returns the new state.
    pub fn toggle_expanded(&mut self, section: usize, dir: &Path) -> bool {
        let Some(set) = self.expanded.get_mut(section) else { return false };
        if set.remove(dir) {
            false
        } else {
            set.insert(dir.to_path_buf());
            true
        }
    }

    pub fn browse_entries(&self) -> Vec<DisplayEntry> {
        self.sections()
            .flat_map(|(section, root, expanded)| {
                browse_tree_entries(root, expanded, self.show_hidden, self.skip_gitignored(), section)
            })
            .collect()
    }

    /// Files-mode tree; `matched` holds the matched files of each section.
    pub fn file_entries(&self, matched: &HashMap<usize, Vec<PathBuf>>) -> Vec<DisplayEntry> {
        self.sections()
            .flat_map(|(section, root, _)| {
                let files = matched.get(&section).map(Vec::as_slice).unwrap_or_default();
                file_tree_entries(root, files, section)
            })
            .collect()
    }

    /// Content-mode tree; every section sees the whole result and keeps the
    /// files under its root.
    pub fn content_entries(&self, result: &SearchResult, collapsed: &HashSet<PathBuf>) -> Vec<DisplayEntry> {
        self.sections()
            .flat_map(|(section, root, _)| content_tree_entries(root, result, collapsed, section))
            .collect()
    }

    fn sections(&self) -> impl Iterator<Item = (usize, &Path, &HashSet<PathBuf>)> {
        self.roots
            .iter()
            .zip(self.expanded.iter())
            .enumerate()
            .map(|(section, (root, expanded))| (section, root.as_path(), expanded))
    }
}

// ─── Browse tree ────────────────────────────────────────────────────

/// Visible children of one directory, directories first.
fn list_children(dir: &Path, show_hidden: bool, skip_gitignored: bool) -> Vec<(PathBuf, bool)> {
    let mut builder = WalkBuilder::new(dir);
    builder.max_depth(Some(1));
    builder.hidden(!show_hidden);
    builder.git_ignore(skip_gitignored);
    builder.git_global(skip_gitignored);
    builder.git_exclude(skip_gitignored);
    builder.ignore(skip_gitignored);
    builder.parents(skip_gitignored);
    builder.require_git(false);

    let mut children: Vec<(PathBuf, bool)> = builder
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.depth() == 1)
        .map(|entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            (entry.into_path(), is_dir)
        })
        .collect();
    children.sort_by_cached_key(|(path, is_dir)| (!*is_dir, lowercase_name(path), path.clone()));
    children
}

/// Unfiltered tree of one root read from disk, descending only into
/// expanded directories.
pub fn browse_tree_entries(
    root: &Path,
    expanded: &HashSet<PathBuf>,
    show_hidden: bool,
    skip_gitignored: bool,
    section: usize,
) -> Vec<DisplayEntry> {
    let root = resolve_path(root);
    let mut entries = vec![DisplayEntry::path_row(root.clone(), 0, true, &root, section)];

    fn walk(
        dir: &Path,
        depth: usize,
        ctx: (&Path, &HashSet<PathBuf>, bool, bool, usize),
        entries: &mut Vec<DisplayEntry>,
    ) {
        let (root, expanded, show_hidden, skip_gitignored, section) = ctx;
        for (child, is_dir) in list_children(dir, show_hidden, skip_gitignored) {
            let descend = is_dir && expanded.contains(&child);
            entries.push(DisplayEntry::path_row(child.clone(), depth, is_dir, root, section));
            if descend {
                walk(&child, depth + 1, ctx, entries);
            }
        }
    }

    if expanded.contains(&root) {
        walk(&root, 1, (&root, expanded, show_hidden, skip_gitignored, section), &mut entries);
    }
    entries
}

// ─── Filtered trees ─────────────────────────────────────────────────

fn lowercase_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Map a matched path onto `root`, or `None` when it lives elsewhere.
fn path_under_root(path: &Path, root: &Path) -> Option<PathBuf> {
    let candidate = if path.is_absolute() { path.to_path_buf() } else { root.join(path) };
    if candidate.starts_with(root) {
        return Some(candidate);
    }
    let resolved = resolve_path(&candidate);
    resolved.starts_with(root).then_some(resolved)
}

/// Visible directories/files for a set of matched files, with each file's
/// ancestors up to `root`.
struct Skeleton {
    dirs: HashSet<PathBuf>,
    files: HashSet<PathBuf>,
}

impl Skeleton {
    fn new(root: &Path) -> Self {
        Self {
            dirs: HashSet::from([root.to_path_buf()]),
            files: HashSet::new(),
        }
    }

    fn add_file(&mut self, root: &Path, file: PathBuf) {
        let mut parent = file.parent();
        while let Some(dir) = parent {
            if !dir.starts_with(root) || !self.dirs.insert(dir.to_path_buf()) {
                break;
            }
            parent = dir.parent();
        }
        self.files.insert(file);
    }

    fn children_by_parent(&self, root: &Path) -> HashMap<&Path, Vec<&Path>> {
        let mut children: HashMap<&Path, Vec<&Path>> = HashMap::new();
        for path in self.dirs.iter().chain(self.files.iter()) {
            if path == root {
                continue;
            }
            if let Some(parent) = path.parent() {
                children.entry(parent).or_default().push(path.as_path());
            }
        }
        for list in children.values_mut() {
            list.sort_by_cached_key(|p| (!self.dirs.contains(*p), lowercase_name(p), *p));
        }
        children
    }

    /// Pre-order rows below `root`. Directories in `collapsed` are listed but
    /// not descended into; files are followed by their hit rows, if any.
    fn project(
        &self,
        root: &Path,
        section: usize,
        collapsed: &HashSet<PathBuf>,
        hits: &HashMap<PathBuf, Vec<&ContentMatch>>,
    ) -> Vec<DisplayEntry> {
        let children = self.children_by_parent(root);
        let mut entries = vec![DisplayEntry::path_row(root.to_path_buf(), 0, true, root, section)];
        let mut stack: Vec<(&Path, usize)> = Vec::new();
        if let Some(kids) = children.get(root) {
            stack.extend(kids.iter().rev().map(|kid| (*kid, 1)));
        }
        while let Some((path, depth)) = stack.pop() {
            let is_dir = self.dirs.contains(path);
            entries.push(DisplayEntry::path_row(path.to_path_buf(), depth, is_dir, root, section));
            if is_dir {
                if !collapsed.contains(path) {
                    if let Some(kids) = children.get(path) {
                        stack.extend(kids.iter().rev().map(|kid| (*kid, depth + 1)));
                    }
                }
                continue;
            }
            if let Some(file_hits) = hits.get(path) {
                entries.extend(
                    file_hits
                        .iter()
                        .map(|hit| DisplayEntry::hit_row(hit, path, depth + 1, root, section)),
                );
            }
        }
        entries
    }
}

/// Files-mode tree for one root: matched files plus their ancestors, which
/// are always expanded.
pub fn file_tree_entries(root: &Path, matched_files: &[PathBuf], section: usize) -> Vec<DisplayEntry> {
    let root = resolve_path(root);
    let mut skeleton = Skeleton::new(&root);
    for raw in matched_files {
        if let Some(file) = path_under_root(raw, &root) {
            skeleton.add_file(&root, file);
        }
    }
    skeleton.project(&root, section, &HashSet::new(), &HashMap::new())
}

/// Content-mode tree for one root: matched files plus ancestors, and one hit
/// row per match under its file. Directories in `collapsed` are shown but
/// not descended into; the root is always expanded.
pub fn content_tree_entries(
    root: &Path,
    result: &SearchResult,
    collapsed: &HashSet<PathBuf>,
    section: usize,
) -> Vec<DisplayEntry> {
    let root = resolve_path(root);
    let mut skeleton = Skeleton::new(&root);
    let mut hits: HashMap<PathBuf, Vec<&ContentMatch>> = HashMap::new();
    for file in &result.files {
        if file.matches.is_empty() {
            continue;
        }
        if let Some(path) = path_under_root(&file.path, &root) {
            let mut ordered: Vec<&ContentMatch> = file.matches.iter().collect();
            ordered.sort_by(|a, b| {
                (a.line, a.column, &a.preview).cmp(&(b.line, b.column, &b.preview))
            });
            hits.insert(path.clone(), ordered);
            skeleton.add_file(&root, path);
        }
    }
    skeleton.project(&root, section, collapsed, &hits)
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
