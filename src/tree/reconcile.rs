//! Selection reconciliation after a tree rebuild, and result navigation.
//!
//! Rebuilds happen on every partial and final result while a search streams
//! in; the selection has to stay on the same thing the user was looking at
//! whenever that thing still exists.

use std::path::{Path, PathBuf};

use crate::resolve_path;
use crate::session::FilterMode;

use super::DisplayEntry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn step(self) -> isize {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

/// What was selected before a rebuild.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionAnchor {
    pub path: PathBuf,
    pub is_hit: bool,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub workspace_root: Option<PathBuf>,
    pub workspace_section: Option<usize>,
}

impl SelectionAnchor {
    pub fn from_entry(entry: &DisplayEntry) -> Self {
        Self {
            path: entry.path.clone(),
            is_hit: entry.is_hit(),
            line: entry.line,
            column: entry.column,
            workspace_root: entry.workspace_root.clone(),
            workspace_section: entry.workspace_section,
        }
    }
}

/// Inputs for [`resolve_selection`].
#[derive(Clone, Debug, Default)]
pub struct Reselect<'a> {
    /// Active filter with a non-empty query, or `None` for the plain tree.
    pub filter: Option<FilterMode>,
    /// Whether the prompt is still being edited.
    pub editing: bool,
    pub previous: Option<&'a SelectionAnchor>,
    /// Path to re-find; defaults to the previous selection's path.
    pub preferred_path: Option<&'a Path>,
    pub preferred_workspace_root: Option<&'a Path>,
    pub preferred_workspace_section: Option<usize>,
    /// Select the first result regardless of history.
    pub force_first: bool,
}

/// Choose the selected index in freshly built `entries`.
///
/// Priority: the same hit (or another hit in the same file), then the same
/// path preferring the same section and root, then the first result.
pub fn resolve_selection(entries: &[DisplayEntry], req: &Reselect<'_>) -> usize {
    if entries.is_empty() {
        return 0;
    }
    if req.force_first {
        return next_result_index(entries, req.filter, None, Direction::Forward).unwrap_or(0);
    }

    let mut selected: Option<usize> = None;

    if req.filter == Some(FilterMode::Content) {
        if let Some(prev) = req.previous.filter(|p| p.is_hit) {
            selected = find_content_hit_index(
                entries,
                &prev.path,
                prev.line,
                prev.column,
                prev.workspace_section,
            );
        }
    }

    if selected.is_none() {
        let target = match req.preferred_path {
            Some(path) => Some(resolve_path(path)),
            None => req.previous.map(|p| p.path.clone()),
        };
        if let Some(target) = target {
            let same_as_previous = req.previous.filter(|p| p.path == target);
            let scope_root = req
                .preferred_workspace_root
                .map(Path::to_path_buf)
                .or_else(|| same_as_previous.and_then(|p| p.workspace_root.clone()));
            let scope_section = req
                .preferred_workspace_section
                .or_else(|| same_as_previous.and_then(|p| p.workspace_section));
            selected = find_path_index(entries, &target, scope_root.as_deref(), scope_section);
        }
    }

    let mut idx = match selected {
        Some(idx) => idx,
        None if req.filter.is_some() => {
            next_result_index(entries, req.filter, None, Direction::Forward).unwrap_or(0)
        }
        None => default_selected_index(entries),
    };

    if req.filter == Some(FilterMode::Content) && !req.editing {
        idx = coerce_result_index(entries, req.filter, idx).unwrap_or(0);
    }
    idx
}

/// First path row for `target`, preferring the given section, then the given
/// root, then the root row of a section rooted at `target`.
fn find_path_index(
    entries: &[DisplayEntry],
    target: &Path,
    scope_root: Option<&Path>,
    scope_section: Option<usize>,
) -> Option<usize> {
    let mut first = None;
    let mut in_section = None;
    let mut in_root = None;
    let mut root_row = None;

    for (idx, entry) in entries.iter().enumerate() {
        if entry.is_hit() || entry.path != target {
            continue;
        }
        first.get_or_insert(idx);
        if scope_section.is_some() && entry.workspace_section == scope_section {
            in_section.get_or_insert(idx);
        }
        if scope_root.is_some() && entry.workspace_root.as_deref() == scope_root {
            in_root.get_or_insert(idx);
        }
        if entry.depth == 0 && entry.workspace_root.as_deref() == Some(target) {
            root_row = Some(idx);
        }
    }
    in_section.or(in_root).or(root_row).or(first)
}

/// Best hit row for a file: the exact (line, column) if still present
/// (preferring `section`), else the file's first hit in `section`, else its
/// first hit anywhere.
pub fn find_content_hit_index(
    entries: &[DisplayEntry],
    path: &Path,
    line: Option<usize>,
    column: Option<usize>,
    section: Option<usize>,
) -> Option<usize> {
    let mut first_in_file = None;
    let mut first_in_section = None;
    let mut exact = None;
    let mut exact_in_section = None;
    let wants_exact = line.is_some() || column.is_some();

    for (idx, entry) in entries.iter().enumerate() {
        if !entry.is_hit() || entry.path != path {
            continue;
        }
        let same_section = section.is_some() && entry.workspace_section == section;
        first_in_file.get_or_insert(idx);
        if same_section {
            first_in_section.get_or_insert(idx);
        }
        let is_exact = wants_exact
            && (line.is_none() || entry.line == line)
            && (column.is_none() || entry.column == column);
        if is_exact {
            exact.get_or_insert(idx);
            if same_section {
                exact_in_section.get_or_insert(idx);
            }
        }
    }
    exact_in_section.or(exact).or(first_in_section).or(first_in_file)
}

// ─── Navigation ─────────────────────────────────────────────────────

/// Scan from just past `from` (or from the edge when `None`) for the first
/// entry satisfying `pred`.
fn scan(
    entries: &[DisplayEntry],
    from: Option<usize>,
    direction: Direction,
    pred: impl Fn(&DisplayEntry) -> bool,
) -> Option<usize> {
    let len = entries.len() as isize;
    let start = match (from, direction) {
        (Some(idx), _) => idx as isize,
        (None, Direction::Forward) => -1,
        (None, Direction::Backward) => len,
    };
    let mut idx = start + direction.step();
    while (0..len).contains(&idx) {
        if pred(&entries[idx as usize]) {
            return Some(idx as usize);
        }
        idx += direction.step();
    }
    None
}

pub fn next_hit_index(entries: &[DisplayEntry], from: Option<usize>, direction: Direction) -> Option<usize> {
    scan(entries, from, direction, DisplayEntry::is_hit)
}

pub fn next_file_index(entries: &[DisplayEntry], from: Option<usize>, direction: Direction) -> Option<usize> {
    scan(entries, from, direction, |entry| !entry.is_dir)
}

/// Next selectable result: hits in Content mode, files otherwise.
pub fn next_result_index(
    entries: &[DisplayEntry],
    filter: Option<FilterMode>,
    from: Option<usize>,
    direction: Direction,
) -> Option<usize> {
    match filter {
        Some(FilterMode::Content) => next_hit_index(entries, from, direction),
        _ => next_file_index(entries, from, direction),
    }
}

/// Closest result after `idx`, else before it.
pub fn nearest_result_index(entries: &[DisplayEntry], filter: Option<FilterMode>, idx: usize) -> Option<usize> {
    next_result_index(entries, filter, Some(idx), Direction::Forward)
        .or_else(|| next_result_index(entries, filter, Some(idx), Direction::Backward))
}

/// Move an arbitrary index onto a selectable result. Without an active
/// filter every row is selectable.
pub fn coerce_result_index(entries: &[DisplayEntry], filter: Option<FilterMode>, idx: usize) -> Option<usize> {
    let entry = entries.get(idx)?;
    let selectable = match filter {
        None => true,
        Some(FilterMode::Content) => entry.is_hit(),
        Some(FilterMode::Files) => !entry.is_dir,
    };
    if selectable {
        Some(idx)
    } else {
        nearest_result_index(entries, filter, idx)
    }
}

/// Default selection for the plain tree: the first child of the root.
pub fn default_selected_index(entries: &[DisplayEntry]) -> usize {
    if entries.len() > 1 {
        1
    } else {
        0
    }
}
