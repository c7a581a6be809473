//! The filter prompt controller.
//!
//! Drives the tree pane while the filter prompt is open: turns prompt edits
//! into Files-mode matches or Content-mode searches, rebuilds the entry
//! list, keeps the selection stable across rebuilds and reports results to
//! the [`FilterHost`].
//!
//! Lifecycle: closed, then editing the query, then (Content mode) browsing
//! the hit list with the prompt still open, then closed again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{content_match_limit, EngineConfig};
use crate::fuzzy::{filter_files, FileLabelIndex, FuzzyMatcher, LabelMatcher};
use crate::search::{CacheKey, MultiRootCoordinator, RootSearcher, SearchRequest, SearchResult};
use crate::tree::reconcile::{
    coerce_result_index, nearest_result_index, next_hit_index, next_result_index, resolve_selection,
};
use crate::tree::{DisplayEntry, Direction, Reselect, SelectionAnchor, Workspace};

use super::query::{QuerySession, StreamIntent};
use super::{FilterHost, FilterMode, ViewLocation};

/// Options for one entry rebuild.
#[derive(Default)]
struct Rebuild {
    preferred_path: Option<PathBuf>,
    anchor: Option<SelectionAnchor>,
    force_first: bool,
    /// Content-mode result to show; `None` keeps the displayed one.
    content: Option<Arc<SearchResult>>,
}

pub struct FilterModeController<H: FilterHost> {
    config: EngineConfig,
    host: H,
    workspace: Workspace,
    session: QuerySession,
    matcher: Box<dyn FuzzyMatcher>,
    labels: FileLabelIndex,

    active: bool,
    mode: FilterMode,
    editing: bool,
    query: String,
    origin: Option<ViewLocation>,
    prompt_visible: bool,
    collapsed: HashSet<PathBuf>,

    displayed: Arc<SearchResult>,
    entries: Vec<DisplayEntry>,
    selected: usize,
    match_count: usize,
    truncated: bool,
    error: Option<String>,
}

impl<H: FilterHost> FilterModeController<H> {
    pub fn new(host: H, roots: &[PathBuf], config: EngineConfig, searcher: Arc<dyn RootSearcher>) -> Self {
        let config = config.normalized();
        let coordinator = MultiRootCoordinator::new(searcher).with_max_parallel(config.max_parallel_roots);
        let session = QuerySession::new(coordinator, config.cache_capacity, config.stream_refresh_interval());
        let mut controller = Self {
            host,
            workspace: Workspace::new(roots, false),
            session,
            matcher: Box::new(LabelMatcher::new()),
            labels: FileLabelIndex::default(),
            active: false,
            mode: FilterMode::Files,
            editing: false,
            query: String::new(),
            origin: None,
            prompt_visible: true,
            collapsed: HashSet::new(),
            displayed: Arc::new(SearchResult::default()),
            entries: Vec::new(),
            selected: 0,
            match_count: 0,
            truncated: false,
            error: None,
            config,
        };
        controller.rebuild(Rebuild::default());
        controller
    }

    pub fn with_matcher(mut self, matcher: Box<dyn FuzzyMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    // ─── Accessors ──────────────────────────────────────────────────

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn entries(&self) -> &[DisplayEntry] {
        &self.entries
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&DisplayEntry> {
        self.entries.get(self.selected)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn match_count(&self) -> usize {
        self.match_count
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the prompt row is shown. Click-triggered searches hide it
    /// briefly so instant results never flash a loading frame.
    pub fn prompt_visible(&self) -> bool {
        self.prompt_visible
    }

    /// True while a content search runs in the background.
    pub fn loading(&self) -> bool {
        self.session.is_loading()
    }

    pub fn generation(&self) -> u64 {
        self.session.generation()
    }

    /// Background searches started since creation. Cache hits do not count.
    pub fn searches_started(&self) -> u64 {
        self.session.searches_started()
    }

    pub fn cached_results(&self) -> usize {
        self.session.cache().len()
    }

    /// One-line summary for the prompt: match count, truncation or error.
    pub fn status_line(&self) -> String {
        if !self.active || self.query.is_empty() {
            return String::new();
        }
        if self.loading() && self.match_count == 0 {
            return "searching...".to_string();
        }
        if let Some(error) = self.error.as_deref().filter(|_| self.match_count == 0) {
            return error.to_string();
        }
        let noun = if self.match_count == 1 { "match" } else { "matches" };
        if self.truncated {
            format!("{}+ {} (truncated)", self.match_count, noun)
        } else {
            format!("{} {}", self.match_count, noun)
        }
    }

    fn filter(&self) -> Option<FilterMode> {
        (self.active && !self.query.is_empty()).then_some(self.mode)
    }

    fn selected_anchor(&self) -> Option<SelectionAnchor> {
        self.selected().map(SelectionAnchor::from_entry)
    }

    fn notify(&mut self) {
        self.host.on_change();
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Open the prompt in `mode` with an empty query.
    pub fn open(&mut self, mode: FilterMode) {
        let was_active = self.active;
        let previous_mode = self.mode;
        self.active = true;
        self.mode = mode;
        self.editing = true;
        self.origin = (mode == FilterMode::Content).then(|| self.host.current_location());
        self.query.clear();
        self.match_count = 0;
        self.truncated = false;
        self.error = None;
        self.reset_session_state();
        info!(mode = %mode, "filter opened");
        if was_active && previous_mode != mode {
            let preferred_path = Some(self.host.current_location().path);
            self.rebuild(Rebuild {
                preferred_path,
                ..Rebuild::default()
            });
        }
        self.notify();
    }

    /// Close the prompt. With `restore_origin` in Content mode, the viewer
    /// returns to where it was when the prompt opened.
    pub fn close(&mut self, clear_query: bool, restore_origin: bool) {
        let restore = if restore_origin && self.mode == FilterMode::Content {
            self.origin.take()
        } else {
            None
        };
        self.active = false;
        self.editing = false;
        self.mode = FilterMode::Files;
        if clear_query {
            self.query.clear();
            self.truncated = false;
        }
        self.reset_session_state();
        info!(restore = restore.is_some(), "filter closed");

        match restore {
            Some(location) => {
                self.rebuild(Rebuild {
                    preferred_path: Some(location.path.clone()),
                    ..Rebuild::default()
                });
                self.host.restore_location(&location);
            }
            None => {
                let preferred_path = Some(self.host.current_location().path);
                self.rebuild(Rebuild {
                    preferred_path,
                    ..Rebuild::default()
                });
            }
        }
        self.origin = None;
        self.notify();
    }

    /// Same mode while editing closes; another mode switches; same mode
    /// while browsing results returns to editing.
    pub fn toggle(&mut self, mode: FilterMode) {
        if self.active {
            if self.mode == mode && self.editing {
                self.close(true, false);
            } else if self.mode != mode {
                self.open(mode);
            } else {
                self.editing = true;
                self.notify();
            }
            return;
        }
        self.open(mode);
    }

    fn reset_session_state(&mut self) {
        if self.session.cancel() {
            debug!("cancelled active search on reset");
        }
        self.prompt_visible = true;
        self.collapsed.clear();
        self.displayed = Arc::new(SearchResult::default());
    }

    // ─── Queries ────────────────────────────────────────────────────

    fn content_request(&self, query: &str) -> SearchRequest {
        SearchRequest {
            roots: self.workspace.roots().to_vec(),
            query: query.to_string(),
            show_hidden: self.workspace.show_hidden(),
            skip_gitignored: self.workspace.skip_gitignored(),
            max_matches: content_match_limit(query),
            max_files: self.config.content_file_limit,
        }
    }

    /// Apply new prompt text.
    ///
    /// Files mode and empty queries resolve synchronously. Content queries
    /// answer from the cache when possible, else start a background search
    /// and show an interim tree until results stream in. With
    /// `debounce_prompt_row` (click-triggered queries) the prompt row stays
    /// hidden for a short reveal delay.
    pub fn apply_query(&mut self, text: &str, preview_selection: bool, select_first: bool, debounce_prompt_row: bool) {
        self.query = text.to_string();
        let generation = self.session.begin_edit();
        let force_first = select_first && !text.is_empty();
        let preferred_path = (!force_first).then(|| self.host.current_location().path);
        let anchor = self.selected_anchor();
        let suppress_prompt = debounce_prompt_row && !text.is_empty() && self.mode == FilterMode::Content;
        debug!(generation, query = %text, mode = %self.mode, "applying filter query");

        if self.mode != FilterMode::Content || text.is_empty() {
            self.prompt_visible = true;
            let content = (self.mode == FilterMode::Content).then(|| Arc::new(SearchResult::default()));
            self.rebuild(Rebuild {
                preferred_path,
                anchor,
                force_first,
                content,
            });
            if preview_selection {
                self.preview_selected();
            }
            self.notify();
            return;
        }

        let request = self.content_request(text);
        let key = CacheKey::for_request(&request);
        self.prompt_visible = !suppress_prompt;
        if let Some(cached) = self.session.cached(&key) {
            self.rebuild(Rebuild {
                preferred_path,
                anchor,
                force_first,
                content: Some(cached),
            });
            if preview_selection {
                self.preview_selected();
            }
            self.notify();
            return;
        }

        let intent = StreamIntent {
            preferred_path: preferred_path.clone(),
            anchor: anchor.clone(),
            force_first,
            preview_selection,
        };
        if let Err(e) = self.session.start(request, intent) {
            warn!(error = %e, "could not start content search");
            self.prompt_visible = true;
            self.rebuild(Rebuild {
                preferred_path,
                anchor,
                force_first,
                content: Some(Arc::new(SearchResult {
                    error: Some(e.to_string()),
                    ..SearchResult::default()
                })),
            });
            self.notify();
            return;
        }

        if suppress_prompt {
            self.session
                .defer_reveal(Instant::now() + self.config.prompt_reveal_delay());
        } else {
            self.rebuild(Rebuild {
                preferred_path,
                anchor,
                force_first,
                content: Some(Arc::new(SearchResult::default())),
            });
        }
        self.poll(self.config.initial_wait(suppress_prompt));
        self.notify();
    }

    /// Drain background search events, waiting up to `timeout` for the first
    /// one. Returns true when anything visible changed; the host is notified
    /// in that case as well.
    pub fn poll_updates(&mut self, timeout: Duration) -> bool {
        let changed = self.poll(timeout);
        if changed {
            self.notify();
        }
        changed
    }

    fn poll(&mut self, timeout: Duration) -> bool {
        let drained = self.session.drain(timeout);
        let mut changed = drained.processed;
        let streaming = self.active && self.mode == FilterMode::Content;

        if let Some((finished, intent)) = drained.finished {
            if streaming {
                self.rebuild(Rebuild {
                    preferred_path: intent.preferred_path,
                    anchor: intent.anchor,
                    force_first: intent.force_first,
                    content: Some(finished.into_result()),
                });
                if intent.preview_selection {
                    self.preview_selected();
                }
            }
            return true;
        }
        if !streaming {
            return changed;
        }

        let now = Instant::now();
        if let Some(initial_rebuild) = self.session.take_due_reveal(now) {
            self.prompt_visible = true;
            if initial_rebuild {
                let partial = self.session.partial_snapshot();
                self.rebuild_streaming(partial);
            }
            changed = true;
        } else if let Some(partial) = self.session.take_due_partial(now) {
            self.rebuild_streaming(partial);
            changed = true;
        }
        changed
    }

    fn rebuild_streaming(&mut self, partial: SearchResult) {
        let intent = self.session.intent().cloned().unwrap_or_default();
        self.rebuild(Rebuild {
            preferred_path: intent.preferred_path,
            anchor: intent.anchor,
            force_first: intent.force_first,
            content: Some(Arc::new(partial)),
        });
    }

    // ─── Entry building ─────────────────────────────────────────────

    fn rebuild(&mut self, opts: Rebuild) {
        let previous = opts.anchor.or_else(|| self.selected_anchor());
        let filter = self.filter();

        self.entries = match filter {
            Some(FilterMode::Content) => {
                if let Some(content) = opts.content {
                    self.displayed = content;
                }
                self.match_count = self.displayed.match_count();
                self.truncated = self.displayed.truncated;
                self.error = self.displayed.error.clone();
                self.workspace.content_entries(&self.displayed, &self.collapsed)
            }
            Some(FilterMode::Files) => {
                self.refresh_label_index();
                let result = filter_files(self.matcher.as_ref(), &self.labels, &self.query);
                self.match_count = result.match_count;
                self.truncated = result.truncated;
                self.error = None;
                self.workspace.file_entries(&result.paths_by_section)
            }
            None => {
                self.match_count = 0;
                self.truncated = false;
                self.error = None;
                self.workspace.browse_entries()
            }
        };

        let fallback_path;
        let preferred_path = match opts.preferred_path.as_deref() {
            Some(path) => Some(path),
            None if previous.is_some() => None,
            None => {
                fallback_path = self.host.current_location().path;
                Some(fallback_path.as_path())
            }
        };
        self.selected = resolve_selection(
            &self.entries,
            &Reselect {
                filter,
                editing: self.editing,
                previous: previous.as_ref(),
                preferred_path,
                force_first: opts.force_first,
                ..Reselect::default()
            },
        );
    }

    fn refresh_label_index(&mut self) {
        let roots = self.workspace.roots();
        let show_hidden = self.workspace.show_hidden();
        if !self.labels.is_current(roots, show_hidden) {
            self.labels = FileLabelIndex::build(roots, show_hidden);
        }
    }

    // ─── Navigation ─────────────────────────────────────────────────

    fn preview_selected(&mut self) {
        if let Some(entry) = self.entries.get(self.selected) {
            self.host.preview_entry(entry);
        }
    }

    fn select(&mut self, idx: usize) {
        self.selected = idx;
        // a running search re-finds what the user picked, not what was
        // selected when it started
        self.session.set_anchor(self.selected_anchor());
        self.preview_selected();
        self.notify();
    }

    /// Move the selection one step. With an active filter only result rows
    /// are visited. Returns false at either end.
    pub fn move_selection(&mut self, direction: Direction) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let target = match self.filter() {
            Some(filter) => match next_result_index(&self.entries, Some(filter), Some(self.selected), direction) {
                Some(idx) => idx,
                None => return false,
            },
            None => match direction {
                Direction::Forward => (self.selected + 1).min(self.entries.len() - 1),
                Direction::Backward => self.selected.saturating_sub(1),
            },
        };
        if target == self.selected {
            return false;
        }
        self.select(target);
        true
    }

    /// Jump to the next content hit, wrapping around at either end.
    pub fn jump_to_next_hit(&mut self, direction: Direction) -> bool {
        let target = next_hit_index(&self.entries, Some(self.selected), direction)
            .or_else(|| next_hit_index(&self.entries, None, direction));
        match target {
            Some(idx) if idx != self.selected => {
                self.select(idx);
                true
            }
            _ => false,
        }
    }

    /// Enter on the selection. Content mode stops editing and previews the
    /// hit; Files mode closes the prompt and opens the file.
    pub fn activate_selection(&mut self) {
        if self.entries.is_empty() {
            match self.mode {
                FilterMode::Content => {
                    self.editing = false;
                    self.notify();
                }
                FilterMode::Files => self.close(true, false),
            }
            return;
        }

        let mut idx = self.selected.min(self.entries.len() - 1);
        if self.entries[idx].is_dir {
            match nearest_result_index(&self.entries, self.filter(), idx) {
                Some(candidate) => idx = candidate,
                None => {
                    self.close(true, false);
                    return;
                }
            }
        }
        self.selected = idx;

        if self.mode == FilterMode::Content {
            self.editing = false;
            self.preview_selected();
            self.notify();
            return;
        }

        let entry = &self.entries[idx];
        let path = entry.path.clone();
        let line = entry.is_hit().then_some(entry.line).flatten();
        self.close(true, false);
        info!(path = %path.display(), "opening filter result");
        self.host.open_path(&path, line);
        self.notify();
    }

    /// Switch between editing the query and browsing results. Browsing
    /// Content results keeps the selection on a hit.
    pub fn set_editing(&mut self, editing: bool) {
        if self.editing == editing {
            return;
        }
        self.editing = editing;
        if !editing && self.filter() == Some(FilterMode::Content) {
            self.selected = coerce_result_index(&self.entries, Some(FilterMode::Content), self.selected).unwrap_or(0);
        }
        self.notify();
    }

    // ─── Tree state ─────────────────────────────────────────────────

    /// Collapse or expand a directory. In the Content tree this toggles the
    /// session's collapsed set (roots never collapse); in the plain tree it
    /// toggles browse expansion. Returns false when nothing changed.
    pub fn toggle_collapsed(&mut self, dir: &Path) -> bool {
        let filter = self.filter();
        if filter == Some(FilterMode::Files) {
            return false;
        }
        let section = self
            .selected()
            .filter(|e| e.path == dir)
            .or_else(|| self.entries.iter().find(|e| e.path == dir && e.is_dir))
            .and_then(|e| e.workspace_section);
        let Some(section) = section else { return false };

        if filter == Some(FilterMode::Content) {
            if self.workspace.roots().iter().any(|root| root == dir) {
                return false;
            }
            if !self.collapsed.remove(dir) {
                self.collapsed.insert(dir.to_path_buf());
            }
        } else {
            self.workspace.toggle_expanded(section, dir);
        }
        self.rebuild(Rebuild {
            preferred_path: Some(dir.to_path_buf()),
            ..Rebuild::default()
        });
        self.notify();
        true
    }

    /// Show or hide dotfiles and gitignored paths. An active query is
    /// re-run, since its results depend on the switch.
    pub fn set_show_hidden(&mut self, show_hidden: bool) {
        if self.workspace.show_hidden() == show_hidden {
            return;
        }
        self.workspace.set_show_hidden(show_hidden);
        self.refresh_after_workspace_change();
    }

    /// Replace the workspace roots.
    pub fn set_roots(&mut self, roots: &[PathBuf]) {
        self.workspace.set_roots(roots);
        self.refresh_after_workspace_change();
    }

    fn refresh_after_workspace_change(&mut self) {
        if self.filter() == Some(FilterMode::Content) {
            let query = self.query.clone();
            self.apply_query(&query, false, false, false);
            return;
        }
        self.rebuild(Rebuild::default());
        self.notify();
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
