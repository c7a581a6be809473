//! Filter prompt state: the query session that owns background content
//! searches, and the controller that turns prompt edits into tree entries.
//!
//! Everything here runs on the caller's (UI) thread. Background work lives
//! in [`crate::search::worker`] and reports back only through the session's
//! event channel.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::tree::DisplayEntry;

pub mod controller;
pub mod query;

pub use controller::FilterModeController;
pub use query::{QuerySession, StreamIntent};

/// Which filter the prompt drives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Filename filtering, matched synchronously.
    #[default]
    Files,
    /// Streaming full-text search on a background worker.
    Content,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::Files => write!(f, "files"),
            FilterMode::Content => write!(f, "content"),
        }
    }
}

/// Where the viewer is: the open file and its scroll position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewLocation {
    pub path: PathBuf,
    pub start_line: usize,
    pub text_x: usize,
}

impl ViewLocation {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// The application around the controller: the source pane and the redraw
/// loop.
pub trait FilterHost {
    /// Current viewer location; captured when Content mode opens.
    fn current_location(&self) -> ViewLocation;

    /// Jump back to a location captured earlier.
    fn restore_location(&mut self, location: &ViewLocation);

    /// Show the selected entry in the source pane without leaving the filter.
    fn preview_entry(&mut self, entry: &DisplayEntry);

    /// Open a chosen file, optionally at a 1-based line.
    fn open_path(&mut self, path: &Path, line: Option<usize>);

    /// Something visible changed: entries, match count, loading or selection.
    fn on_change(&mut self) {}
}

#[cfg(test)]
pub(crate) mod session_test_utils;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_mode_display_and_serde() {
        assert_eq!(FilterMode::Content.to_string(), "content");
        assert_eq!(serde_json::to_string(&FilterMode::Files).unwrap(), "\"files\"");
        let parsed: FilterMode = serde_json::from_str("\"content\"").unwrap();
        assert_eq!(parsed, FilterMode::Content);
        assert_eq!(FilterMode::default(), FilterMode::Files);
    }

    #[test]
    fn test_view_location_at() {
        let loc = ViewLocation::at("/w/a.rs");
        assert_eq!(loc.path, PathBuf::from("/w/a.rs"));
        assert_eq!(loc.start_line, 0);
    }
}
