//! Engine configuration: timing knobs, cache/parallelism bounds and
//! query-adaptive result limits.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;

// ─── Query-adaptive limits ──────────────────────────────────────────

pub const FILE_FILTER_MATCH_LIMIT_1CHAR: usize = 300;
pub const FILE_FILTER_MATCH_LIMIT_2CHAR: usize = 1_000;
pub const FILE_FILTER_MATCH_LIMIT_3CHAR: usize = 3_000;
pub const FILE_FILTER_MATCH_LIMIT_DEFAULT: usize = 8_000;
pub const CONTENT_MATCH_LIMIT_1CHAR: usize = 300;
pub const CONTENT_MATCH_LIMIT_2CHAR: usize = 1_000;
pub const CONTENT_MATCH_LIMIT_3CHAR: usize = 2_000;
pub const CONTENT_MATCH_LIMIT_DEFAULT: usize = 4_000;

/// Short queries match almost everything; cap them harder.
pub fn file_filter_match_limit(query: &str) -> usize {
    match query.chars().count() {
        0 | 1 => FILE_FILTER_MATCH_LIMIT_1CHAR,
        2 => FILE_FILTER_MATCH_LIMIT_2CHAR,
        3 => FILE_FILTER_MATCH_LIMIT_3CHAR,
        _ => FILE_FILTER_MATCH_LIMIT_DEFAULT,
    }
}

pub fn content_match_limit(query: &str) -> usize {
    match query.chars().count() {
        0 | 1 => CONTENT_MATCH_LIMIT_1CHAR,
        2 => CONTENT_MATCH_LIMIT_2CHAR,
        3 => CONTENT_MATCH_LIMIT_3CHAR,
        _ => CONTENT_MATCH_LIMIT_DEFAULT,
    }
}

/// Hidden mode reveals both dotfiles and gitignored paths.
pub fn skip_gitignored_for_hidden_mode(show_hidden: bool) -> bool {
    !show_hidden
}

// ─── EngineConfig ───────────────────────────────────────────────────

/// Which per-root search backend workers call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    /// External `rg --json` process
    Ripgrep,
    /// In-process gitignore-aware directory walk
    Walk,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum spacing between partial-result tree rebuilds while streaming.
    pub stream_refresh_ms: u64,
    /// Delay before a click-triggered search reveals its prompt row.
    pub prompt_reveal_delay_ms: u64,
    /// Initial poll wait after a click-triggered query.
    pub click_initial_wait_ms: u64,
    /// Initial poll wait after a typed query.
    pub typing_initial_wait_ms: u64,
    pub cache_capacity: usize,
    pub max_parallel_roots: usize,
    pub content_file_limit: usize,
    pub backend: SearchBackend,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream_refresh_ms: 10,
            prompt_reveal_delay_ms: 100,
            click_initial_wait_ms: 20,
            typing_initial_wait_ms: 5,
            cache_capacity: 64,
            max_parallel_roots: 8,
            content_file_limit: 800,
            backend: SearchBackend::Ripgrep,
        }
    }
}

impl EngineConfig {
    pub fn stream_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.stream_refresh_ms)
    }

    pub fn prompt_reveal_delay(&self) -> Duration {
        Duration::from_millis(self.prompt_reveal_delay_ms)
    }

    pub fn initial_wait(&self, click_triggered: bool) -> Duration {
        if click_triggered {
            Duration::from_millis(self.click_initial_wait_ms)
        } else {
            Duration::from_millis(self.typing_initial_wait_ms)
        }
    }

    /// Default config location: `<config_dir>/treefilter/config.json`.
    pub fn default_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("treefilter").join("config.json")
    }

    /// Load from a JSON file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, FilterError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(FilterError::Config {
                    path: path.display().to_string(),
                    message: format!("cannot read file: {}", e),
                });
            }
        };
        let config: Self = serde_json::from_str(&text).map_err(|e| FilterError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(config.normalized())
    }

    /// Clamp values that would otherwise stall the engine.
    pub fn normalized(mut self) -> Self {
        self.cache_capacity = self.cache_capacity.max(1);
        self.max_parallel_roots = self.max_parallel_roots.clamp(1, 8);
        self.content_file_limit = self.content_file_limit.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_content_limits_by_query_length() {
        assert_eq!(content_match_limit("a"), 300);
        assert_eq!(content_match_limit("ab"), 1_000);
        assert_eq!(content_match_limit("abc"), 2_000);
        assert_eq!(content_match_limit("abcd"), 4_000);
        assert_eq!(content_match_limit("needle in a haystack"), 4_000);
    }

    #[test]
    fn test_file_limits_by_query_length() {
        assert_eq!(file_filter_match_limit(""), 300);
        assert_eq!(file_filter_match_limit("m"), 300);
        assert_eq!(file_filter_match_limit("ma"), 1_000);
        assert_eq!(file_filter_match_limit("mai"), 3_000);
        assert_eq!(file_filter_match_limit("main"), 8_000);
    }

    #[test]
    fn test_limits_count_chars_not_bytes() {
        assert_eq!(content_match_limit("éé"), 1_000);
    }

    #[test]
    fn test_hidden_mode_reveals_gitignored() {
        assert!(skip_gitignored_for_hidden_mode(false));
        assert!(!skip_gitignored_for_hidden_mode(true));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&tmp.path().join("nope.json")).unwrap();
        assert_eq!(config.cache_capacity, 64);
        assert_eq!(config.stream_refresh_ms, 10);
        assert_eq!(config.backend, SearchBackend::Ripgrep);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, r#"{{"cache_capacity": 8, "backend": "walk"}}"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.cache_capacity, 8);
        assert_eq!(config.backend, SearchBackend::Walk);
        assert_eq!(config.prompt_reveal_delay_ms, 100);
    }

    #[test]
    fn test_load_malformed_file_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(err, FilterError::Config { .. }));
    }

    #[test]
    fn test_normalized_clamps_parallelism_and_capacity() {
        let config = EngineConfig {
            cache_capacity: 0,
            max_parallel_roots: 64,
            content_file_limit: 0,
            ..EngineConfig::default()
        }
        .normalized();
        assert_eq!(config.cache_capacity, 1);
        assert_eq!(config.max_parallel_roots, 8);
        assert_eq!(config.content_file_limit, 1);
    }
}
