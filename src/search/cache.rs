//! Bounded LRU store of finished content-search results.
//!
//! Owned by the session thread only. Workers never touch it; their results
//! reach it through the session's event handling.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use lru::LruCache;

use super::{SearchRequest, SearchResult};

/// Everything that can change the answer to a content query.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Resolved workspace roots in display order.
    pub roots_signature: Vec<PathBuf>,
    pub query: String,
    pub show_hidden: bool,
    pub skip_gitignored: bool,
    pub max_matches: usize,
    pub max_files: usize,
}

impl CacheKey {
    pub fn for_request(request: &SearchRequest) -> Self {
        Self {
            roots_signature: request.roots.clone(),
            query: request.query.clone(),
            show_hidden: request.show_hidden,
            skip_gitignored: request.skip_gitignored,
            max_matches: request.max_matches,
            max_files: request.max_files,
        }
    }
}

/// Results are stored behind `Arc` so a hit hands out a shared, immutable
/// snapshot without copying the match lists.
pub struct ResultCache {
    entries: LruCache<CacheKey, Arc<SearchResult>>,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` results (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up a result and mark it most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<SearchResult>> {
        self.entries.get(key).cloned()
    }

    /// Insert or overwrite, evicting the least recently used entry when full.
    pub fn put(&mut self, key: CacheKey, result: Arc<SearchResult>) {
        self.entries.put(key, result);
    }

    /// Membership test that does not touch recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(crate::config::EngineConfig::default().cache_capacity)
    }
}
