//! Background worker: one thread per query generation.
//!
//! The worker owns an immutable [`SearchRequest`] snapshot and a
//! [`CancelToken`]. It reports back only through [`SearchEvent`]s tagged with
//! its generation; the session drops events from stale generations.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::FilterError;

use super::cache::CacheKey;
use super::cancel::CancelToken;
use super::coordinator::MultiRootCoordinator;
use super::{ContentMatch, SearchRequest, SearchResult};

#[derive(Clone, Debug)]
pub struct SearchEvent {
    pub generation: u64,
    pub payload: SearchPayload,
}

#[derive(Clone, Debug)]
pub enum SearchPayload {
    /// One accepted, deduplicated hit.
    Match(ContentMatch),
    /// Terminal event: the merged result and the key it belongs under.
    Done {
        key: CacheKey,
        result: Arc<SearchResult>,
    },
    /// Terminal event: the worker panicked. Never cached.
    Failed { message: String },
}

/// Handle to a running search. Dropping it cancels the search but never
/// waits for the thread.
pub struct SearchWorker {
    generation: u64,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl SearchWorker {
    pub fn spawn(
        generation: u64,
        request: SearchRequest,
        coordinator: MultiRootCoordinator,
        events: Sender<SearchEvent>,
    ) -> Result<Self, FilterError> {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let key = CacheKey::for_request(&request);

        debug!(generation, query = %request.query, roots = request.roots.len(), "spawning search worker");

        let handle = std::thread::Builder::new()
            .name(format!("treefilter-search-{}", generation))
            .spawn(move || run_worker(generation, request, key, coordinator, token, events))?;

        Ok(Self {
            generation,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ask the worker to stop at its next safe point.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            debug!(generation = self.generation, "cancelling search worker");
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Block until the thread exits. Only tests and the CLI use this; the
    /// session never joins.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SearchWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn run_worker(
    generation: u64,
    request: SearchRequest,
    key: CacheKey,
    coordinator: MultiRootCoordinator,
    cancel: CancelToken,
    events: Sender<SearchEvent>,
) {
    let start = Instant::now();
    let emit_match = |m: &ContentMatch| {
        if cancel.is_cancelled() {
            return;
        }
        let _ = events.send(SearchEvent {
            generation,
            payload: SearchPayload::Match(m.clone()),
        });
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        coordinator.search(&request, &cancel, &emit_match)
    }));

    if cancel.is_cancelled() {
        debug!(generation, elapsed_ms = start.elapsed().as_millis() as u64, "search worker cancelled");
        return;
    }

    let payload = match outcome {
        Ok(result) => {
            debug!(
                generation,
                matches = result.match_count(),
                truncated = result.truncated,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "search worker finished"
            );
            SearchPayload::Done {
                key,
                result: Arc::new(result),
            }
        }
        Err(payload) => {
            let message = FilterError::from_panic(payload.as_ref()).to_string();
            warn!(generation, error = %message, "search worker fault");
            SearchPayload::Failed { message }
        }
    };
    // The receiver may be gone if the session closed; nothing to do then
    let _ = events.send(SearchEvent { generation, payload });
}
