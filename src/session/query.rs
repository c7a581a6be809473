//! Content-query session: generations, the active worker, the result cache
//! and the streaming buffer.
//!
//! Exactly one generation is active at a time. Every prompt edit bumps the
//! generation and cancels the previous worker; events carrying any other
//! generation are dropped on arrival, including a stale worker's final
//! result, which therefore never reaches the cache.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::FilterError;
use crate::search::{
    CacheKey, ContentMatch, MatchesByFile, MultiRootCoordinator, ResultCache, SearchEvent,
    SearchPayload, SearchRequest, SearchResult, SearchWorker,
};
use crate::tree::SelectionAnchor;

/// What the controller wanted when it started a search; replayed on every
/// partial and final rebuild of that generation.
#[derive(Clone, Debug, Default)]
pub struct StreamIntent {
    pub preferred_path: Option<std::path::PathBuf>,
    pub anchor: Option<SelectionAnchor>,
    pub force_first: bool,
    pub preview_selection: bool,
}

/// Terminal state of the active generation.
#[derive(Clone, Debug)]
pub enum Finished {
    Done(Arc<SearchResult>),
    /// The worker crashed. Shown as an empty, truncated result.
    Failed(String),
}

impl Finished {
    pub fn into_result(self) -> Arc<SearchResult> {
        match self {
            Finished::Done(result) => result,
            Finished::Failed(message) => Arc::new(SearchResult {
                files: Vec::new(),
                truncated: true,
                error: Some(message),
            }),
        }
    }
}

/// Outcome of one [`QuerySession::drain`].
#[derive(Debug, Default)]
pub struct Drained {
    /// At least one event of the active generation was applied.
    pub processed: bool,
    /// Matches accepted for the active generation.
    pub accepted: usize,
    pub finished: Option<(Finished, StreamIntent)>,
}

struct ActiveSearch {
    worker: SearchWorker,
    intent: StreamIntent,
    partial: MatchesByFile,
    dirty: bool,
    last_refresh: Option<Instant>,
    reveal_at: Option<Instant>,
    initial_rebuild_pending: bool,
}

pub struct QuerySession {
    coordinator: MultiRootCoordinator,
    cache: ResultCache,
    generation: u64,
    active: Option<ActiveSearch>,
    events_tx: Sender<SearchEvent>,
    events_rx: Receiver<SearchEvent>,
    refresh_interval: Duration,
    searches_started: u64,
}

impl QuerySession {
    pub fn new(coordinator: MultiRootCoordinator, cache_capacity: usize, refresh_interval: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            coordinator,
            cache: ResultCache::new(cache_capacity),
            generation: 0,
            active: None,
            events_tx,
            events_rx,
            refresh_interval,
            searches_started: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generation of the running worker, if any.
    pub fn active_generation(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.worker.generation())
    }

    pub fn is_loading(&self) -> bool {
        self.active.is_some()
    }

    /// Workers spawned so far; cache hits do not count.
    pub fn searches_started(&self) -> u64 {
        self.searches_started
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// A prompt edit: new generation, previous worker cancelled.
    pub fn begin_edit(&mut self) -> u64 {
        self.cancel();
        self.generation += 1;
        trace!(generation = self.generation, "query generation advanced");
        self.generation
    }

    /// Stop the running worker, if any, and forget its partial results.
    /// Returns true when a worker was running.
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.worker.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cached(&mut self, key: &CacheKey) -> Option<Arc<SearchResult>> {
        let hit = self.cache.get(key);
        debug!(query = %key.query, hit = hit.is_some(), "content cache lookup");
        hit
    }

    /// Spawn a worker for `request` under the current generation.
    pub fn start(&mut self, request: SearchRequest, intent: StreamIntent) -> Result<u64, FilterError> {
        self.cancel();
        let worker = SearchWorker::spawn(
            self.generation,
            request,
            self.coordinator.clone(),
            self.events_tx.clone(),
        )?;
        self.searches_started += 1;
        self.active = Some(ActiveSearch {
            worker,
            intent,
            partial: MatchesByFile::new(),
            dirty: false,
            last_refresh: None,
            reveal_at: None,
            initial_rebuild_pending: false,
        });
        Ok(self.generation)
    }

    /// Replace the selection the active search should re-find.
    pub fn set_anchor(&mut self, anchor: Option<SelectionAnchor>) {
        if let Some(active) = self.active.as_mut() {
            active.intent.anchor = anchor;
        }
    }

    pub fn intent(&self) -> Option<&StreamIntent> {
        self.active.as_ref().map(|a| &a.intent)
    }

    /// Delay showing the prompt row; the first rebuild waits for it too.
    pub fn defer_reveal(&mut self, at: Instant) {
        if let Some(active) = self.active.as_mut() {
            active.reveal_at = Some(at);
            active.initial_rebuild_pending = true;
        }
    }

    pub fn reveal_pending(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.reveal_at.is_some())
    }

    /// If the reveal deadline passed, clear it and report whether the
    /// deferred first rebuild still has to happen.
    pub fn take_due_reveal(&mut self, now: Instant) -> Option<bool> {
        let active = self.active.as_mut()?;
        let due = active.reveal_at.is_some_and(|at| now >= at);
        if !due {
            return None;
        }
        active.reveal_at = None;
        let pending = std::mem::take(&mut active.initial_rebuild_pending);
        if pending {
            active.dirty = false;
            active.last_refresh = Some(now);
        }
        Some(pending)
    }

    /// Read events: wait up to `timeout` for the first, then take whatever
    /// else is queued without blocking. Stops at the active generation's
    /// terminal event.
    pub fn drain(&mut self, timeout: Duration) -> Drained {
        let mut drained = Drained::default();
        let mut next = if timeout.is_zero() {
            self.try_next()
        } else {
            match self.events_rx.recv_timeout(timeout) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
            }
        };
        while let Some(event) = next {
            if self.consume(event, &mut drained) {
                break;
            }
            next = self.try_next();
        }
        drained
    }

    fn try_next(&self) -> Option<SearchEvent> {
        match self.events_rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Apply one event. Returns true when it ended the active generation.
    fn consume(&mut self, event: SearchEvent, drained: &mut Drained) -> bool {
        if self.active_generation() != Some(event.generation) {
            trace!(generation = event.generation, current = self.generation, "dropping stale search event");
            return false;
        }
        drained.processed = true;
        match event.payload {
            SearchPayload::Match(m) => {
                self.accept(m);
                drained.accepted += 1;
                false
            }
            SearchPayload::Done { key, result } => {
                self.cache.put(key, Arc::clone(&result));
                let intent = self.finish();
                drained.finished = Some((Finished::Done(result), intent));
                true
            }
            SearchPayload::Failed { message } => {
                let intent = self.finish();
                drained.finished = Some((Finished::Failed(message), intent));
                true
            }
        }
    }

    fn accept(&mut self, m: ContentMatch) {
        if let Some(active) = self.active.as_mut() {
            active.partial.entry(m.path.clone()).or_default().push(m);
            active.dirty = true;
        }
    }

    fn finish(&mut self) -> StreamIntent {
        self.active.take().map(|a| a.intent).unwrap_or_default()
    }

    /// Snapshot of the streamed matches, if a partial rebuild is due: there
    /// are unseen matches and the last rebuild is at least one refresh
    /// interval old.
    pub fn take_due_partial(&mut self, now: Instant) -> Option<SearchResult> {
        let interval = self.refresh_interval;
        let active = self.active.as_mut()?;
        if !active.dirty || active.reveal_at.is_some() {
            return None;
        }
        if active
            .last_refresh
            .is_some_and(|last| now.duration_since(last) < interval)
        {
            return None;
        }
        active.dirty = false;
        active.last_refresh = Some(now);
        Some(SearchResult::from_partial(&active.partial, false))
    }

    /// Current streamed matches, regardless of throttling.
    pub fn partial_snapshot(&self) -> SearchResult {
        self.active
            .as_ref()
            .map(|a| SearchResult::from_partial(&a.partial, false))
            .unwrap_or_default()
    }
}
