//! Externally visible source set.
//!
//! The feed is what a sources panel renders: the latest snapshot of the
//! newest pipeline run. Observers subscribe to a `watch` channel and get
//! copies. Starting a run supersedes the previous one; snapshots from a
//! superseded run are dropped.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::scheduler::Scheduler;
use crate::types::ScrapedSource;

/// Identifier of one pipeline run
pub type RunId = u64;

/// One snapshot emitted by a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSnapshot {
    pub run_id: RunId,
    /// 1-based position within the run
    pub sequence: usize,
    pub sources: Vec<ScrapedSource>,
}

/// What the panel currently shows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedState {
    pub run_id: Option<RunId>,
    pub sources: Vec<ScrapedSource>,
}

impl FeedState {
    pub fn is_visible(&self) -> bool {
        !self.sources.is_empty()
    }
}

/// Handle on a started run; cancelled once a newer run begins
#[derive(Debug, Clone)]
pub struct RunHandle {
    id: RunId,
    token: CancellationToken,
}

impl RunHandle {
    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Receives snapshots as a pipeline run progresses
pub trait SnapshotSink: Send {
    fn emit(&mut self, snapshot: SourceSnapshot);
}

impl SnapshotSink for Vec<SourceSnapshot> {
    fn emit(&mut self, snapshot: SourceSnapshot) {
        self.push(snapshot);
    }
}

impl SnapshotSink for tokio::sync::mpsc::UnboundedSender<SourceSnapshot> {
    fn emit(&mut self, snapshot: SourceSnapshot) {
        // A dropped receiver just means nobody is watching
        let _ = self.send(snapshot);
    }
}

#[derive(Debug, Default)]
struct FeedInner {
    last_run: RunId,
    active: Option<RunHandle>,
    cleanup: Option<CancellationToken>,
}

/// Shared, cloneable source feed
#[derive(Clone)]
pub struct SourceFeed {
    tx: Arc<watch::Sender<FeedState>>,
    inner: Arc<Mutex<FeedInner>>,
}

impl Default for SourceFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFeed {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(FeedState::default());
        Self {
            tx: Arc::new(tx),
            inner: Arc::new(Mutex::new(FeedInner::default())),
        }
    }

    /// Watch the visible source set
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.tx.subscribe()
    }

    /// Copy of the visible source set
    pub fn current(&self) -> FeedState {
        self.tx.borrow().clone()
    }

    /// Start a new run, superseding the previous run and any pending cleanup
    pub fn begin_run(&self) -> RunHandle {
        let mut inner = self.inner.lock();
        if let Some(previous) = inner.active.take() {
            if !previous.is_cancelled() {
                debug!(run_id = previous.id, "Superseding source run");
            }
            previous.token.cancel();
        }
        if let Some(cleanup) = inner.cleanup.take() {
            cleanup.cancel();
        }

        inner.last_run += 1;
        let handle = RunHandle {
            id: inner.last_run,
            token: CancellationToken::new(),
        };
        inner.active = Some(handle.clone());
        handle
    }

    /// Whether `run_id` is the newest, uncancelled run
    pub fn is_current(&self, run_id: RunId) -> bool {
        let inner = self.inner.lock();
        matches!(&inner.active, Some(active) if active.id == run_id && !active.is_cancelled())
    }

    /// Publish a snapshot; stale runs are ignored
    pub fn publish(&self, run_id: RunId, sources: &[ScrapedSource]) -> bool {
        // Held across the send so a concurrent begin_run cannot interleave
        let inner = self.inner.lock();
        if !matches!(&inner.active, Some(active) if active.id == run_id && !active.is_cancelled()) {
            debug!(run_id, "Dropping snapshot from superseded run");
            return false;
        }
        self.tx.send_replace(FeedState {
            run_id: Some(run_id),
            sources: sources.to_vec(),
        });
        true
    }

    /// Clear the feed after `window` unless a newer run begins or the feed is
    /// closed first. Re-arming replaces a pending cleanup.
    pub fn arm_cleanup(&self, run_id: RunId, window: Duration, scheduler: Arc<dyn Scheduler>) {
        let token = {
            let mut inner = self.inner.lock();
            if !matches!(&inner.active, Some(active) if active.id == run_id) {
                return;
            }
            if let Some(previous) = inner.cleanup.take() {
                previous.cancel();
            }
            let token = CancellationToken::new();
            inner.cleanup = Some(token.clone());
            token
        };

        let feed = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = scheduler.sleep(window) => {
                    feed.expire(run_id);
                }
            }
        });
        debug!(run_id, window_ms = window.as_millis() as u64, "Source cleanup armed");
    }

    /// Hide the panel now and drop any pending cleanup
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if let Some(cleanup) = inner.cleanup.take() {
            cleanup.cancel();
        }
        self.tx.send_replace(FeedState::default());
    }

    fn expire(&self, run_id: RunId) {
        let mut inner = self.inner.lock();
        if !matches!(&inner.active, Some(active) if active.id == run_id) {
            return;
        }
        inner.cleanup = None;
        self.tx.send_replace(FeedState::default());
        debug!(run_id, "Source feed cleared after quiescence");
    }
}
