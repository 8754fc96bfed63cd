//! Index manager: owns the current [`PromptStructure`] and decides when to rebuild it.
//!
//! # Design
//!
//! - At most one build runs per index. A build is a spawned task whose result
//!   is exposed as a shared future, so concurrent callers join it instead of
//!   scanning again.
//! - Invalidations bump a generation counter. A build only installs its
//!   snapshot if no invalidation happened while it ran; a build started before
//!   the latest invalidation is never joined by new requests.
//! - [`PromptIndex::invalidate`] (re)starts a debounce timer. A burst of
//!   invalidations inside the quiet period produces exactly one build. When
//!   the timer elapses while an older build is still running, the rebuild
//!   becomes "due" and starts as soon as that build finishes.
//! - Any request that needs a snapshot now ([`PromptIndex::get_structure`],
//!   [`PromptIndex::build`], [`PromptIndex::rebuild_now`]) absorbs a pending
//!   debounce: the timer is cancelled and the debounce waiters resolve with
//!   the build that replaced it.
//! - Build failures never reach callers. They are logged and the canonical
//!   empty structure is installed instead.
//!
//! The state mutex is never held across an `.await`.

use crate::config::{IndexConfig, ScanOptions};
use crate::error::Result;
use crate::fs::{FileAccess, LocalFileAccess};
use crate::organizer::organize;
use crate::root::{FixedRoot, RootResolver};
use crate::types::PromptStructure;
use crate::walker::{scan_existing, ScanScope};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Resolves with the snapshot produced by a build.
pub type RefreshFuture = Shared<BoxFuture<'static, Arc<PromptStructure>>>;

/// Why a build ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshReason {
    /// First build of an index that had no snapshot
    Initial,
    /// Explicit request (refresh command, forced rebuild)
    Manual,
    /// Filesystem change notification
    FileChange,
}

/// Broadcast once per completed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRefreshed {
    pub reason: RefreshReason,
}

/// Observable state of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    /// No snapshot and nothing scheduled
    Empty,
    /// A build is running
    Building,
    /// A snapshot is cached
    Ready,
    /// Invalidated, rebuild waiting for the debounce timer
    PendingDebounce,
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub builds_started: u64,
    pub builds_failed: u64,
    pub notifications_sent: u64,
}

struct InFlight {
    id: u64,
    generation: u64,
    result: RefreshFuture,
}

struct PendingRebuild {
    reason: RefreshReason,
    timer_id: u64,
    /// `None` once the timer elapsed (or was overridden) while a stale build ran
    timer: Option<JoinHandle<()>>,
    waiters: oneshot::Sender<Arc<PromptStructure>>,
    completion: RefreshFuture,
}

impl PendingRebuild {
    fn new(reason: RefreshReason) -> Self {
        let (waiters, rx) = oneshot::channel::<Arc<PromptStructure>>();
        let completion = async move {
            rx.await
                .unwrap_or_else(|_| Arc::new(PromptStructure::empty()))
        }
        .boxed()
        .shared();
        Self {
            reason,
            timer_id: 0,
            timer: None,
            waiters,
            completion,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct IndexState {
    snapshot: Option<Arc<PromptStructure>>,
    generation: u64,
    in_flight: Option<InFlight>,
    pending: Option<PendingRebuild>,
    next_build_id: u64,
    next_timer_id: u64,
}

impl IndexState {
    fn phase(&self) -> IndexPhase {
        if self.in_flight.is_some() {
            IndexPhase::Building
        } else if self.pending.is_some() {
            IndexPhase::PendingDebounce
        } else if self.snapshot.is_some() {
            IndexPhase::Ready
        } else {
            IndexPhase::Empty
        }
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.snapshot = None;
    }
}

#[derive(Default)]
struct Counters {
    builds_started: AtomicU64,
    builds_failed: AtomicU64,
    notifications_sent: AtomicU64,
}

struct Inner {
    fs: Arc<dyn FileAccess>,
    resolver: Arc<dyn RootResolver>,
    scope: ScanScope,
    debounce: Duration,
    read_concurrency: usize,
    state: Mutex<IndexState>,
    events: broadcast::Sender<IndexRefreshed>,
    counters: Counters,
}

/// Cached, self-refreshing index of one prompt tree.
///
/// Cloning is cheap and every clone shares the same snapshot. All methods
/// must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct PromptIndex {
    inner: Arc<Inner>,
}

impl PromptIndex {
    /// Fails only when the configured exclude patterns are invalid.
    pub fn new(
        fs: Arc<dyn FileAccess>,
        resolver: Arc<dyn RootResolver>,
        config: IndexConfig,
    ) -> Result<Self> {
        let scope = ScanScope::new(config.scan.clone())?;
        let (events, _) = broadcast::channel(config.notify_capacity.max(1));
        Ok(Self {
            inner: Arc::new(Inner {
                fs,
                resolver,
                scope,
                debounce: config.debounce(),
                read_concurrency: config.read_concurrency.max(1),
                state: Mutex::new(IndexState::default()),
                events,
                counters: Counters::default(),
            }),
        })
    }

    /// Index a fixed directory on the local disk.
    pub fn local(root: impl Into<PathBuf>, config: IndexConfig) -> Result<Self> {
        Self::new(
            Arc::new(LocalFileAccess),
            Arc::new(FixedRoot::new(root)),
            config,
        )
    }

    /// Cached snapshot if ready, otherwise build (or join the running build).
    pub async fn get_structure(&self) -> Arc<PromptStructure> {
        let refresh = {
            let mut state = self.inner.lock();
            if let Some(snapshot) = &state.snapshot {
                return Arc::clone(snapshot);
            }
            self.inner.request_build(&mut state, RefreshReason::Initial)
        };
        refresh.await
    }

    /// Scan now, joining a build that is already running for the current state.
    pub async fn build(&self) -> Arc<PromptStructure> {
        let refresh = {
            let mut state = self.inner.lock();
            self.inner.request_build(&mut state, RefreshReason::Manual)
        };
        refresh.await
    }

    /// Drop the cached snapshot and schedule a debounced rebuild.
    ///
    /// Calls within the debounce window restart the timer and share one
    /// rebuild. The returned future resolves with that rebuild's snapshot and
    /// may be dropped. If [`PromptIndex::shutdown`] cancels the rebuild first,
    /// it resolves with an empty structure that is never installed.
    pub fn invalidate(&self, reason: RefreshReason) -> RefreshFuture {
        let mut state = self.inner.lock();
        state.invalidate();
        let generation = state.generation;

        let timer_id = state.next_timer_id + 1;
        state.next_timer_id = timer_id;

        let pending = state
            .pending
            .get_or_insert_with(|| PendingRebuild::new(reason));
        pending.reason = reason;

        // A due rebuild already covers this change and starts with the next free slot
        let due = pending.timer.is_none() && pending.timer_id != 0;
        if !due {
            pending.cancel_timer();
            pending.timer_id = timer_id;
            pending.timer = Some(tokio::spawn(debounce_timer(
                Arc::downgrade(&self.inner),
                timer_id,
                self.inner.debounce,
            )));
        }
        debug!(?reason, generation, "Index invalidated");
        pending.completion.clone()
    }

    /// Debounced rebuild; resolves once the rebuilt snapshot is installed.
    ///
    /// A [`PromptIndex::shutdown`] inside the debounce window resolves it with
    /// an empty structure instead, and nothing is installed.
    pub async fn rebuild(&self, reason: RefreshReason) -> Arc<PromptStructure> {
        self.invalidate(reason).await
    }

    /// Invalidate and rebuild immediately, superseding any pending debounce.
    pub async fn rebuild_now(&self, reason: RefreshReason) -> Arc<PromptStructure> {
        let refresh = {
            let mut state = self.inner.lock();
            state.invalidate();
            if let Some(pending) = state.pending.as_mut() {
                pending.reason = reason;
            }
            self.inner.request_build(&mut state, reason)
        };
        refresh.await
    }

    pub fn scan_options(&self) -> &ScanOptions {
        self.inner.scope.options()
    }

    /// Subscribe to refresh notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<IndexRefreshed> {
        self.inner.events.subscribe()
    }

    /// The cached snapshot without triggering a build.
    pub fn cached(&self) -> Option<Arc<PromptStructure>> {
        self.inner.lock().snapshot.clone()
    }

    pub fn phase(&self) -> IndexPhase {
        self.inner.lock().phase()
    }

    pub fn stats(&self) -> IndexStats {
        let c = &self.inner.counters;
        IndexStats {
            builds_started: c.builds_started.load(Ordering::SeqCst),
            builds_failed: c.builds_failed.load(Ordering::SeqCst),
            notifications_sent: c.notifications_sent.load(Ordering::SeqCst),
        }
    }

    /// Cancel a pending debounce timer. A running build still completes.
    ///
    /// Waiters of the cancelled rebuild resolve with an empty structure.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        if let Some(mut pending) = state.pending.take() {
            pending.cancel_timer();
            debug!("Pending rebuild cancelled by shutdown");
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, IndexState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Join the current build, queue behind a stale one, or start a new one.
    fn request_build(
        self: &Arc<Self>,
        state: &mut IndexState,
        reason: RefreshReason,
    ) -> RefreshFuture {
        if let Some(in_flight) = &state.in_flight {
            if in_flight.generation == state.generation {
                return in_flight.result.clone();
            }
            // The running build predates the latest invalidation
            let pending = state
                .pending
                .get_or_insert_with(|| PendingRebuild::new(reason));
            pending.cancel_timer();
            if pending.timer_id == 0 {
                state.next_timer_id += 1;
                pending.timer_id = state.next_timer_id;
            }
            return pending.completion.clone();
        }

        let reason = state.pending.as_ref().map(|p| p.reason).unwrap_or(reason);
        self.start_build(state, reason)
    }

    fn start_build(
        self: &Arc<Self>,
        state: &mut IndexState,
        reason: RefreshReason,
    ) -> RefreshFuture {
        let waiters = state.pending.take().map(|mut pending| {
            pending.cancel_timer();
            pending.waiters
        });

        state.next_build_id += 1;
        let id = state.next_build_id;
        let generation = state.generation;
        self.counters.builds_started.fetch_add(1, Ordering::SeqCst);
        debug!(build_id = id, generation, ?reason, "Starting index build");

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(inner.produce()).catch_unwind().await;
            let structure = match outcome {
                Ok(Ok(structure)) => structure,
                Ok(Err(e)) => {
                    warn!(build_id = id, error = %e, "Index build failed, using empty structure");
                    inner.counters.builds_failed.fetch_add(1, Ordering::SeqCst);
                    PromptStructure::empty()
                }
                Err(_) => {
                    error!(build_id = id, "Index build panicked, using empty structure");
                    inner.counters.builds_failed.fetch_add(1, Ordering::SeqCst);
                    PromptStructure::empty()
                }
            };
            inner.finish_build(id, generation, reason, Arc::new(structure), waiters)
        });

        let result = async move {
            match handle.await {
                Ok(structure) => structure,
                Err(e) => {
                    error!(build_id = id, error = %e, "Index build task did not complete");
                    Arc::new(PromptStructure::empty())
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight = Some(InFlight {
            id,
            generation,
            result: result.clone(),
        });
        result
    }

    fn finish_build(
        self: &Arc<Self>,
        id: u64,
        generation: u64,
        reason: RefreshReason,
        structure: Arc<PromptStructure>,
        waiters: Option<oneshot::Sender<Arc<PromptStructure>>>,
    ) -> Arc<PromptStructure> {
        let mut state = self.lock();
        if state.in_flight.as_ref().map(|b| b.id) == Some(id) {
            state.in_flight = None;
        }

        if state.generation == generation {
            state.snapshot = Some(Arc::clone(&structure));
            info!(
                build_id = id,
                ?reason,
                folders = structure.folders.len(),
                prompts = structure.prompt_count(),
                "Prompt index ready"
            );
        } else {
            debug!(build_id = id, "Index changed during build, snapshot not cached");
        }

        // Receivers may all be gone; that is not an error
        let _ = self.events.send(IndexRefreshed { reason });
        self.counters.notifications_sent.fetch_add(1, Ordering::SeqCst);

        if let Some(waiters) = waiters {
            let _ = waiters.send(Arc::clone(&structure));
        }

        let due = state
            .pending
            .as_ref()
            .map(|p| p.timer.is_none())
            .unwrap_or(false);
        if due {
            let next_reason = state
                .pending
                .as_ref()
                .map(|p| p.reason)
                .unwrap_or(RefreshReason::FileChange);
            // Waiters hold the pending completion; the handle is not needed here
            let _ = self.start_build(&mut state, next_reason);
        }

        structure
    }

    async fn produce(&self) -> Result<PromptStructure> {
        let Some(root) = self.resolver.resolve() else {
            debug!("No prompt root available");
            return Ok(PromptStructure::empty());
        };
        if !self.fs.exists(&root).await {
            debug!(root = %root.display(), "Prompt root does not exist");
            return Ok(PromptStructure::empty());
        }

        let records =
            scan_existing(self.fs.as_ref(), &root, &self.scope, self.read_concurrency).await?;
        organize(records, &root, self.fs.as_ref(), &self.scope).await
    }

    fn timer_elapsed(self: &Arc<Self>, timer_id: u64) {
        let mut state = self.lock();
        match state.pending.as_mut() {
            Some(pending) if pending.timer_id == timer_id && pending.timer.is_some() => {
                pending.timer = None;
            }
            _ => return,
        }

        if state.in_flight.is_none() {
            let reason = state
                .pending
                .as_ref()
                .map(|p| p.reason)
                .unwrap_or(RefreshReason::FileChange);
            let _ = self.start_build(&mut state, reason);
        } else {
            debug!("Debounce elapsed during a build, rebuilding after it finishes");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pending) = state.pending.as_mut() {
            pending.cancel_timer();
        }
    }
}

async fn debounce_timer(inner: Weak<Inner>, timer_id: u64, delay: Duration) {
    tokio::time::sleep(delay).await;
    if let Some(inner) = inner.upgrade() {
        inner.timer_elapsed(timer_id);
    }
}
