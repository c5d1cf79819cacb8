//! Rate-limited priority queue for generation-like work.
//!
//! Decouples request admission from execution: callers enqueue work and the
//! queue decides when admission is allowed. Admission is strictly
//! one-at-a-time — only one item may be `Processing` at any moment
//! regardless of the remaining token budget, so the shared budget is never
//! over-spent by concurrent consumers.

pub mod item;

pub use item::{QueueItem, QueueItemStatus, RequestKind};

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default requests-per-window budget
const DEFAULT_MAX_PER_WINDOW: u32 = 60;

/// Process-wide token budget snapshot.
///
/// `remaining` is stored exactly as reported by the external signal
/// (typically a provider's response headers) and clamped only at the
/// admission boundary. Not persisted; a cold start begins with a full
/// budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitState {
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
    pub max_per_window: u32,
}

impl RateLimitState {
    pub fn new(max_per_window: u32) -> Self {
        Self {
            remaining: i64::from(max_per_window),
            reset_at: Utc::now(),
            max_per_window,
        }
    }

    /// Budget visible to the admission check: clamped to
    /// `[0, max_per_window]`, and restored to the full window once
    /// `reset_at` has passed.
    pub fn effective_remaining(&self) -> u32 {
        if Utc::now() >= self.reset_at {
            self.max_per_window
        } else {
            self.remaining.clamp(0, i64::from(self.max_per_window)) as u32
        }
    }
}

impl Default for RateLimitState {
    fn default() -> Self {
        RateLimitState::new(DEFAULT_MAX_PER_WINDOW)
    }
}

/// Queue composition, recomputed from the item collection on every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Result of [`RequestQueue::queued_mutate`]: either the operation ran to
/// completion, or admission was denied and the item is waiting in the queue.
#[derive(Debug)]
pub enum QueuedOutcome<T> {
    Completed { id: String, value: T },
    Deferred { id: String },
}

struct QueueState {
    items: Vec<QueueItem>,
    rate_limit: RateLimitState,
    busy: bool,
}

/// In-process queue of pending/active/finished requests sharing one token
/// budget.
///
/// All mutable state lives behind a single mutex so the "at most one
/// `Processing` item" invariant holds under real parallelism. The lock is
/// never held across an await point.
pub struct RequestQueue {
    state: Mutex<QueueState>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::with_rate_limit(RateLimitState::default())
    }

    pub fn with_rate_limit(rate_limit: RateLimitState) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: Vec::new(),
                rate_limit,
                busy: false,
            }),
        }
    }

    /// Create a new `Queued` item and return its id.
    ///
    /// Does not start execution. The collection is kept sorted by descending
    /// priority; the sort is stable, so equal-priority items keep their
    /// arrival order.
    pub fn add_to_queue(
        &self,
        kind: RequestKind,
        priority: i32,
        metadata: Option<HashMap<String, String>>,
    ) -> String {
        let item = QueueItem::new(kind, priority, metadata.unwrap_or_default());
        let id = item.id.clone();

        let mut state = self.lock();
        state.items.push(item);
        state.items.sort_by(|a, b| b.priority.cmp(&a.priority));

        debug!("Queued {} ({:?}, priority {})", id, kind, priority);
        id
    }

    /// Highest-priority item still `Queued`, without mutating anything.
    pub fn get_next_in_queue(&self) -> Option<QueueItem> {
        let state = self.lock();
        state.items.iter().find(|item| item.is_queued()).cloned()
    }

    /// The sole admission gate: budget left and nothing in flight.
    pub fn can_process(&self) -> bool {
        let state = self.lock();
        state.rate_limit.effective_remaining() > 0 && !state.busy
    }

    /// `Queued -> Processing`; marks the queue busy.
    ///
    /// Calling this on an unknown id or an item in any other state is a
    /// caller bug; it is logged and ignored.
    pub fn start_processing(&self, id: &str) {
        let mut guard = self.lock();
        let state = &mut *guard;
        match state.items.iter_mut().find(|item| item.id == id) {
            Some(item) if item.is_queued() => {
                item.start();
                state.busy = true;
                debug!("Started processing {}", id);
            }
            Some(item) => warn!(
                "start_processing called on {} in state {:?}, ignoring",
                id, item.status
            ),
            None => warn!("start_processing called on unknown item {}, ignoring", id),
        }
    }

    /// Terminal transition: `Failed` when `error` is non-empty, else
    /// `Completed`. The busy flag is cleared unconditionally, even when the
    /// id was bogus.
    pub fn complete_processing(&self, id: &str, error: Option<String>) {
        let mut guard = self.lock();
        let state = &mut *guard;
        match state.items.iter_mut().find(|item| item.id == id) {
            Some(item) if item.is_processing() => {
                item.complete(error);
                debug!("Finished {} as {:?}", id, item.status);
            }
            Some(item) => warn!(
                "complete_processing called on {} in state {:?}, ignoring",
                id, item.status
            ),
            None => warn!("complete_processing called on unknown item {}, ignoring", id),
        }
        state.busy = false;
    }

    /// Overwrite the budget snapshot from an external signal.
    ///
    /// The counter is never decremented by this process's own bookkeeping;
    /// admission trusts the external signal plus the busy flag.
    pub fn update_rate_limit(&self, remaining: i64, reset_at: DateTime<Utc>) {
        let mut state = self.lock();
        state.rate_limit.remaining = remaining;
        state.rate_limit.reset_at = reset_at;
        debug!("Rate limit updated: {} remaining until {}", remaining, reset_at);
    }

    /// Current budget snapshot.
    pub fn rate_limit(&self) -> RateLimitState {
        self.lock().rate_limit.clone()
    }

    /// Purge all terminal items; queued/processing items are untouched.
    pub fn clear_completed(&self) {
        let mut state = self.lock();
        let before = state.items.len();
        state.items.retain(|item| !item.is_terminal());
        debug!("Cleared {} finished items", before - state.items.len());
    }

    pub fn get_item(&self, id: &str) -> Option<QueueItem> {
        let state = self.lock();
        state.items.iter().find(|item| item.id == id).cloned()
    }

    /// All items in priority order.
    pub fn items(&self) -> Vec<QueueItem> {
        self.lock().items.clone()
    }

    /// Counts projected over the item collection.
    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        let mut stats = QueueStats::default();
        for item in &state.items {
            match item.status {
                QueueItemStatus::Queued => stats.queued += 1,
                QueueItemStatus::Processing => stats.processing += 1,
                QueueItemStatus::Completed => stats.completed += 1,
                QueueItemStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub fn queued_count(&self) -> usize {
        self.stats().queued
    }

    pub fn processing_count(&self) -> usize {
        self.stats().processing
    }

    pub fn completed_count(&self) -> usize {
        self.stats().completed
    }

    pub fn failed_count(&self) -> usize {
        self.stats().failed
    }

    /// Wire an arbitrary async operation into queue bookkeeping.
    ///
    /// The item id is booked before anything runs, so the caller always gets
    /// a tracking handle. When admission is currently denied the operation
    /// is not executed and the item stays `Queued` for a later driver; this
    /// function never waits for admission itself. An operation error is
    /// re-raised to the caller after the item is marked `Failed`.
    pub async fn queued_mutate<T, F, Fut>(
        &self,
        kind: RequestKind,
        priority: i32,
        metadata: Option<HashMap<String, String>>,
        op: F,
    ) -> Result<QueuedOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let id = self.add_to_queue(kind, priority, metadata);

        if !self.try_start(&id) {
            debug!("Admission denied for {}, leaving it queued", id);
            return Ok(QueuedOutcome::Deferred { id });
        }

        match op().await {
            Ok(value) => {
                self.complete_processing(&id, None);
                Ok(QueuedOutcome::Completed { id, value })
            }
            Err(e) => {
                self.complete_processing(&id, Some(format!("{:#}", e)));
                Err(e)
            }
        }
    }

    /// Atomically re-check admission and start the item; the check and the
    /// transition share one lock acquisition so two concurrent callers can
    /// never both be admitted.
    fn try_start(&self, id: &str) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;

        if state.busy || state.rate_limit.effective_remaining() == 0 {
            return false;
        }

        match state.items.iter_mut().find(|item| item.id == id) {
            Some(item) if item.is_queued() => {
                item.start();
                state.busy = true;
                debug!("Started processing {}", id);
                true
            }
            _ => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        RequestQueue::new()
    }
}
