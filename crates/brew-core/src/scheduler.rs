#![forbid(unsafe_code)]

//! Deterministic virtual-time scheduler.
//!
//! A [`Scheduler`] owns a monotonic virtual clock and a queue of delayed
//! actions. Actions are plain values (usually an enum of steps) rather than
//! closures, so the owner dispatches them through its own `update` path and
//! every delayed mutation stays inspectable.
//!
//! # Invariants
//!
//! 1. Actions are delivered in `(due, issue order)` order. Two actions due at
//!    the same instant fire in the order they were scheduled.
//! 2. A handle cancelled before it is popped is never delivered. Cancellation
//!    is exact up to the instant of firing, because popping and cancelling
//!    happen on the same timeline.
//! 3. The clock never moves backwards.
//!
//! # Failure Modes
//!
//! - Cancelling an unknown or already-fired handle returns `false` (no-op).
//! - Delays that would overflow the clock saturate at `Duration::MAX`.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

/// Opaque handle for a scheduled action.
///
/// Handles are issued in strictly increasing order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Raw identifier, useful for log correlation.
    #[inline]
    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    due: Duration,
    handle: TimerHandle,
}

/// Virtual clock plus delayed-action queue.
pub struct Scheduler<A> {
    now: Duration,
    queue: BinaryHeap<Reverse<Slot>>,
    pending: HashMap<TimerHandle, A>,
    next_id: u64,
    fired_total: u64,
    cancelled_total: u64,
}

impl<A> std::fmt::Debug for Scheduler<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("pending", &self.pending.len())
            .field("fired_total", &self.fired_total)
            .field("cancelled_total", &self.cancelled_total)
            .finish()
    }
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Scheduler<A> {
    /// Create a scheduler with the clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
            next_id: 1,
            fired_total: 0,
            cancelled_total: 0,
        }
    }

    /// Current virtual time.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `action` to fire `delay` after the current time.
    pub fn schedule(&mut self, delay: Duration, action: A) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        let due = self.now.saturating_add(delay);
        self.queue.push(Reverse(Slot { due, handle }));
        self.pending.insert(handle, action);
        tracing::trace!(
            target: "brew.timer",
            id = handle.0,
            delay_ms = delay.as_millis() as u64,
            due_ms = due.as_millis() as u64,
            "timer scheduled"
        );
        handle
    }

    /// Cancel a pending action. Returns `true` if it was still pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let removed = self.pending.remove(&handle).is_some();
        if removed {
            self.cancelled_total += 1;
            tracing::trace!(target: "brew.timer", id = handle.0, "timer cancelled");
        }
        removed
    }

    /// Whether `handle` is still waiting to fire.
    #[inline]
    #[must_use]
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    /// Number of actions still waiting to fire.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Total actions delivered since construction.
    #[must_use]
    pub fn fired_total(&self) -> u64 {
        self.fired_total
    }

    /// Total actions cancelled since construction.
    #[must_use]
    pub fn cancelled_total(&self) -> u64 {
        self.cancelled_total
    }

    /// Due time of the earliest live action, if any.
    pub fn next_due(&mut self) -> Option<Duration> {
        while let Some(Reverse(slot)) = self.queue.peek() {
            if self.pending.contains_key(&slot.handle) {
                return Some(slot.due);
            }
            // Tombstone left behind by `cancel`.
            self.queue.pop();
        }
        None
    }

    /// Pop the earliest live action due at or before `until`.
    ///
    /// Moves the clock forward to the action's due time. Returns `None` once
    /// nothing is due; the caller then settles the clock with
    /// [`advance_clock`](Self::advance_clock).
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerHandle, A)> {
        loop {
            let Reverse(slot) = *self.queue.peek()?;
            if slot.due > until {
                return None;
            }
            self.queue.pop();
            if let Some(action) = self.pending.remove(&slot.handle) {
                self.now = self.now.max(slot.due);
                self.fired_total += 1;
                return Some((slot.handle, action));
            }
        }
    }

    /// Move the clock forward to `t`. Earlier values are ignored.
    pub fn advance_clock(&mut self, t: Duration) {
        self.now = self.now.max(t);
    }

    /// Drop every pending action without delivering it.
    pub fn clear(&mut self) {
        self.cancelled_total += self.pending.len() as u64;
        self.pending.clear();
        self.queue.clear();
    }
}
