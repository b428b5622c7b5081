#![forbid(unsafe_code)]

//! Timer scopes over a [`Scheduler`].
//!
//! A [`TimerRegistry`] collects the handles one component issues so they can
//! be retracted together. A [`PendingTimer`] is the single-slot variant for
//! debounces and delayed triggers where at most one action may be armed.
//!
//! # Invariants
//!
//! 1. After [`TimerRegistry::cancel_all`] returns, no handle the registry
//!    issued can fire, and the registry is empty.
//! 2. `cancel_all` on an empty registry is a no-op returning 0.
//! 3. Arming a [`PendingTimer`] cancels whatever it held before.

use std::time::Duration;

use crate::scheduler::{Scheduler, TimerHandle};

/// A named set of live timer handles that can be cancelled atomically.
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry {
    scope: &'static str,
    handles: Vec<TimerHandle>,
}

impl TimerRegistry {
    /// Create an empty registry. `scope` is used only for logging.
    #[must_use]
    pub fn new(scope: &'static str) -> Self {
        Self {
            scope,
            handles: Vec::new(),
        }
    }

    /// Scope name given at construction.
    #[must_use]
    pub fn scope(&self) -> &'static str {
        self.scope
    }

    /// Schedule an action and track its handle.
    pub fn schedule<A>(
        &mut self,
        scheduler: &mut Scheduler<A>,
        delay: Duration,
        action: impl Into<A>,
    ) -> TimerHandle {
        let handle = scheduler.schedule(delay, action.into());
        self.handles.push(handle);
        handle
    }

    /// Cancel every tracked handle and clear the registry.
    ///
    /// Returns how many handles were still pending.
    pub fn cancel_all<A>(&mut self, scheduler: &mut Scheduler<A>) -> usize {
        if self.handles.is_empty() {
            return 0;
        }
        let cancelled = self
            .handles
            .drain(..)
            .filter(|h| scheduler.cancel(*h))
            .count();
        tracing::debug!(
            target: "brew.timer",
            scope = self.scope,
            cancelled,
            "timer scope cancelled"
        );
        cancelled
    }

    /// Forget handles that have already fired or been cancelled elsewhere.
    pub fn prune<A>(&mut self, scheduler: &Scheduler<A>) {
        self.handles.retain(|h| scheduler.is_pending(*h));
    }

    /// Number of tracked handles that are still pending.
    #[must_use]
    pub fn live_count<A>(&self, scheduler: &Scheduler<A>) -> usize {
        self.handles
            .iter()
            .filter(|h| scheduler.is_pending(**h))
            .count()
    }

    /// Number of tracked handles, fired or not.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether nothing is tracked.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// A single optional timer slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingTimer(Option<TimerHandle>);

impl PendingTimer {
    /// An empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self(None)
    }

    /// Arm the slot, cancelling any previously armed action.
    pub fn arm<A>(
        &mut self,
        scheduler: &mut Scheduler<A>,
        delay: Duration,
        action: impl Into<A>,
    ) -> TimerHandle {
        self.cancel(scheduler);
        let handle = scheduler.schedule(delay, action.into());
        self.0 = Some(handle);
        handle
    }

    /// Cancel the armed action. Returns `true` if one was still pending.
    pub fn cancel<A>(&mut self, scheduler: &mut Scheduler<A>) -> bool {
        self.0.take().is_some_and(|h| scheduler.cancel(h))
    }

    /// Clear the slot if `fired` is the handle it holds.
    ///
    /// Returns `true` when the fired action belongs to this slot; a stale
    /// handle leaves the slot untouched.
    pub fn settle(&mut self, fired: TimerHandle) -> bool {
        if self.0 == Some(fired) {
            self.0 = None;
            true
        } else {
            false
        }
    }

    /// Whether the slot holds an action that has not fired yet.
    #[must_use]
    pub fn is_armed<A>(&self, scheduler: &Scheduler<A>) -> bool {
        self.0.is_some_and(|h| scheduler.is_pending(h))
    }

    /// The held handle, if any.
    #[must_use]
    pub fn handle(&self) -> Option<TimerHandle> {
        self.0
    }
}
