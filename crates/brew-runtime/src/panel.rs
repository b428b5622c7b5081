#![forbid(unsafe_code)]

//! Panel transition state machine.
//!
//! ```text
//!            request (gated)            out delay               settle delay
//!   Idle(a) ───────────────▶ Out(a→b) ───────────▶ In(a→b) ──────────────▶ Idle(b)
//! ```
//!
//! Only `Idle` accepts a request. The machine itself handles panel classes,
//! the nav highlight, and its own two delays; the session performs the
//! cross-component effects (pour cancel, cue stop, detail entry) around it.
//!
//! # Invariants
//!
//! 1. At most one transition is in flight. A request while in flight, for
//!    the active panel, or for an unmounted panel is rejected without
//!    touching state or scheduling anything.
//! 2. The active panel id changes exactly once per transition, at swap-in.
//! 3. The in-flight flag clears only at settle, `settle` after swap-in.

use std::time::Duration;

use brew_core::scene::{CLASS_ACTIVE, CLASS_ACTIVE_NAV, CLASS_LEAVING, ids};
use brew_core::{Scene, Scheduler, TimerRegistry, TimingConfig};

use crate::action::PanelStep;

/// Which panel is shown, and whether it is changing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelState {
    Idle { active: String },
    TransitioningOut { from: String, to: String },
    TransitioningIn { from: String, to: String },
}

impl PanelState {
    /// The committed active panel. During the out phase this is still the
    /// old panel; the new one is committed at swap-in.
    #[must_use]
    pub fn active(&self) -> &str {
        match self {
            Self::Idle { active } => active,
            Self::TransitioningOut { from, .. } => from,
            Self::TransitioningIn { to, .. } => to,
        }
    }

    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        !matches!(self, Self::Idle { .. })
    }
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InFlight,
    AlreadyActive,
    UnknownPanel,
}

/// Result of a transition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Started { from: String, to: String },
    Rejected(RejectReason),
}

impl TransitionOutcome {
    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

/// Emitted at swap-in, when the new panel becomes active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrival {
    pub from: String,
    pub to: String,
    /// `false` for the home panel.
    pub is_detail: bool,
}

/// Owner of [`PanelState`].
#[derive(Debug)]
pub struct PanelTransitionMachine {
    state: PanelState,
    in_flight: bool,
    panels: Vec<String>,
    timers: TimerRegistry,
    out_delay: Duration,
    settle: Duration,
}

impl PanelTransitionMachine {
    /// `items` are the detail panel ids; the home panel is implicit.
    #[must_use]
    pub fn new<'a>(items: impl IntoIterator<Item = &'a str>, timing: &TimingConfig) -> Self {
        let mut panels = vec![ids::HOME.to_string()];
        panels.extend(items.into_iter().map(str::to_string));
        Self {
            state: PanelState::Idle {
                active: ids::HOME.to_string(),
            },
            in_flight: false,
            panels,
            timers: TimerRegistry::new("panel"),
            out_delay: timing.out_transition(),
            settle: timing.settle(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &PanelState {
        &self.state
    }

    #[must_use]
    pub fn active(&self) -> &str {
        self.state.active()
    }

    /// The gate flag: `true` from acceptance until settle.
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.in_flight
    }

    /// Check whether `target` would be accepted right now.
    pub fn gate(&self, target: &str, scene: &Scene) -> Result<(), RejectReason> {
        if self.in_flight {
            return Err(RejectReason::InFlight);
        }
        if target == self.active() {
            return Err(RejectReason::AlreadyActive);
        }
        if !scene.contains(&ids::panel(target)) || !scene.contains(&ids::panel(self.active())) {
            return Err(RejectReason::UnknownPanel);
        }
        Ok(())
    }

    /// Accept `target` (if the gate allows) and start the out phase.
    pub fn begin<A: From<PanelStep>>(
        &mut self,
        target: &str,
        scheduler: &mut Scheduler<A>,
        scene: &mut Scene,
    ) -> TransitionOutcome {
        if let Err(reason) = self.gate(target, scene) {
            return TransitionOutcome::Rejected(reason);
        }
        let from = self.active().to_string();
        self.in_flight = true;

        if let Some(mut e) = scene.edit(&ids::panel(&from)) {
            e.add_class(CLASS_LEAVING).remove_class(CLASS_ACTIVE);
        }
        self.state = PanelState::TransitioningOut {
            from: from.clone(),
            to: target.to_string(),
        };
        self.timers
            .schedule(scheduler, self.out_delay, PanelStep::SwapIn);
        tracing::info!(target: "brew.panel", from = %from, to = target, "transition started");
        TransitionOutcome::Started {
            from,
            to: target.to_string(),
        }
    }

    /// Apply a fired step. Returns the arrival at swap-in.
    pub fn on_step<A: From<PanelStep>>(
        &mut self,
        step: PanelStep,
        scheduler: &mut Scheduler<A>,
        scene: &mut Scene,
    ) -> Option<Arrival> {
        self.timers.prune(scheduler);
        match (step, &self.state) {
            (PanelStep::SwapIn, PanelState::TransitioningOut { from, to }) => {
                let (from, to) = (from.clone(), to.clone());
                if let Some(mut e) = scene.edit(&ids::panel(&from)) {
                    e.remove_class(CLASS_LEAVING);
                }
                if let Some(mut e) = scene.edit(&ids::panel(&to)) {
                    e.add_class(CLASS_ACTIVE);
                }
                self.highlight_nav(scene, &to);
                self.state = PanelState::TransitioningIn {
                    from: from.clone(),
                    to: to.clone(),
                };
                self.timers
                    .schedule(scheduler, self.settle, PanelStep::Settle);
                tracing::debug!(target: "brew.panel", panel = %to, "panel active");
                Some(Arrival {
                    is_detail: to != ids::HOME,
                    from,
                    to,
                })
            }
            (PanelStep::Settle, PanelState::TransitioningIn { to, .. }) => {
                self.state = PanelState::Idle { active: to.clone() };
                self.in_flight = false;
                tracing::debug!(target: "brew.panel", panel = %self.active(), "transition settled");
                None
            }
            (step, state) => {
                tracing::warn!(target: "brew.panel", ?step, ?state, "panel step out of sequence");
                None
            }
        }
    }

    /// Move the nav highlight to `active`.
    pub fn highlight_nav(&self, scene: &mut Scene, active: &str) {
        for panel in &self.panels {
            let on = panel == active;
            if let Some(mut e) = scene.edit(&ids::nav_button(panel)) {
                e.toggle_class(CLASS_ACTIVE_NAV, on)
                    .attr("fill", if on { "#1a1a2e" } else { "#c8a97e" })
                    .attr("font-weight", if on { "600" } else { "500" });
            }
        }
    }

    /// Drop pending steps and settle on the committed panel.
    pub fn teardown<A>(&mut self, scheduler: &mut Scheduler<A>) {
        self.timers.cancel_all(scheduler);
        let active = self.active().to_string();
        self.state = PanelState::Idle { active };
        self.in_flight = false;
    }
}
