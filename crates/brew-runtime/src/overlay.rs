#![forbid(unsafe_code)]

//! Expanded-card hover overlay.
//!
//! A magnified copy of a summary card, shown while the pointer rests on the
//! card or on the copy itself. Leaving a card is debounced so the pointer can
//! travel into the overlay; leaving the overlay hides at once and detaches
//! after the fade-out.
//!
//! # State Machine
//!
//! ```text
//!                 enter card X (X != source)
//!   Hidden ───────────────────────────────────────▶ Shown(X)
//!     ▲                                              │    ▲
//!     │ leave overlay / hide delay fires             │    │ enter overlay or
//!     └──────────────────────────────────────────────┘    │ enter X again
//!                                                  leave X (not into overlay)
//!                                                         └──▶ Shown(X) + hide armed
//! ```
//!
//! # Invariants
//!
//! 1. The overlay content and `source_card` change together: the copy
//!    shown is always the copy of the tracked source.
//! 2. Every reveal bumps a generation counter. A frame or detach step whose
//!    generation is stale is dropped, so a late step from an earlier show
//!    can never touch the current one.
//! 3. At most one hide delay is armed.

use std::time::Duration;

use brew_core::scene::{CLASS_VISIBLE, ids};
use brew_core::{
    Animated, CardContent, Easing, OverlayConfig, PendingTimer, Property, Scene, Scheduler,
    TimerHandle, Transition,
};

use crate::action::OverlayStep;

/// Bar fill animation inside the copy.
pub const BAR_FILL: Transition = Transition::millis(600, Easing::EaseOut);

/// Where the pointer went (or came from), as resolved by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    /// The overlay or any element inside it.
    Overlay,
    /// A summary card.
    Card(String),
    /// Anything else, including leaving the window.
    Elsewhere,
}

impl PointerTarget {
    fn is_overlay(&self) -> bool {
        matches!(self, Self::Overlay)
    }
}

/// Snapshot of the overlay's externally meaningful state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayState {
    pub source_card: Option<String>,
    pub visible: bool,
    pub pending_hide: Option<TimerHandle>,
}

/// The hover overlay controller.
#[derive(Debug)]
pub struct ExpandedCardOverlay {
    source_card: Option<String>,
    visible: bool,
    attached: bool,
    content: Option<CardContent>,
    bars: Vec<Animated>,
    transitions_enabled: bool,
    generation: u64,
    pending_hide: PendingTimer,
    frame: PendingTimer,
    detach: PendingTimer,
    config: OverlayConfig,
}

impl ExpandedCardOverlay {
    #[must_use]
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            source_card: None,
            visible: false,
            attached: false,
            content: None,
            bars: Vec::new(),
            transitions_enabled: false,
            generation: 0,
            pending_hide: PendingTimer::new(),
            frame: PendingTimer::new(),
            detach: PendingTimer::new(),
            config,
        }
    }

    /// The singleton state as the rest of the system sees it.
    #[must_use]
    pub fn state<A>(&self, scheduler: &Scheduler<A>) -> OverlayState {
        OverlayState {
            source_card: self.source_card.clone(),
            visible: self.visible,
            pending_hide: self
                .pending_hide
                .handle()
                .filter(|h| scheduler.is_pending(*h)),
        }
    }

    #[must_use]
    pub fn source_card(&self) -> Option<&str> {
        self.source_card.as_deref()
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the overlay still occupies layout (visible or fading out).
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// The copied card content.
    #[must_use]
    pub fn content(&self) -> Option<&CardContent> {
        self.content.as_ref()
    }

    #[must_use]
    pub fn transitions_enabled(&self) -> bool {
        self.transitions_enabled
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Target width of each bar in the copy.
    #[must_use]
    pub fn bar_targets(&self) -> Vec<f32> {
        self.bars.iter().map(Animated::target).collect()
    }

    /// Rendered width of each bar at `at`.
    #[must_use]
    pub fn bar_values(&self, at: Duration) -> Vec<f32> {
        self.bars.iter().map(|b| b.sample(at)).collect()
    }

    /// Pointer entered summary card `card_id`.
    pub fn on_card_enter<A: From<OverlayStep>>(
        &mut self,
        card_id: &str,
        scheduler: &mut Scheduler<A>,
        scene: &mut Scene,
    ) {
        if self.source_card.as_deref() == Some(card_id) {
            self.pending_hide.cancel(scheduler);
            return;
        }
        let Some(content) = scene.card(card_id).cloned() else {
            tracing::debug!(target: "brew.overlay", card = card_id, "card has no content; ignored");
            return;
        };
        self.pending_hide.cancel(scheduler);
        self.detach.cancel(scheduler);
        self.generation += 1;

        self.transitions_enabled = false;
        self.bars = content.bars.iter().map(|_| Animated::at(0.0)).collect();
        self.content = Some(content);
        self.source_card = Some(card_id.to_string());
        self.visible = true;
        self.attached = true;

        if let Some(mut e) = scene.edit(ids::OVERLAY) {
            e.transition(None)
                .set(Property::Opacity, 1.0)
                .add_class(CLASS_VISIBLE)
                .attr("source", card_id)
                .attr("attached", "true");
        }
        self.frame.arm(
            scheduler,
            self.config.frame_interval(),
            OverlayStep::Frame {
                generation: self.generation,
            },
        );
        tracing::debug!(
            target: "brew.overlay",
            card = card_id,
            generation = self.generation,
            "overlay shown"
        );
    }

    /// Pointer left summary card `card_id` towards `related`.
    pub fn on_card_leave<A: From<OverlayStep>>(
        &mut self,
        card_id: &str,
        related: &PointerTarget,
        scheduler: &mut Scheduler<A>,
    ) {
        if related.is_overlay() {
            return;
        }
        self.pending_hide
            .arm(scheduler, self.config.hide_delay(), OverlayStep::HideDelay);
        tracing::trace!(target: "brew.overlay", card = card_id, "hide armed");
    }

    /// Pointer entered the overlay.
    pub fn on_overlay_enter<A>(&mut self, scheduler: &mut Scheduler<A>) {
        self.pending_hide.cancel(scheduler);
    }

    /// Pointer left the overlay towards `related`.
    pub fn on_overlay_leave<A: From<OverlayStep>>(
        &mut self,
        related: &PointerTarget,
        scheduler: &mut Scheduler<A>,
        scene: &mut Scene,
    ) {
        if related.is_overlay() {
            return;
        }
        self.hide(scheduler, scene);
    }

    /// Apply a fired step.
    pub fn on_step<A: From<OverlayStep>>(
        &mut self,
        handle: TimerHandle,
        step: OverlayStep,
        scheduler: &mut Scheduler<A>,
        scene: &mut Scene,
    ) {
        match step {
            OverlayStep::HideDelay => {
                if self.pending_hide.settle(handle) {
                    self.hide(scheduler, scene);
                }
            }
            OverlayStep::Frame { generation } => {
                if !self.frame.settle(handle) || generation != self.generation {
                    return;
                }
                self.transitions_enabled = true;
                let now = scene.now();
                if let Some(content) = &self.content {
                    for (bar, view) in self.bars.iter_mut().zip(&content.bars) {
                        bar.set(view.fill_pct, now, Some(BAR_FILL));
                    }
                }
            }
            OverlayStep::Detach { generation } => {
                if !self.detach.settle(handle) || generation != self.generation || self.visible {
                    return;
                }
                self.attached = false;
                if let Some(mut e) = scene.edit(ids::OVERLAY) {
                    e.attr("attached", "false");
                }
                tracing::debug!(target: "brew.overlay", generation, "overlay detached");
            }
        }
    }

    fn hide<A: From<OverlayStep>>(&mut self, scheduler: &mut Scheduler<A>, scene: &mut Scene) {
        self.pending_hide.cancel(scheduler);
        self.frame.cancel(scheduler);
        if !self.visible && self.source_card.is_none() {
            return;
        }
        self.source_card = None;
        self.visible = false;
        if let Some(mut e) = scene.edit(ids::OVERLAY) {
            e.remove_class(CLASS_VISIBLE).animate(
                Property::Opacity,
                0.0,
                Transition::new(self.config.fade_out(), Easing::Ease),
            );
        }
        self.detach.arm(
            scheduler,
            self.config.fade_out(),
            OverlayStep::Detach {
                generation: self.generation,
            },
        );
        tracing::debug!(target: "brew.overlay", "overlay hidden");
    }

    /// Cancel every pending step and drop the overlay from layout.
    pub fn teardown<A>(&mut self, scheduler: &mut Scheduler<A>, scene: &mut Scene) {
        self.pending_hide.cancel(scheduler);
        self.frame.cancel(scheduler);
        self.detach.cancel(scheduler);
        self.source_card = None;
        self.visible = false;
        self.attached = false;
        if let Some(mut e) = scene.edit(ids::OVERLAY) {
            e.transition(None)
                .set(Property::Opacity, 0.0)
                .remove_class(CLASS_VISIBLE)
                .attr("attached", "false");
        }
    }
}
