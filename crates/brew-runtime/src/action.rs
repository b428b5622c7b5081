#![forbid(unsafe_code)]

//! Delayed actions routed through the session.
//!
//! Each component owns one step enum; [`Action`] is the sum the session's
//! scheduler carries. Components schedule with `impl Into<A>`, so they never
//! name `Action` themselves.

/// Panel transition steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelStep {
    /// Out-transition finished: activate the incoming panel.
    SwapIn,
    /// Settle delay finished: accept new requests again.
    Settle,
}

/// Pour sequence phases after phase 0 (which runs synchronously at start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PourPhase {
    Streams,
    Drips,
    Fill,
    Finish,
}

impl PourPhase {
    pub const ALL: [Self; 4] = [Self::Streams, Self::Drips, Self::Fill, Self::Finish];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Streams => "streams",
            Self::Drips => "drips",
            Self::Fill => "fill",
            Self::Finish => "finish",
        }
    }
}

/// Audio controller steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioStep {
    /// Pre-drip delay elapsed: start the pour for `item`.
    PourTrigger { item: String },
    /// One step of the ambient fade-in (1-based).
    AmbientFade { step: u32 },
}

/// Hover overlay steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayStep {
    /// Card-leave debounce elapsed.
    HideDelay,
    /// Next paint frame after a reveal: animate bars to their targets.
    Frame { generation: u64 },
    /// Fade-out finished: detach if still hidden.
    Detach { generation: u64 },
}

/// Everything the session scheduler can deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Panel(PanelStep),
    Pour(PourPhase),
    Audio(AudioStep),
    Overlay(OverlayStep),
}

impl Action {
    /// Short label for spans and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Panel(PanelStep::SwapIn) => "panel.swap_in",
            Self::Panel(PanelStep::Settle) => "panel.settle",
            Self::Pour(phase) => match phase {
                PourPhase::Streams => "pour.streams",
                PourPhase::Drips => "pour.drips",
                PourPhase::Fill => "pour.fill",
                PourPhase::Finish => "pour.finish",
            },
            Self::Audio(AudioStep::PourTrigger { .. }) => "audio.pour_trigger",
            Self::Audio(AudioStep::AmbientFade { .. }) => "audio.ambient_fade",
            Self::Overlay(OverlayStep::HideDelay) => "overlay.hide_delay",
            Self::Overlay(OverlayStep::Frame { .. }) => "overlay.frame",
            Self::Overlay(OverlayStep::Detach { .. }) => "overlay.detach",
        }
    }
}

impl From<PanelStep> for Action {
    fn from(step: PanelStep) -> Self {
        Self::Panel(step)
    }
}

impl From<PourPhase> for Action {
    fn from(phase: PourPhase) -> Self {
        Self::Pour(phase)
    }
}

impl From<AudioStep> for Action {
    fn from(step: AudioStep) -> Self {
        Self::Audio(step)
    }
}

impl From<OverlayStep> for Action {
    fn from(step: OverlayStep) -> Self {
        Self::Overlay(step)
    }
}
