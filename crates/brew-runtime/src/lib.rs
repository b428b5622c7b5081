#![forbid(unsafe_code)]

//! Runtime: the panel, pour, audio and hover engine.
//!
//! # Role in Brew Logic
//! `brew-runtime` composes the `brew-core` leaves into one [`Session`]. The
//! host forwards input as [`HostEvent`]s and advances the virtual clock; the
//! session fires due actions and writes the results into its scene.
//!
//! # How it fits
//! - [`PanelTransitionMachine`] gates and sequences panel switches.
//! - [`PourSequencer`] runs the cancellable multi-phase glass animation.
//! - [`AudioCueController`] owns the ambient bed, the cue clip and the
//!   delayed trigger that starts a pour.
//! - [`ExpandedCardOverlay`] debounces hover over summary cards.
//!
//! Every delayed effect is a typed [`Action`] on a single scheduler, so a
//! superseding request can retract it exactly.

pub mod action;
pub mod audio;
pub mod overlay;
pub mod panel;
pub mod pour;
pub mod session;

pub use action::{Action, AudioStep, OverlayStep, PanelStep, PourPhase};
pub use audio::{
    AudioBackend, AudioCall, AudioChannelState, AudioCueController, AudioLog, Channel, NullAudio,
    PlaybackError, RecordingAudio,
};
pub use overlay::{ExpandedCardOverlay, OverlayState, PointerTarget};
pub use panel::{Arrival, PanelState, PanelTransitionMachine, RejectReason, TransitionOutcome};
pub use pour::{PourCompletion, PourSchedule, PourSequencer, PourStart};
pub use session::{HostEvent, Session};
