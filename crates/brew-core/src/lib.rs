#![forbid(unsafe_code)]

//! Core: virtual time, scene model, profiles, and configuration.
//!
//! # Role in Brew Logic
//! `brew-core` holds the leaves of the presentation engine. Nothing here
//! knows about panels, audio, or hover; those live in `brew-runtime`, which
//! composes these pieces into a session.
//!
//! # Primary responsibilities
//! - **Scheduler / TimerRegistry**: deterministic delayed actions with exact,
//!   bulk cancellation.
//! - **Scene**: the visual tree (opacity, height, classes, text) written by
//!   the engine and sampled by the renderer.
//! - **Profiles and charts**: the static item table and the pure view-models
//!   derived from it.
//! - **Config**: every timing and geometry constant, with the pour fill
//!   duration derived from the cue clip length.

pub mod animation;
pub mod charts;
pub mod config;
pub mod error;
pub mod profile;
pub mod scene;
pub mod scheduler;
pub mod timer;

pub use animation::{Animated, Easing, KeyframeLoop, Transition};
pub use charts::{CardContent, CardKind, ChartSet, render_charts};
pub use config::{AudioConfig, BrewConfig, OverlayConfig, PourGeometry, TimingConfig};
pub use error::{ConfigError, ProfileError};
pub use profile::{AgeBin, ItemProfile, PeriodCount, ProfileTable};
pub use scene::{Element, Property, Scene, Size};
pub use scheduler::{Scheduler, TimerHandle};
pub use timer::{PendingTimer, TimerRegistry};
