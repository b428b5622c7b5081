//! Scripted interaction replay.
//!
//! A script is a list of host events stamped with the virtual time at which
//! they occur. Replay drives the session clock between cues, either as fast
//! as possible or paced against the wall clock.

use std::time::Duration;

use brew_core::scene::ids;
use brew_core::Property;
use brew_runtime::{HostEvent, PointerTarget, Session};
use clap::ValueEnum;
use serde_json::json;
use web_time::Instant;

/// Built-in scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScriptName {
    /// Enter americano, watch the full pour, go home, then enter latte.
    Tour,
    /// Leave a detail panel mid-drip and enter another one.
    Interrupt,
    /// Hover across summary cards and into the expanded view.
    Hover,
}

/// One scripted host event.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub at: Duration,
    pub event: HostEvent,
}

/// A timed list of host events plus the time replay stops.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub name: &'static str,
    pub cues: Vec<Cue>,
    pub end: Duration,
}

fn cue(ms: u64, event: HostEvent) -> Cue {
    Cue {
        at: Duration::from_millis(ms),
        event,
    }
}

impl Script {
    #[must_use]
    pub fn builtin(name: ScriptName) -> Self {
        match name {
            ScriptName::Tour => Self {
                name: "tour",
                cues: vec![
                    cue(0, HostEvent::FirstInteraction),
                    cue(200, HostEvent::NavClicked("americano".into())),
                    cue(26_000, HostEvent::CueEnded),
                    cue(30_000, HostEvent::NavClicked("home".into())),
                    cue(31_000, HostEvent::DrinkCardClicked("latte".into())),
                    cue(31_500, HostEvent::DismissHintClicked),
                ],
                end: Duration::from_millis(57_000),
            },
            ScriptName::Interrupt => Self {
                name: "interrupt",
                cues: vec![
                    cue(0, HostEvent::NavClicked("latte".into())),
                    cue(18_900, HostEvent::NavClicked("home".into())),
                    cue(20_000, HostEvent::NavClicked("espresso".into())),
                ],
                end: Duration::from_millis(46_000),
            },
            ScriptName::Hover => {
                let age = "cappuccino-age-card".to_string();
                let time = "cappuccino-time-card".to_string();
                Self {
                    name: "hover",
                    cues: vec![
                        cue(0, HostEvent::NavClicked("cappuccino".into())),
                        cue(1_000, HostEvent::PointerEnterCard(age.clone())),
                        cue(
                            1_050,
                            HostEvent::PointerLeaveCard {
                                card: age.clone(),
                                related: PointerTarget::Card(time.clone()),
                            },
                        ),
                        cue(1_050, HostEvent::PointerEnterCard(time.clone())),
                        cue(
                            1_100,
                            HostEvent::PointerLeaveCard {
                                card: time,
                                related: PointerTarget::Card(age.clone()),
                            },
                        ),
                        cue(1_100, HostEvent::PointerEnterCard(age.clone())),
                        cue(
                            1_500,
                            HostEvent::PointerLeaveCard {
                                card: age,
                                related: PointerTarget::Overlay,
                            },
                        ),
                        cue(1_500, HostEvent::PointerEnterOverlay),
                        cue(
                            2_000,
                            HostEvent::PointerLeaveOverlay {
                                related: PointerTarget::Elsewhere,
                            },
                        ),
                    ],
                    end: Duration::from_millis(3_000),
                }
            }
        }
    }
}

/// How replay advances the clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// Jump straight from cue to cue.
    Instant,
    /// Sleep so virtual time tracks the wall clock, scaled by `speed`.
    Realtime { speed: f64, frame: Duration },
}

/// What a replay observed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub script: &'static str,
    pub end: Duration,
    pub active_panel: String,
    pub completions: Vec<(String, String)>,
    pub fill_height: f32,
    pub overlay_source: Option<String>,
    pub pending_timers: usize,
}

impl ReplayReport {
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "script": self.script,
            "end_ms": self.end.as_millis() as u64,
            "active_panel": self.active_panel,
            "completions": self
                .completions
                .iter()
                .map(|(item, readout)| json!({ "item": item, "readout": readout }))
                .collect::<Vec<_>>(),
            "fill_height": self.fill_height,
            "overlay_source": self.overlay_source,
            "pending_timers": self.pending_timers,
        })
    }
}

/// Replay `script` against `session` and summarise the result.
pub fn replay(session: &mut Session, script: &Script, pacing: Pacing) -> ReplayReport {
    tracing::info!(target: "brew.demo", script = script.name, cues = script.cues.len(), "replay started");
    let wall_start = Instant::now();
    for step in &script.cues {
        advance(session, step.at, pacing, wall_start);
        tracing::debug!(target: "brew.demo", at_ms = step.at.as_millis() as u64, event = ?step.event, "cue");
        session.handle(step.event.clone());
    }
    advance(session, script.end, pacing, wall_start);

    let report = ReplayReport {
        script: script.name,
        end: session.now(),
        active_panel: session.panel_state().active().to_string(),
        completions: session
            .completions()
            .iter()
            .map(|c| (c.item.clone(), c.readout.clone()))
            .collect(),
        fill_height: session
            .scene()
            .target(ids::LIQUID_FILL, Property::Height)
            .unwrap_or_default(),
        overlay_source: session.overlay().source_card().map(str::to_string),
        pending_timers: session.pending_timers(),
    };
    tracing::info!(
        target: "brew.demo",
        script = script.name,
        completions = report.completions.len(),
        "replay finished"
    );
    report
}

fn advance(session: &mut Session, to: Duration, pacing: Pacing, wall_start: Instant) {
    match pacing {
        Pacing::Instant => session.advance_to(to),
        Pacing::Realtime { speed, frame } => {
            while session.now() < to {
                std::thread::sleep(frame);
                let virtual_now = wall_start.elapsed().mul_f64(speed);
                session.advance_to(virtual_now.min(to));
            }
        }
    }
}
