#![forbid(unsafe_code)]

//! Pour animation sequencer.
//!
//! One run animates the drip apparatus and the rising fill for one item:
//!
//! | Offset | Phase | Effect |
//! |--------|-------|--------|
//! | 0 | reveal | drip group visible (synchronous, inside `start`) |
//! | 100 ms | [`PourPhase::Streams`] | streams grow to reach height and fade in |
//! | 300 ms | [`PourPhase::Drips`] | four drip loops armed, staggered |
//! | 700 ms | [`PourPhase::Fill`] | fill rises to `share% * container` over `F` |
//! | 700 + F + 200 ms | [`PourPhase::Finish`] | streams retract, drips stop, crema and readout shown |
//!
//! `F` is derived from the cue clip length (see
//! [`TimingConfig::fill_duration`]), so the finish lands on the end of the cue.
//!
//! # Invariants
//!
//! 1. At most one run is active; starting a run cancels the previous one
//!    and resets every touched element before scheduling anything.
//! 2. After [`PourSequencer::cancel`], none of the run's phases can fire and
//!    every touched element is back at its rest value, with transitions
//!    disabled so the next run animates from a clean baseline.
//! 3. Phases of one run fire in strictly increasing offset order.
//!
//! # Failure Modes
//!
//! - Unknown item: no work at all (the current run, if any, keeps going).
//! - Missing scene elements: writes to them are skipped.

use std::time::Duration;

use brew_core::animation::{DRIP_FALL_LEFT, DRIP_FALL_RIGHT, Keyframes};
use brew_core::charts::format_share;
use brew_core::scene::ids;
use brew_core::{
    Easing, KeyframeLoop, PourGeometry, ProfileTable, Property, Scene, Scheduler, TimerRegistry,
    TimingConfig, Transition,
};

use crate::action::PourPhase;

/// Phase offsets relative to run start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PourSchedule {
    pub streams: Duration,
    pub drips: Duration,
    pub fill: Duration,
    pub fill_duration: Duration,
    pub finish: Duration,
}

impl PourSchedule {
    #[must_use]
    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self {
            streams: Duration::from_millis(timing.stream_reveal_ms),
            drips: Duration::from_millis(timing.drip_start_ms),
            fill: Duration::from_millis(timing.fill_start_ms),
            fill_duration: timing.fill_duration(),
            finish: timing.finish_offset(),
        }
    }

    #[must_use]
    pub fn offset(&self, phase: PourPhase) -> Duration {
        match phase {
            PourPhase::Streams => self.streams,
            PourPhase::Drips => self.drips,
            PourPhase::Fill => self.fill,
            PourPhase::Finish => self.finish,
        }
    }
}

/// The active run.
#[derive(Debug, Clone, PartialEq)]
pub struct PourRun {
    pub item: String,
    pub sales_share: f64,
    pub fill_height: f32,
    pub fill_y: f32,
    pub started_at: Duration,
}

/// Result of [`PourSequencer::start`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PourStart {
    Started { fill_height: f32 },
    UnknownItem,
}

/// Emitted when the finishing phase runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PourCompletion {
    pub item: String,
    pub readout: String,
}

struct DripSpec {
    id: &'static str,
    keyframes: Keyframes,
    period_ms: u64,
    delay_ms: u64,
}

const DRIPS: [DripSpec; 4] = [
    DripSpec {
        id: ids::DRIP_L1,
        keyframes: DRIP_FALL_LEFT,
        period_ms: 700,
        delay_ms: 0,
    },
    DripSpec {
        id: ids::DRIP_L2,
        keyframes: DRIP_FALL_LEFT,
        period_ms: 900,
        delay_ms: 300,
    },
    DripSpec {
        id: ids::DRIP_R1,
        keyframes: DRIP_FALL_RIGHT,
        period_ms: 700,
        delay_ms: 0,
    },
    DripSpec {
        id: ids::DRIP_R2,
        keyframes: DRIP_FALL_RIGHT,
        period_ms: 900,
        delay_ms: 350,
    },
];

/// Drives one pour run at a time.
#[derive(Debug)]
pub struct PourSequencer {
    geometry: PourGeometry,
    schedule: PourSchedule,
    timers: TimerRegistry,
    run: Option<PourRun>,
    runs_started: u64,
}

impl PourSequencer {
    #[must_use]
    pub fn new(geometry: PourGeometry, timing: &TimingConfig) -> Self {
        Self {
            geometry,
            schedule: PourSchedule::from_timing(timing),
            timers: TimerRegistry::new("pour"),
            run: None,
            runs_started: 0,
        }
    }

    #[must_use]
    pub fn schedule(&self) -> PourSchedule {
        self.schedule
    }

    #[must_use]
    pub fn active_run(&self) -> Option<&PourRun> {
        self.run.as_ref()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    #[must_use]
    pub fn runs_started(&self) -> u64 {
        self.runs_started
    }

    /// Phases of the current run that have not fired yet.
    #[must_use]
    pub fn live_handles<A>(&self, scheduler: &Scheduler<A>) -> usize {
        self.timers.live_count(scheduler)
    }

    /// Start a run for `item`, superseding any active run.
    pub fn start<A: From<PourPhase>>(
        &mut self,
        item: &str,
        profiles: &ProfileTable,
        scheduler: &mut Scheduler<A>,
        scene: &mut Scene,
    ) -> PourStart {
        let Some(profile) = profiles.get(item) else {
            tracing::debug!(target: "brew.pour", item, "no profile, pour skipped");
            return PourStart::UnknownItem;
        };

        self.cancel(scheduler, scene);

        let fill_height = self.geometry.fill_height(profile.sales_share);
        let fill_y = self.geometry.base_y - fill_height;
        self.run = Some(PourRun {
            item: item.to_string(),
            sales_share: profile.sales_share,
            fill_height,
            fill_y,
            started_at: scheduler.now(),
        });
        self.runs_started += 1;

        if let Some(mut e) = scene.edit(ids::DRIP_GROUP) {
            e.transition(None).set(Property::Opacity, 1.0);
        }
        for phase in PourPhase::ALL {
            self.timers
                .schedule(scheduler, self.schedule.offset(phase), phase);
        }
        tracing::info!(
            target: "brew.pour",
            item,
            share = profile.sales_share,
            fill_height,
            finish_ms = self.schedule.finish.as_millis() as u64,
            "pour started"
        );
        PourStart::Started { fill_height }
    }

    /// Cancel the active run (if any) and reset the glass to rest.
    ///
    /// Returns `true` if a run was active.
    pub fn cancel<A>(&mut self, scheduler: &mut Scheduler<A>, scene: &mut Scene) -> bool {
        let cancelled = self.timers.cancel_all(scheduler);
        self.reset_visuals(scene);
        let was_running = self.run.take().is_some();
        if was_running {
            tracing::debug!(target: "brew.pour", pending = cancelled, "pour cancelled");
        }
        was_running
    }

    /// Apply a fired phase. Returns the completion on [`PourPhase::Finish`].
    pub fn on_phase<A>(
        &mut self,
        phase: PourPhase,
        scheduler: &Scheduler<A>,
        scene: &mut Scene,
    ) -> Option<PourCompletion> {
        let run = self.run.as_ref()?;
        tracing::debug!(target: "brew.pour", item = %run.item, phase = phase.name(), "pour phase");
        match phase {
            PourPhase::Streams => {
                for id in ids::STREAMS {
                    if let Some(mut e) = scene.edit(id) {
                        e.animate(
                            Property::Height,
                            self.geometry.stream_reach,
                            Transition::millis(500, Easing::EaseOut),
                        )
                        .animate(
                            Property::Opacity,
                            self.geometry.stream_opacity,
                            Transition::millis(300, Easing::Ease),
                        );
                    }
                }
                None
            }
            PourPhase::Drips => {
                for drip in &DRIPS {
                    if let Some(mut e) = scene.edit(drip.id) {
                        e.start_loop(KeyframeLoop {
                            keyframes: drip.keyframes,
                            period: Duration::from_millis(drip.period_ms),
                            delay: Duration::from_millis(drip.delay_ms),
                            easing: Easing::EaseIn,
                            started_at: Duration::ZERO,
                        });
                    }
                }
                None
            }
            PourPhase::Fill => {
                let t = Transition::new(self.schedule.fill_duration, Easing::POUR);
                let (fill_y, fill_height) = (run.fill_y, run.fill_height);
                if let Some(mut e) = scene.edit(ids::LIQUID_FILL) {
                    e.animate(Property::Y, fill_y, t)
                        .animate(Property::Height, fill_height, t);
                }
                None
            }
            PourPhase::Finish => {
                let run = self.run.take()?;
                for id in ids::STREAMS {
                    if let Some(mut e) = scene.edit(id) {
                        e.animate(Property::Height, 0.0, Transition::millis(400, Easing::EaseIn))
                            .animate(Property::Opacity, 0.0, Transition::millis(400, Easing::Ease));
                    }
                }
                stop_drips(scene);
                if let Some(mut e) = scene.edit(ids::LIQUID_SURFACE) {
                    e.animate(Property::Y, run.fill_y - 1.0, Transition::millis(300, Easing::Ease))
                        .animate(
                            Property::Opacity,
                            self.geometry.surface_opacity,
                            Transition::millis(500, Easing::Ease),
                        );
                }
                let readout = format_share(run.sales_share);
                if let Some(mut e) = scene.edit(ids::GLASS_PCT) {
                    e.text(readout.clone()).animate(
                        Property::Opacity,
                        1.0,
                        Transition::millis(500, Easing::Ease),
                    );
                }
                self.timers.prune(scheduler);
                tracing::info!(target: "brew.pour", item = %run.item, readout = %readout, "pour finished");
                Some(PourCompletion {
                    item: run.item,
                    readout,
                })
            }
        }
    }

    /// Force every pour element back to rest, transitions disabled.
    pub fn reset_visuals(&self, scene: &mut Scene) {
        let base_y = self.geometry.base_y;
        if let Some(mut e) = scene.edit(ids::LIQUID_FILL) {
            e.transition(None)
                .set(Property::Y, base_y)
                .set(Property::Height, 0.0);
        }
        if let Some(mut e) = scene.edit(ids::LIQUID_SURFACE) {
            e.transition(None)
                .set(Property::Y, base_y)
                .set(Property::Opacity, 0.0);
        }
        if let Some(mut e) = scene.edit(ids::GLASS_PCT) {
            e.transition(None).set(Property::Opacity, 0.0);
        }
        for id in ids::STREAMS {
            if let Some(mut e) = scene.edit(id) {
                e.transition(None)
                    .set(Property::Height, 0.0)
                    .set(Property::Opacity, 0.0);
            }
        }
        if let Some(mut e) = scene.edit(ids::DRIP_GROUP) {
            e.transition(None).set(Property::Opacity, 0.0);
        }
        stop_drips(scene);
    }
}

fn stop_drips(scene: &mut Scene) {
    for id in ids::DRIP_DROPS {
        if let Some(mut e) = scene.edit(id) {
            e.stop_loop().transition(None).set(Property::Opacity, 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brew_core::BrewConfig;

    struct Rig {
        pour: PourSequencer,
        profiles: ProfileTable,
        sched: Scheduler<PourPhase>,
        scene: Scene,
    }

    impl Rig {
        fn new() -> Self {
            let config = BrewConfig::default();
            let profiles = ProfileTable::builtin();
            let scene = Scene::brew_layout(&profiles, &config.pour);
            Self {
                pour: PourSequencer::new(config.pour, &config.timing),
                profiles,
                sched: Scheduler::new(),
                scene,
            }
        }

        fn start(&mut self, item: &str) -> PourStart {
            self.pour
                .start(item, &self.profiles, &mut self.sched, &mut self.scene)
        }

        fn run_until(&mut self, ms: u64) -> Vec<PourCompletion> {
            let until = Duration::from_millis(ms);
            let mut done = Vec::new();
            while let Some((_, phase)) = self.sched.pop_due(until) {
                self.scene.set_now(self.sched.now());
                done.extend(self.pour.on_phase(phase, &self.sched, &mut self.scene));
            }
            self.sched.advance_clock(until);
            self.scene.set_now(until);
            done
        }

        fn target(&self, id: &str, prop: Property) -> f32 {
            self.scene.target(id, prop).unwrap()
        }
    }

    #[test]
    fn schedule_matches_design_values() {
        let s = PourSchedule::from_timing(&TimingConfig::default());
        assert_eq!(s.streams, Duration::from_millis(100));
        assert_eq!(s.drips, Duration::from_millis(300));
        assert_eq!(s.fill, Duration::from_millis(700));
        assert_eq!(s.fill_duration, Duration::from_millis(6100));
        assert_eq!(s.finish, Duration::from_millis(7000));
    }

    #[test]
    fn start_reveals_drip_group_synchronously() {
        let mut rig = Rig::new();
        assert!(matches!(rig.start("americano"), PourStart::Started { .. }));
        assert_eq!(rig.target(ids::DRIP_GROUP, Property::Opacity), 1.0);
        assert_eq!(rig.pour.live_handles(&rig.sched), 4);
    }

    #[test]
    fn unknown_item_does_nothing() {
        let mut rig = Rig::new();
        rig.start("latte");
        assert_eq!(rig.start("mocha"), PourStart::UnknownItem);
        assert_eq!(rig.pour.active_run().map(|r| r.item.as_str()), Some("latte"));
        assert_eq!(rig.pour.live_handles(&rig.sched), 4);
    }

    #[test]
    fn phases_apply_in_order() {
        let mut rig = Rig::new();
        rig.start("americano");

        rig.run_until(100);
        assert_eq!(rig.target(ids::STREAM_LEFT, Property::Height), 14.0);
        assert!((rig.target(ids::STREAM_RIGHT, Property::Opacity) - 0.85).abs() < 1e-6);
        assert!(rig.scene.get(ids::DRIP_L1).unwrap().keyframes().is_none());

        rig.run_until(300);
        let l2 = *rig.scene.get(ids::DRIP_L2).unwrap().keyframes().unwrap();
        assert_eq!(l2.period, Duration::from_millis(900));
        assert_eq!(l2.delay, Duration::from_millis(300));
        assert_eq!(l2.started_at, Duration::from_millis(300));

        rig.run_until(700);
        let fill = rig.scene.get(ids::LIQUID_FILL).unwrap();
        assert!((fill.target(Property::Height) - 11.934).abs() < 1e-3);
        assert!((fill.target(Property::Y) - (588.0 - 11.934)).abs() < 1e-3);
        assert_eq!(
            fill.animated(Property::Height).transition().map(|t| t.duration),
            Some(Duration::from_millis(6100))
        );
    }

    #[test]
    fn fill_is_halfway_up_during_the_fill_window() {
        let mut rig = Rig::new();
        rig.start("latte");
        rig.run_until(700);
        let fill = rig.scene.get(ids::LIQUID_FILL).unwrap();
        let mid = fill.sample(Property::Height, Duration::from_millis(3750));
        let full = fill.target(Property::Height);
        assert!(mid > 0.0 && mid < full);
        assert_eq!(fill.sample(Property::Height, Duration::from_millis(6800)), full);
    }

    #[test]
    fn finish_shows_readout_and_stops_drips() {
        let mut rig = Rig::new();
        rig.start("americano");
        let done = rig.run_until(7000);
        assert_eq!(
            done,
            vec![PourCompletion {
                item: "americano".into(),
                readout: "22.1%".into()
            }]
        );
        assert_eq!(rig.scene.get(ids::GLASS_PCT).unwrap().text(), Some("22.1%"));
        assert_eq!(rig.target(ids::GLASS_PCT, Property::Opacity), 1.0);
        assert!((rig.target(ids::LIQUID_SURFACE, Property::Opacity) - 0.9).abs() < 1e-6);
        assert_eq!(rig.target(ids::STREAM_LEFT, Property::Height), 0.0);
        for id in ids::DRIP_DROPS {
            assert!(rig.scene.get(id).unwrap().keyframes().is_none());
        }
        assert!(!rig.pour.is_running());
        assert_eq!(rig.pour.live_handles(&rig.sched), 0);
    }

    #[test]
    fn cancel_mid_drip_resets_everything() {
        let mut rig = Rig::new();
        rig.start("americano");
        rig.run_until(2000);
        assert!(rig.pour.cancel(&mut rig.sched, &mut rig.scene));

        assert_eq!(rig.pour.live_handles(&rig.sched), 0);
        assert!(rig.run_until(20_000).is_empty());
        for id in ids::STREAMS {
            let el = rig.scene.get(id).unwrap();
            assert_eq!(el.target(Property::Height), 0.0);
            assert_eq!(el.transition(), None);
            assert_eq!(el.sample(Property::Height, rig.scene.now()), 0.0);
        }
        let fill = rig.scene.get(ids::LIQUID_FILL).unwrap();
        assert_eq!(fill.sample(Property::Height, Duration::from_millis(2001)), 0.0);
        assert_eq!(fill.target(Property::Y), 588.0);
        assert_eq!(rig.target(ids::DRIP_GROUP, Property::Opacity), 0.0);
    }

    #[test]
    fn restart_supersedes_previous_run() {
        let mut rig = Rig::new();
        rig.start("latte");
        rig.run_until(1000);
        rig.start("espresso");
        assert_eq!(rig.pour.runs_started(), 2);
        assert_eq!(rig.pour.live_handles(&rig.sched), 4);
        // Reset happened before the new run's phases.
        assert_eq!(rig.target(ids::LIQUID_FILL, Property::Height), 0.0);

        let done = rig.run_until(8000);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].item, "espresso");
        assert_eq!(done[0].readout, "10.2%");
    }

    #[test]
    fn missing_elements_are_skipped() {
        let mut rig = Rig::new();
        rig.scene.unmount(ids::STREAM_LEFT);
        rig.scene.unmount(ids::LIQUID_FILL);
        rig.start("cortado");
        let done = rig.run_until(7000);
        assert_eq!(done.len(), 1);
        assert!(rig.scene.get(ids::STREAM_LEFT).is_none());
    }
}
