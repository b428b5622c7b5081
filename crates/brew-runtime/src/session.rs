#![forbid(unsafe_code)]

//! The session context.
//!
//! [`Session`] owns every piece of mutable presentation state: the virtual
//! clock, the scene, both audio channels, the pour sequencer, the panel
//! machine and the hover overlay. The host feeds it [`HostEvent`]s and
//! advances time; the session routes fired actions back to their owners.
//!
//! # Lifecycle
//!
//! ```text
//! new ──▶ load (ambient) ──▶ handle / advance ... ──▶ teardown
//! ```
//!
//! After [`Session::teardown`] no timer is pending and every visual element
//! the engine animates is back at rest. The session stays usable.

use std::time::Duration;

use brew_core::charts::{display_name, share_label};
use brew_core::scene::ids;
use brew_core::{
    BrewConfig, ConfigError, Easing, ItemProfile, ProfileTable, Property, Scene, Scheduler, Size, TimerHandle,
    Transition, render_charts,
};

use crate::action::{Action, AudioStep};
use crate::audio::{AudioBackend, AudioChannelState, AudioCueController};
use crate::overlay::{ExpandedCardOverlay, OverlayState, PointerTarget};
use crate::panel::{Arrival, PanelState, PanelTransitionMachine, TransitionOutcome};
use crate::pour::{PourCompletion, PourSequencer, PourStart};

/// Glass indicator fade-in on detail entry.
const GLASS_SHOW: Transition = Transition::millis(400, Easing::Ease);
/// Glass indicator fade-out on home entry.
const GLASS_HIDE: Transition = Transition::millis(300, Easing::Ease);
/// Dismiss hint fade-out.
const HINT_FADE: Transition = Transition::millis(400, Easing::Ease);

/// Input the host forwards to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A navigation button for panel `target` was clicked.
    NavClicked(String),
    /// A drink card on the home panel was clicked.
    DrinkCardClicked(String),
    DismissHintClicked,
    PointerEnterCard(String),
    PointerLeaveCard {
        card: String,
        related: PointerTarget,
    },
    PointerEnterOverlay,
    PointerLeaveOverlay {
        related: PointerTarget,
    },
    Resize(Size),
    /// First pointer or touch interaction anywhere.
    FirstInteraction,
    /// The cue clip played to its natural end.
    CueEnded,
}

/// One presentation session.
#[derive(Debug)]
pub struct Session {
    config: BrewConfig,
    profiles: ProfileTable,
    scheduler: Scheduler<Action>,
    scene: Scene,
    audio: AudioCueController,
    pour: PourSequencer,
    panels: PanelTransitionMachine,
    overlay: ExpandedCardOverlay,
    completions: Vec<PourCompletion>,
}

impl Session {
    /// Validate `config`, then build a session over the standard layout.
    pub fn try_new(
        config: BrewConfig,
        profiles: ProfileTable,
        audio: Box<dyn AudioBackend>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(config.validated()?, profiles, audio))
    }

    /// A session over the standard layout for `profiles`.
    ///
    /// `config` is expected to have passed [`BrewConfig::validate`]; an
    /// unvalidated timing can finish the pour after the cue ends. Problems are
    /// logged, not rejected. Use [`Session::try_new`] to reject them.
    #[must_use]
    pub fn new(config: BrewConfig, profiles: ProfileTable, audio: Box<dyn AudioBackend>) -> Self {
        let scene = Scene::brew_layout(&profiles, &config.pour);
        Self::with_scene(config, profiles, scene, audio)
    }

    /// A session over a host-provided scene.
    #[must_use]
    pub fn with_scene(
        config: BrewConfig,
        profiles: ProfileTable,
        scene: Scene,
        audio: Box<dyn AudioBackend>,
    ) -> Self {
        for problem in config.validate() {
            tracing::warn!(target: "brew.session", %problem, "unvalidated config");
        }
        let panels = PanelTransitionMachine::new(profiles.ids(), &config.timing);
        Self {
            audio: AudioCueController::new(audio, config.audio.clone()),
            pour: PourSequencer::new(config.pour.clone(), &config.timing),
            overlay: ExpandedCardOverlay::new(config.overlay.clone()),
            panels,
            scheduler: Scheduler::new(),
            scene,
            profiles,
            config,
            completions: Vec::new(),
        }
    }

    /// Page load: try to start the ambient bed. Returns `false` when
    /// playback was blocked and will be retried on first interaction.
    pub fn load(&mut self) -> bool {
        self.audio.start_ambient(&mut self.scheduler)
    }

    // -- host boundary ------------------------------------------------------

    /// Route one host event.
    pub fn handle(&mut self, event: HostEvent) {
        self.scene.set_now(self.scheduler.now());
        tracing::trace!(target: "brew.session", ?event, "host event");
        match event {
            HostEvent::NavClicked(target) | HostEvent::DrinkCardClicked(target) => {
                self.audio.on_user_interaction(&mut self.scheduler);
                self.request_panel_transition(&target);
            }
            HostEvent::DismissHintClicked => {
                self.audio.on_user_interaction(&mut self.scheduler);
                if let Some(mut e) = self.scene.edit(ids::DISMISS_HINT) {
                    e.animate(Property::Opacity, 0.0, HINT_FADE)
                        .attr("dismissed", "true");
                }
            }
            HostEvent::PointerEnterCard(card) => {
                self.overlay
                    .on_card_enter(&card, &mut self.scheduler, &mut self.scene);
            }
            HostEvent::PointerLeaveCard { card, related } => {
                self.overlay
                    .on_card_leave(&card, &related, &mut self.scheduler);
            }
            HostEvent::PointerEnterOverlay => self.overlay.on_overlay_enter(&mut self.scheduler),
            HostEvent::PointerLeaveOverlay { related } => {
                self.overlay
                    .on_overlay_leave(&related, &mut self.scheduler, &mut self.scene);
            }
            HostEvent::Resize(viewport) => self.scene.resize(viewport),
            HostEvent::FirstInteraction => self.audio.on_user_interaction(&mut self.scheduler),
            HostEvent::CueEnded => self.audio.on_cue_ended(),
        }
    }

    /// Ask to show panel `target`.
    pub fn request_panel_transition(&mut self, target: &str) -> TransitionOutcome {
        self.scene.set_now(self.scheduler.now());
        if let Err(reason) = self.panels.gate(target, &self.scene) {
            tracing::debug!(target: "brew.panel", panel = target, ?reason, "transition rejected");
            return TransitionOutcome::Rejected(reason);
        }
        self.pour.cancel(&mut self.scheduler, &mut self.scene);
        self.audio.stop_cue(&mut self.scheduler);
        self.panels
            .begin(target, &mut self.scheduler, &mut self.scene)
    }

    #[must_use]
    pub fn item_profile(&self, id: &str) -> Option<&ItemProfile> {
        self.profiles.get(id)
    }

    /// Start a pour for `id` right away, superseding any active run.
    pub fn start_pour_sequence(&mut self, id: &str) -> PourStart {
        self.scene.set_now(self.scheduler.now());
        self.pour
            .start(id, &self.profiles, &mut self.scheduler, &mut self.scene)
    }

    /// Cancel the active pour and reset the glass. Returns `true` if a run
    /// was active.
    pub fn cancel_pour_sequence(&mut self) -> bool {
        self.scene.set_now(self.scheduler.now());
        self.pour.cancel(&mut self.scheduler, &mut self.scene)
    }

    // -- time ---------------------------------------------------------------

    /// Advance the clock by `dt`, firing everything due on the way.
    pub fn advance(&mut self, dt: Duration) {
        let until = self.scheduler.now().saturating_add(dt);
        self.advance_to(until);
    }

    /// Advance the clock to `t`, firing everything due on the way.
    pub fn advance_to(&mut self, t: Duration) {
        while let Some((handle, action)) = self.scheduler.pop_due(t) {
            self.dispatch(handle, action);
        }
        self.scheduler.advance_clock(t);
        self.scene.set_now(self.scheduler.now());
    }

    /// Fire pending actions until none remain. Returns the final time.
    pub fn run_until_idle(&mut self) -> Duration {
        while let Some(due) = self.scheduler.next_due() {
            self.advance_to(due);
        }
        self.scheduler.now()
    }

    fn dispatch(&mut self, handle: TimerHandle, action: Action) {
        self.scene.set_now(self.scheduler.now());
        let span = tracing::debug_span!(
            target: "brew.session",
            "dispatch",
            action = action.label(),
            at_ms = self.scheduler.now().as_millis() as u64,
        );
        let _guard = span.enter();

        match action {
            Action::Panel(step) => {
                if let Some(arrival) =
                    self.panels
                        .on_step(step, &mut self.scheduler, &mut self.scene)
                {
                    self.on_arrival(arrival);
                }
            }
            Action::Pour(phase) => {
                if let Some(done) = self
                    .pour
                    .on_phase(phase, &self.scheduler, &mut self.scene)
                {
                    self.audio.stop_cue(&mut self.scheduler);
                    self.completions.push(done);
                }
            }
            Action::Audio(AudioStep::PourTrigger { item }) => {
                if self.audio.settle_pour_trigger(handle) {
                    self.pour
                        .start(&item, &self.profiles, &mut self.scheduler, &mut self.scene);
                } else {
                    tracing::debug!(target: "brew.audio", item = %item, "stale pour trigger ignored");
                }
            }
            Action::Audio(AudioStep::AmbientFade { step }) => {
                self.audio.on_fade_step(step, &self.scheduler);
            }
            Action::Overlay(step) => {
                self.overlay
                    .on_step(handle, step, &mut self.scheduler, &mut self.scene);
            }
        }
    }

    fn on_arrival(&mut self, arrival: Arrival) {
        if !arrival.is_detail {
            if let Some(mut e) = self.scene.edit(ids::GLASS_GROUP) {
                e.animate(Property::Opacity, 0.0, GLASS_HIDE);
            }
            for id in [ids::SCREEN_DRINK_LABEL, ids::SCREEN_PCT_LABEL] {
                if let Some(mut e) = self.scene.edit(id) {
                    e.transition(None).set(Property::Opacity, 0.0);
                }
            }
            self.audio.stop_cue(&mut self.scheduler);
            return;
        }

        let item = arrival.to;
        if let Some(profile) = self.profiles.get(&item) {
            let charts = render_charts(profile);
            self.scene.apply_charts(&item, &charts);
            if let Some(mut e) = self.scene.edit(ids::SCREEN_PCT_LABEL) {
                e.transition(None)
                    .text(share_label(profile.sales_share))
                    .set(Property::Opacity, 1.0);
            }
        }
        if let Some(mut e) = self.scene.edit(ids::SCREEN_DRINK_LABEL) {
            e.transition(None)
                .text(display_name(&item))
                .set(Property::Opacity, 1.0);
        }
        if let Some(mut e) = self.scene.edit(ids::GLASS_GROUP) {
            e.animate(Property::Opacity, 1.0, GLASS_SHOW);
        }
        self.audio.play_cue();
        self.audio.arm_pour_trigger(
            &mut self.scheduler,
            &item,
            self.config.timing.pre_drip_delay(),
        );
    }

    /// Cancel everything pending and return every animated element to rest.
    pub fn teardown(&mut self) {
        self.scene.set_now(self.scheduler.now());
        self.pour.cancel(&mut self.scheduler, &mut self.scene);
        self.panels.teardown(&mut self.scheduler);
        self.overlay.teardown(&mut self.scheduler, &mut self.scene);
        self.audio.shutdown(&mut self.scheduler);
        self.scheduler.clear();
        tracing::info!(target: "brew.session", "session torn down");
    }

    // -- inspection ---------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &BrewConfig {
        &self.config
    }

    #[must_use]
    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[must_use]
    pub fn panel_state(&self) -> &PanelState {
        self.panels.state()
    }

    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.panels.is_transitioning()
    }

    #[must_use]
    pub fn audio_state(&self) -> AudioChannelState {
        self.audio.state()
    }

    #[must_use]
    pub fn overlay(&self) -> &ExpandedCardOverlay {
        &self.overlay
    }

    #[must_use]
    pub fn overlay_state(&self) -> OverlayState {
        self.overlay.state(&self.scheduler)
    }

    #[must_use]
    pub fn pour(&self) -> &PourSequencer {
        &self.pour
    }

    /// Live handles belonging to the active pour run.
    #[must_use]
    pub fn pour_live_handles(&self) -> usize {
        self.pour.live_handles(&self.scheduler)
    }

    /// Every action still waiting to fire, across all components.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending_count()
    }

    /// When the next action is due, if any.
    #[must_use]
    pub fn next_due(&mut self) -> Option<Duration> {
        self.scheduler.next_due()
    }

    /// Pours that ran to completion, oldest first.
    #[must_use]
    pub fn completions(&self) -> &[PourCompletion] {
        &self.completions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioCall, Channel, NullAudio, RecordingAudio};
    use crate::panel::RejectReason;

    fn session() -> (Session, crate::audio::AudioLog) {
        let (audio, log) = RecordingAudio::new();
        let s = Session::new(BrewConfig::default(), ProfileTable::builtin(), Box::new(audio));
        (s, log)
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn cue_shorter_than_lead_in_is_rejected_up_front() {
        let mut config = BrewConfig::default();
        config.timing.cue_clip_ms = config.timing.pre_drip_delay_ms;
        let err = Session::try_new(config, ProfileTable::builtin(), Box::new(NullAudio))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref e) if e[0].contains("cue_clip_ms")));

        let ok = Session::try_new(
            BrewConfig::default(),
            ProfileTable::builtin(),
            Box::new(NullAudio),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn detail_entry_renders_charts_and_labels() {
        let (mut s, log) = session();
        assert!(s.request_panel_transition("americano").is_started());
        s.advance_to(ms(450));
        let scene = s.scene();
        assert_eq!(scene.get("americano-sales-pct").unwrap().text(), Some("22.1%"));
        assert_eq!(scene.get(ids::SCREEN_DRINK_LABEL).unwrap().text(), Some("Americano"));
        assert_eq!(
            scene.get(ids::SCREEN_PCT_LABEL).unwrap().text(),
            Some("22.1% of sales")
        );
        assert_eq!(scene.target(ids::GLASS_GROUP, Property::Opacity), Some(1.0));
        assert!(s.audio_state().cue_playing);
        assert!(s.audio_state().pending_cue_trigger.is_some());
        assert_eq!(log.count(|c| *c == AudioCall::Play(Channel::Cue)), 1);
    }

    #[test]
    fn home_entry_hides_indicator_and_stops_cue() {
        let (mut s, _log) = session();
        s.request_panel_transition("latte");
        s.advance_to(ms(1000));
        s.request_panel_transition("home");
        s.advance_to(ms(1450));
        assert_eq!(s.scene().target(ids::GLASS_GROUP, Property::Opacity), Some(0.0));
        assert_eq!(s.scene().target(ids::SCREEN_DRINK_LABEL, Property::Opacity), Some(0.0));
        assert!(!s.audio_state().cue_playing);
        assert_eq!(s.audio_state().pending_cue_trigger, None);
    }

    #[test]
    fn rejected_request_leaves_timers_alone() {
        let (mut s, _log) = session();
        s.request_panel_transition("latte");
        let pending = s.pending_timers();
        assert_eq!(
            s.request_panel_transition("cortado"),
            TransitionOutcome::Rejected(RejectReason::InFlight)
        );
        assert_eq!(s.pending_timers(), pending);
    }

    #[test]
    fn clicks_route_to_transitions() {
        let (mut s, _log) = session();
        s.handle(HostEvent::DrinkCardClicked("espresso".into()));
        assert!(s.is_transitioning());
        s.advance_to(ms(950));
        assert_eq!(s.panel_state().active(), "espresso");
        s.handle(HostEvent::NavClicked("home".into()));
        s.advance_to(ms(1400));
        assert_eq!(s.panel_state().active(), "home");
    }

    #[test]
    fn dismiss_hint_fades_out() {
        let (mut s, _log) = session();
        s.handle(HostEvent::DismissHintClicked);
        assert_eq!(s.scene().target(ids::DISMISS_HINT, Property::Opacity), Some(0.0));
        assert_eq!(s.scene().get(ids::DISMISS_HINT).unwrap().attr("dismissed"), Some("true"));
    }

    #[test]
    fn resize_records_scale() {
        let (mut s, _log) = session();
        s.handle(HostEvent::Resize(Size {
            width: 960.0,
            height: 540.0,
        }));
        assert!((s.scene().scale() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn blocked_ambient_retries_on_interaction() {
        let (mut s, log) = session();
        log.deny(Channel::Ambient, true);
        assert!(!s.load());
        s.handle(HostEvent::FirstInteraction);
        assert!(!s.audio_state().ambient.playing);
        log.deny(Channel::Ambient, false);
        s.handle(HostEvent::FirstInteraction);
        assert!(s.audio_state().ambient.playing);
        s.advance_to(ms(3000));
        assert!((s.audio_state().ambient.volume - 0.4).abs() < 1e-6);
    }

    #[test]
    fn cue_ended_keeps_pour_trigger() {
        let (mut s, _log) = session();
        s.request_panel_transition("latte");
        s.advance_to(ms(450));
        s.handle(HostEvent::CueEnded);
        assert!(!s.audio_state().cue_playing);
        assert!(s.audio_state().pending_cue_trigger.is_some());
    }

    #[test]
    fn teardown_leaves_nothing_pending() {
        let (mut s, _log) = session();
        s.load();
        s.request_panel_transition("latte");
        s.advance_to(ms(19_000));
        assert!(s.pour().is_running());
        s.teardown();
        assert_eq!(s.pending_timers(), 0);
        assert!(!s.pour().is_running());
        assert!(!s.is_transitioning());
        assert_eq!(s.scene().target(ids::LIQUID_FILL, Property::Height), Some(0.0));
    }
}
