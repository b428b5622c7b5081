#![forbid(unsafe_code)]

//! Audio cue controller.
//!
//! Two independent channels sit behind an [`AudioBackend`]:
//!
//! - **Ambient**: a looping bed started once, faded in from silence in
//!   discrete volume steps, never touched by navigation. If the host blocks
//!   autoplay, the controller waits and retries on each user interaction
//!   until playback succeeds.
//! - **Cue**: a one-shot clip rewound and replayed on every detail-panel
//!   entry, and stopped (paused, rewound) on leave, on a new transition, and
//!   when the pour finishes.
//!
//! The controller also holds the single pending pour trigger. Stopping the
//! cue always cancels it, so a stale pour can never start after the user
//! has navigated away. Natural completion ([`AudioCueController::on_cue_ended`])
//! leaves it alone.
//!
//! # Failure Modes
//!
//! Playback errors are logged at `debug` and swallowed. Audio is best-effort:
//! the visual timeline runs to completion whether or not the cue is audible.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use brew_core::{AudioConfig, PendingTimer, Scheduler, TimerHandle, TimerRegistry};
use thiserror::Error;

use crate::action::AudioStep;

/// Playback channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Ambient,
    Cue,
}

/// Why the host refused to play.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("playback blocked by host: {0}")]
    Denied(String),

    #[error("audio asset unavailable")]
    Unavailable,
}

/// Host audio output.
pub trait AudioBackend {
    /// Start or resume playback from the current position.
    fn play(&mut self, channel: Channel) -> Result<(), PlaybackError>;

    fn pause(&mut self, channel: Channel);

    /// Seek to the start of the clip.
    fn rewind(&mut self, channel: Channel);

    fn set_volume(&mut self, channel: Channel, volume: f32);

    fn set_looping(&mut self, _channel: Channel, _looping: bool) {}
}

/// Backend that accepts everything and produces nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudio;

impl AudioBackend for NullAudio {
    fn play(&mut self, _channel: Channel) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn pause(&mut self, _channel: Channel) {}

    fn rewind(&mut self, _channel: Channel) {}

    fn set_volume(&mut self, _channel: Channel, _volume: f32) {}
}

/// One call observed by [`RecordingAudio`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCall {
    Play(Channel),
    Pause(Channel),
    Rewind(Channel),
    Volume(Channel, f32),
    Looping(Channel, bool),
}

#[derive(Debug, Default)]
struct RecordingInner {
    calls: Vec<AudioCall>,
    denied: HashSet<Channel>,
}

/// Shared view of a [`RecordingAudio`] backend after it has been boxed.
#[derive(Debug, Clone, Default)]
pub struct AudioLog(Rc<RefCell<RecordingInner>>);

impl AudioLog {
    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<AudioCall> {
        self.0.borrow().calls.clone()
    }

    /// Count of calls matching `pred`.
    #[must_use]
    pub fn count(&self, pred: impl Fn(&AudioCall) -> bool) -> usize {
        self.0.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    /// Make `play` on `channel` fail (or succeed again).
    pub fn deny(&self, channel: Channel, denied: bool) {
        let mut inner = self.0.borrow_mut();
        if denied {
            inner.denied.insert(channel);
        } else {
            inner.denied.remove(&channel);
        }
    }

    pub fn clear(&self) {
        self.0.borrow_mut().calls.clear();
    }
}

/// Backend that records every call, for tests and the headless demo.
#[derive(Debug, Clone, Default)]
pub struct RecordingAudio {
    log: AudioLog,
}

impl RecordingAudio {
    /// Create a backend and the log handle that observes it.
    #[must_use]
    pub fn new() -> (Self, AudioLog) {
        let log = AudioLog::default();
        (Self { log: log.clone() }, log)
    }

    fn push(&self, call: AudioCall) {
        self.log.0.borrow_mut().calls.push(call);
    }
}

impl AudioBackend for RecordingAudio {
    fn play(&mut self, channel: Channel) -> Result<(), PlaybackError> {
        self.push(AudioCall::Play(channel));
        if self.log.0.borrow().denied.contains(&channel) {
            return Err(PlaybackError::Denied("autoplay policy".to_string()));
        }
        Ok(())
    }

    fn pause(&mut self, channel: Channel) {
        self.push(AudioCall::Pause(channel));
    }

    fn rewind(&mut self, channel: Channel) {
        self.push(AudioCall::Rewind(channel));
    }

    fn set_volume(&mut self, channel: Channel, volume: f32) {
        self.push(AudioCall::Volume(channel, volume));
    }

    fn set_looping(&mut self, channel: Channel, looping: bool) {
        self.push(AudioCall::Looping(channel, looping));
    }
}

/// Ambient channel snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientState {
    pub volume: f32,
    pub playing: bool,
}

/// Snapshot of both channels and the pending trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioChannelState {
    pub ambient: AmbientState,
    pub cue_playing: bool,
    pub pending_cue_trigger: Option<TimerHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AmbientPhase {
    NotStarted,
    AwaitingInteraction,
    Started,
}

/// Owner of the two channels and the delayed pour trigger.
pub struct AudioCueController {
    backend: Box<dyn AudioBackend>,
    config: AudioConfig,
    ambient: AmbientState,
    ambient_phase: AmbientPhase,
    fade: TimerRegistry,
    cue_playing: bool,
    pour_trigger: PendingTimer,
}

impl std::fmt::Debug for AudioCueController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioCueController")
            .field("ambient", &self.ambient)
            .field("ambient_phase", &self.ambient_phase)
            .field("cue_playing", &self.cue_playing)
            .field("pour_trigger", &self.pour_trigger)
            .finish_non_exhaustive()
    }
}

impl AudioCueController {
    #[must_use]
    pub fn new(backend: Box<dyn AudioBackend>, config: AudioConfig) -> Self {
        Self {
            backend,
            config,
            ambient: AmbientState {
                volume: 0.0,
                playing: false,
            },
            ambient_phase: AmbientPhase::NotStarted,
            fade: TimerRegistry::new("audio.fade"),
            cue_playing: false,
            pour_trigger: PendingTimer::new(),
        }
    }

    /// Current channel snapshot.
    #[must_use]
    pub fn state(&self) -> AudioChannelState {
        AudioChannelState {
            ambient: self.ambient,
            cue_playing: self.cue_playing,
            pending_cue_trigger: self.pour_trigger.handle(),
        }
    }

    /// Whether ambient playback was blocked and is waiting for a gesture.
    #[must_use]
    pub fn awaiting_interaction(&self) -> bool {
        self.ambient_phase == AmbientPhase::AwaitingInteraction
    }

    // -- ambient ------------------------------------------------------------

    /// Try to start the ambient bed. Returns `true` once it is playing.
    pub fn start_ambient<A: From<AudioStep>>(&mut self, scheduler: &mut Scheduler<A>) -> bool {
        if self.ambient_phase == AmbientPhase::Started {
            return true;
        }
        self.backend.set_looping(Channel::Ambient, true);
        self.backend.set_volume(Channel::Ambient, 0.0);
        if let Err(err) = self.backend.play(Channel::Ambient) {
            self.ambient_phase = AmbientPhase::AwaitingInteraction;
            tracing::debug!(
                target: "brew.audio",
                error = %err,
                "ambient autoplay blocked, waiting for interaction"
            );
            return false;
        }

        self.ambient_phase = AmbientPhase::Started;
        self.ambient = AmbientState {
            volume: 0.0,
            playing: true,
        };
        let interval = self.config.fade_step_interval();
        for step in 1..=self.config.ambient_fade_steps.max(1) {
            self.fade
                .schedule(scheduler, interval * step, AudioStep::AmbientFade { step });
        }
        tracing::info!(
            target: "brew.audio",
            target_volume = self.config.ambient_target_volume,
            fade_ms = self.config.ambient_fade_ms,
            "ambient started"
        );
        true
    }

    /// First pointer or touch interaction: retry a blocked ambient start.
    pub fn on_user_interaction<A: From<AudioStep>>(&mut self, scheduler: &mut Scheduler<A>) {
        if self.ambient_phase == AmbientPhase::AwaitingInteraction {
            self.start_ambient(scheduler);
        }
    }

    /// Apply one fade step.
    pub fn on_fade_step<A>(&mut self, step: u32, scheduler: &Scheduler<A>) {
        let volume = self.config.fade_volume(step);
        self.ambient.volume = volume;
        self.backend.set_volume(Channel::Ambient, volume);
        if step >= self.config.ambient_fade_steps {
            self.fade.prune(scheduler);
            tracing::debug!(target: "brew.audio", volume, "ambient fade complete");
        }
    }

    // -- cue ----------------------------------------------------------------

    /// Rewind and play the cue from the start at full volume.
    pub fn play_cue(&mut self) {
        self.backend.pause(Channel::Cue);
        self.backend.rewind(Channel::Cue);
        self.backend.set_volume(Channel::Cue, 1.0);
        match self.backend.play(Channel::Cue) {
            Ok(()) => {
                self.cue_playing = true;
                tracing::debug!(target: "brew.audio", "cue started");
            }
            Err(err) => {
                self.cue_playing = false;
                tracing::debug!(target: "brew.audio", error = %err, "cue playback denied");
            }
        }
    }

    /// Pause and rewind the cue, and cancel any pending pour trigger.
    ///
    /// Idempotent: stopping a stopped cue only repeats the pause/rewind.
    pub fn stop_cue<A>(&mut self, scheduler: &mut Scheduler<A>) {
        self.backend.pause(Channel::Cue);
        self.backend.rewind(Channel::Cue);
        let was_playing = std::mem::replace(&mut self.cue_playing, false);
        let cancelled = self.pour_trigger.cancel(scheduler);
        if was_playing || cancelled {
            tracing::debug!(
                target: "brew.audio",
                was_playing,
                trigger_cancelled = cancelled,
                "cue stopped"
            );
        }
    }

    /// The host reports the clip played to its end.
    pub fn on_cue_ended(&mut self) {
        self.cue_playing = false;
        tracing::debug!(target: "brew.audio", "cue ended");
    }

    // -- delayed pour trigger -----------------------------------------------

    /// Arm the pour trigger for `item`, replacing any armed one.
    pub fn arm_pour_trigger<A: From<AudioStep>>(
        &mut self,
        scheduler: &mut Scheduler<A>,
        item: &str,
        delay: Duration,
    ) -> TimerHandle {
        tracing::debug!(
            target: "brew.audio",
            item,
            delay_ms = delay.as_millis() as u64,
            "pour trigger armed"
        );
        self.pour_trigger.arm(
            scheduler,
            delay,
            AudioStep::PourTrigger {
                item: item.to_string(),
            },
        )
    }

    /// Accept a fired trigger. `false` means it was stale and must be ignored.
    pub fn settle_pour_trigger(&mut self, fired: TimerHandle) -> bool {
        self.pour_trigger.settle(fired)
    }

    /// Silence everything and drop pending fades. Used on teardown.
    pub fn shutdown<A>(&mut self, scheduler: &mut Scheduler<A>) {
        self.stop_cue(scheduler);
        self.fade.cancel_all(scheduler);
        if self.ambient.playing {
            self.backend.pause(Channel::Ambient);
        }
        self.ambient = AmbientState {
            volume: 0.0,
            playing: false,
        };
        self.ambient_phase = AmbientPhase::NotStarted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> (AudioCueController, AudioLog, Scheduler<AudioStep>) {
        let (backend, log) = RecordingAudio::new();
        (
            AudioCueController::new(Box::new(backend), AudioConfig::default()),
            log,
            Scheduler::new(),
        )
    }

    fn drain(c: &mut AudioCueController, s: &mut Scheduler<AudioStep>, until: Duration) {
        while let Some((_, step)) = s.pop_due(until) {
            if let AudioStep::AmbientFade { step } = step {
                c.on_fade_step(step, s);
            }
        }
        s.advance_clock(until);
    }

    #[test]
    fn ambient_fades_in_over_configured_steps() {
        let (mut c, log, mut s) = controller();
        assert!(c.start_ambient(&mut s));
        assert_eq!(s.pending_count(), 30);

        drain(&mut c, &mut s, Duration::from_millis(1500));
        assert!((c.state().ambient.volume - 0.2).abs() < 1e-6);

        drain(&mut c, &mut s, Duration::from_millis(3000));
        assert!((c.state().ambient.volume - 0.4).abs() < 1e-6);
        assert!(log.calls().contains(&AudioCall::Looping(Channel::Ambient, true)));
    }

    #[test]
    fn blocked_ambient_retries_on_interaction() {
        let (mut c, log, mut s) = controller();
        log.deny(Channel::Ambient, true);
        assert!(!c.start_ambient(&mut s));
        assert!(c.awaiting_interaction());
        assert_eq!(s.pending_count(), 0);

        // Still blocked: keep waiting.
        c.on_user_interaction(&mut s);
        assert!(c.awaiting_interaction());

        log.deny(Channel::Ambient, false);
        c.on_user_interaction(&mut s);
        assert!(c.state().ambient.playing);
        assert!(!c.awaiting_interaction());
    }

    #[test]
    fn ambient_starts_once() {
        let (mut c, log, mut s) = controller();
        c.start_ambient(&mut s);
        c.start_ambient(&mut s);
        c.on_user_interaction(&mut s);
        assert_eq!(log.count(|c| *c == AudioCall::Play(Channel::Ambient)), 1);
    }

    #[test]
    fn cue_rewinds_before_play() {
        let (mut c, log, _) = controller();
        c.play_cue();
        assert_eq!(
            log.calls(),
            vec![
                AudioCall::Pause(Channel::Cue),
                AudioCall::Rewind(Channel::Cue),
                AudioCall::Volume(Channel::Cue, 1.0),
                AudioCall::Play(Channel::Cue),
            ]
        );
        assert!(c.state().cue_playing);
    }

    #[test]
    fn denied_cue_is_swallowed() {
        let (mut c, log, _) = controller();
        log.deny(Channel::Cue, true);
        c.play_cue();
        assert!(!c.state().cue_playing);
    }

    #[test]
    fn stop_cue_cancels_pending_trigger() {
        let (mut c, _, mut s) = controller();
        c.play_cue();
        let h = c.arm_pour_trigger(&mut s, "latte", Duration::from_secs(18));
        c.stop_cue(&mut s);
        assert!(!s.is_pending(h));
        assert_eq!(c.state().pending_cue_trigger, None);
        assert!(!c.state().cue_playing);
    }

    #[test]
    fn natural_end_keeps_trigger() {
        let (mut c, _, mut s) = controller();
        c.play_cue();
        let h = c.arm_pour_trigger(&mut s, "latte", Duration::from_secs(18));
        c.on_cue_ended();
        assert!(s.is_pending(h));
        assert!(!c.state().cue_playing);
    }

    #[test]
    fn stale_trigger_is_not_settled() {
        let (mut c, _, mut s) = controller();
        let first = c.arm_pour_trigger(&mut s, "latte", Duration::from_secs(18));
        let second = c.arm_pour_trigger(&mut s, "mocha", Duration::from_secs(18));
        assert!(!c.settle_pour_trigger(first));
        assert!(c.settle_pour_trigger(second));
    }

    #[test]
    fn shutdown_silences_everything() {
        let (mut c, _, mut s) = controller();
        c.start_ambient(&mut s);
        c.play_cue();
        c.shutdown(&mut s);
        assert_eq!(s.pending_count(), 0);
        let state = c.state();
        assert!(!state.ambient.playing);
        assert!(!state.cue_playing);
    }
}
