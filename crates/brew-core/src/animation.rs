#![forbid(unsafe_code)]

//! Transition descriptors and property tweens.
//!
//! The engine never interpolates frames itself: it sets a target value and a
//! [`Transition`] describing how the renderer should move towards it, the
//! same contract a CSS `transition` has. [`Animated`] keeps enough history to
//! sample the in-flight value at any virtual time, which is what the
//! rendering collaborator (and the tests) read.
//!
//! # Invariants
//!
//! 1. Every [`Easing`] maps 0.0 to 0.0 and 1.0 to 1.0, and is monotonic on
//!    `[0, 1]` for the built-in curves.
//! 2. Retargeting an [`Animated`] mid-flight starts the new tween from the
//!    sampled value, never from the old target.
//! 3. Setting a value with no transition makes it land immediately.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Easing
// ---------------------------------------------------------------------------

/// Timing curve applied to a normalized progress value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    Linear,
    /// CSS `ease`.
    Ease,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Arbitrary CSS `cubic-bezier(x1, y1, x2, y2)`.
    CubicBezier(f32, f32, f32, f32),
}

impl Easing {
    /// The fill curve: `cubic-bezier(0.22, 0.61, 0.36, 1)`.
    pub const POUR: Self = Self::CubicBezier(0.22, 0.61, 0.36, 1.0);

    /// Map progress `t` in `[0, 1]` through the curve.
    #[must_use]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Ease => cubic_bezier(0.25, 0.1, 0.25, 1.0, t),
            Self::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, t),
            Self::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Self::EaseInOut => cubic_bezier(0.42, 0.0, 0.58, 1.0, t),
            Self::CubicBezier(x1, y1, x2, y2) => cubic_bezier(x1, y1, x2, y2, t),
        }
    }
}

/// Solve a unit cubic bezier for `x = t`, returning `y`.
fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32, x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let bezier = |a: f32, b: f32, s: f32| {
        let inv = 1.0 - s;
        3.0 * inv * inv * s * a + 3.0 * inv * s * s * b + s * s * s
    };
    let slope = |a: f32, b: f32, s: f32| {
        let inv = 1.0 - s;
        3.0 * inv * inv * a + 6.0 * inv * s * (b - a) + 3.0 * s * s * (1.0 - b)
    };

    // Newton first, bisection if the slope flattens out.
    let mut s = x;
    for _ in 0..8 {
        let err = bezier(x1, x2, s) - x;
        if err.abs() < 1e-5 {
            return bezier(y1, y2, s);
        }
        let d = slope(x1, x2, s);
        if d.abs() < 1e-6 {
            break;
        }
        s = (s - err / d).clamp(0.0, 1.0);
    }
    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    s = x;
    for _ in 0..32 {
        let v = bezier(x1, x2, s);
        if (v - x).abs() < 1e-5 {
            break;
        }
        if v < x {
            lo = s;
        } else {
            hi = s;
        }
        s = (lo + hi) * 0.5;
    }
    bezier(y1, y2, s)
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// How a property moves towards a newly set value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub duration: Duration,
    pub easing: Easing,
}

impl Transition {
    #[must_use]
    pub const fn new(duration: Duration, easing: Easing) -> Self {
        Self { duration, easing }
    }

    /// Convenience for millisecond literals.
    #[must_use]
    pub const fn millis(ms: u64, easing: Easing) -> Self {
        Self::new(Duration::from_millis(ms), easing)
    }
}

// ---------------------------------------------------------------------------
// Animated
// ---------------------------------------------------------------------------

/// A scalar property with its most recent tween.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Animated {
    from: f32,
    to: f32,
    start: Duration,
    transition: Option<Transition>,
}

impl Animated {
    /// A property resting at `value`.
    #[must_use]
    pub const fn at(value: f32) -> Self {
        Self {
            from: value,
            to: value,
            start: Duration::ZERO,
            transition: None,
        }
    }

    /// The value the property is heading to.
    #[inline]
    #[must_use]
    pub fn target(&self) -> f32 {
        self.to
    }

    /// Transition applied by the last [`set`](Self::set), if any.
    #[must_use]
    pub fn transition(&self) -> Option<Transition> {
        self.transition
    }

    /// When the last tween started.
    #[must_use]
    pub fn started_at(&self) -> Duration {
        self.start
    }

    /// Retarget to `value` at time `now`.
    pub fn set(&mut self, value: f32, now: Duration, transition: Option<Transition>) {
        let current = self.sample(now);
        self.from = match transition {
            Some(_) => current,
            None => value,
        };
        self.to = value;
        self.start = now;
        self.transition = transition;
    }

    /// Value as rendered at time `at`.
    #[must_use]
    pub fn sample(&self, at: Duration) -> f32 {
        let Some(t) = self.transition else {
            return self.to;
        };
        if t.duration.is_zero() || at >= self.start.saturating_add(t.duration) {
            return self.to;
        }
        if at <= self.start {
            return self.from;
        }
        let progress = (at - self.start).as_secs_f64() / t.duration.as_secs_f64();
        let eased = t.easing.apply(progress as f32);
        self.from + (self.to - self.from) * eased
    }

    /// Whether the tween is still moving at `at`.
    #[must_use]
    pub fn is_animating(&self, at: Duration) -> bool {
        self.transition.is_some_and(|t| {
            self.from != self.to && at < self.start.saturating_add(t.duration)
        })
    }
}

impl Default for Animated {
    fn default() -> Self {
        Self::at(0.0)
    }
}

// ---------------------------------------------------------------------------
// Repeating keyframe loop
// ---------------------------------------------------------------------------

/// Opacity keyframes for a falling drop, as `(offset, opacity)` pairs.
pub type Keyframes = &'static [(f32, f32)];

/// Left-side drop keyframes.
pub const DRIP_FALL_LEFT: Keyframes = &[(0.0, 0.0), (0.08, 0.9), (0.80, 0.7), (1.0, 0.0)];
/// Right-side drop keyframes.
pub const DRIP_FALL_RIGHT: Keyframes = &[(0.0, 0.0), (0.10, 0.9), (0.82, 0.7), (1.0, 0.0)];

/// An infinitely repeating keyframe animation armed on an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyframeLoop {
    pub keyframes: Keyframes,
    pub period: Duration,
    pub delay: Duration,
    pub easing: Easing,
    /// Virtual time the loop was armed.
    pub started_at: Duration,
}

impl KeyframeLoop {
    /// Opacity at time `at`. Zero before the loop's delay has elapsed.
    #[must_use]
    pub fn sample(&self, at: Duration) -> f32 {
        let begin = self.started_at.saturating_add(self.delay);
        if at < begin || self.period.is_zero() {
            return 0.0;
        }
        let elapsed = (at - begin).as_nanos() % self.period.as_nanos();
        let phase = (elapsed as f64 / self.period.as_nanos() as f64) as f32;
        sample_keyframes(self.keyframes, self.easing.apply(phase))
    }

    /// Completed iterations at time `at`.
    #[must_use]
    pub fn iterations(&self, at: Duration) -> u64 {
        let begin = self.started_at.saturating_add(self.delay);
        if at < begin || self.period.is_zero() {
            return 0;
        }
        ((at - begin).as_nanos() / self.period.as_nanos()) as u64
    }
}

fn sample_keyframes(frames: Keyframes, phase: f32) -> f32 {
    let Some(&(_, first)) = frames.first() else {
        return 0.0;
    };
    let mut prev = (0.0f32, first);
    for &(offset, value) in frames {
        if phase <= offset {
            let span = offset - prev.0;
            if span <= f32::EPSILON {
                return value;
            }
            let local = (phase - prev.0) / span;
            return prev.1 + (value - prev.1) * local;
        }
        prev = (offset, value);
    }
    prev.1
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_100: Duration = Duration::from_millis(100);
    const MS_200: Duration = Duration::from_millis(200);

    #[test]
    fn easing_endpoints() {
        for e in [
            Easing::Linear,
            Easing::Ease,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
            Easing::POUR,
        ] {
            assert!(e.apply(0.0).abs() < 1e-4, "{e:?} at 0");
            assert!((e.apply(1.0) - 1.0).abs() < 1e-4, "{e:?} at 1");
        }
    }

    #[test]
    fn easing_functions_are_monotonic() {
        for e in [
            Easing::Linear,
            Easing::Ease,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
            Easing::POUR,
        ] {
            let mut prev = 0.0f32;
            for i in 0..=100 {
                let t = i as f32 / 100.0;
                let v = e.apply(t);
                assert!(v >= prev - 0.001, "{e:?} not monotonic at t={t}");
                prev = v;
            }
        }
    }

    #[test]
    fn ease_in_starts_slow_ease_out_starts_fast() {
        assert!(Easing::EaseIn.apply(0.25) < 0.25);
        assert!(Easing::EaseOut.apply(0.25) > 0.25);
    }

    #[test]
    fn set_without_transition_lands_immediately() {
        let mut a = Animated::at(0.0);
        a.set(14.0, MS_100, None);
        assert_eq!(a.sample(MS_100), 14.0);
        assert!(!a.is_animating(MS_100));
    }

    #[test]
    fn linear_tween_midpoint() {
        let mut a = Animated::at(0.0);
        a.set(10.0, Duration::ZERO, Some(Transition::new(MS_200, Easing::Linear)));
        assert!((a.sample(MS_100) - 5.0).abs() < 1e-4);
        assert!(a.is_animating(MS_100));
        assert_eq!(a.sample(MS_200), 10.0);
        assert!(!a.is_animating(MS_200));
    }

    #[test]
    fn retarget_mid_flight_starts_from_sampled_value() {
        let mut a = Animated::at(0.0);
        a.set(10.0, Duration::ZERO, Some(Transition::new(MS_200, Easing::Linear)));
        a.set(0.0, MS_100, Some(Transition::new(MS_200, Easing::Linear)));
        assert!((a.sample(MS_100) - 5.0).abs() < 1e-4);
        assert_eq!(a.sample(Duration::from_millis(300)), 0.0);
    }

    #[test]
    fn keyframe_loop_is_dark_before_delay() {
        let l = KeyframeLoop {
            keyframes: DRIP_FALL_LEFT,
            period: Duration::from_millis(900),
            delay: Duration::from_millis(300),
            easing: Easing::Linear,
            started_at: Duration::ZERO,
        };
        assert_eq!(l.sample(MS_200), 0.0);
        assert_eq!(l.iterations(MS_200), 0);
    }

    #[test]
    fn keyframe_loop_repeats() {
        let l = KeyframeLoop {
            keyframes: DRIP_FALL_RIGHT,
            period: Duration::from_millis(700),
            delay: Duration::ZERO,
            easing: Easing::Linear,
            started_at: Duration::ZERO,
        };
        let a = l.sample(Duration::from_millis(70));
        let b = l.sample(Duration::from_millis(770));
        assert!((a - b).abs() < 1e-4);
        assert_eq!(l.iterations(Duration::from_millis(1500)), 2);
        assert!((a - 0.9).abs() < 1e-3);
    }
}
