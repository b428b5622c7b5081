#![forbid(unsafe_code)]

//! Timing and geometry configuration as data.
//!
//! [`BrewConfig`] groups every tunable constant of the presentation. Defaults
//! are the design values, so `BrewConfig::default()` behaves exactly like the
//! shipped presentation. With the `config` feature the whole structure loads
//! from TOML or JSON:
//!
//! ```toml
//! [timing]
//! cue_clip_ms = 25000
//! pre_drip_delay_ms = 18000
//!
//! [overlay]
//! hide_delay_ms = 150
//! ```
//!
//! The pour fill duration is never configured directly. It is derived from
//! the cue clip length so the fill finishes exactly when the cue ends:
//!
//! ```text
//! fill = cue_clip - pre_drip_delay - fill_start - finish_tail
//! ```

#[cfg(feature = "config")]
use std::path::Path;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use std::time::Duration;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct BrewConfig {
    pub timing: TimingConfig,
    pub pour: PourGeometry,
    pub audio: AudioConfig,
    pub overlay: OverlayConfig,
}

impl BrewConfig {
    /// Load from a TOML string and validate.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validated()
    }

    /// Load from a TOML file on disk and validate.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string and validate.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validated()
    }

    /// Validate all parameters. An empty list means the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let t = &self.timing;

        if t.stream_reveal_ms > t.drip_start_ms || t.drip_start_ms > t.fill_start_ms {
            errors.push(format!(
                "timing: pour phases out of order (streams {} ms, drips {} ms, fill {} ms)",
                t.stream_reveal_ms, t.drip_start_ms, t.fill_start_ms
            ));
        }
        match t
            .pre_drip_delay_ms
            .checked_add(t.fill_start_ms)
            .and_then(|v| v.checked_add(t.finish_tail_ms))
        {
            Some(overhead) if t.cue_clip_ms <= overhead => errors.push(format!(
                "timing: cue_clip_ms ({}) leaves no room for the fill (needs > {overhead})",
                t.cue_clip_ms
            )),
            Some(_) => {}
            None => errors.push(
                "timing: pre_drip_delay_ms + fill_start_ms + finish_tail_ms overflows".to_string(),
            ),
        }
        if t.settle_ms == 0 {
            errors.push("timing: settle_ms must be > 0".to_string());
        }

        let p = &self.pour;
        if p.container_height <= 0.0 {
            errors.push(format!(
                "pour: container_height must be > 0, got {}",
                p.container_height
            ));
        }
        for (name, v) in [
            ("stream_opacity", p.stream_opacity),
            ("surface_opacity", p.surface_opacity),
        ] {
            if !(0.0..=1.0).contains(&v) {
                errors.push(format!("pour: {name} must be in [0, 1], got {v}"));
            }
        }

        let a = &self.audio;
        if !(0.0..=1.0).contains(&a.ambient_target_volume) {
            errors.push(format!(
                "audio: ambient_target_volume must be in [0, 1], got {}",
                a.ambient_target_volume
            ));
        }
        if a.ambient_fade_steps == 0 {
            errors.push("audio: ambient_fade_steps must be >= 1".to_string());
        }

        if self.overlay.frame_interval_ms == 0 {
            errors.push("overlay: frame_interval_ms must be > 0".to_string());
        }
        errors
    }

    /// Consume `self`, returning it if [`validate`](Self::validate) passes.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Format as a single JSONL line for structured logging.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        let t = &self.timing;
        format!(
            r#"{{"schema":"brew-config-v1","out_transition_ms":{},"settle_ms":{},"pre_drip_delay_ms":{},"cue_clip_ms":{},"fill_ms":{},"hide_delay_ms":{},"fade_out_ms":{}}}"#,
            t.out_transition_ms,
            t.settle_ms,
            t.pre_drip_delay_ms,
            t.cue_clip_ms,
            t.fill_duration().as_millis(),
            self.overlay.hide_delay_ms,
            self.overlay.fade_out_ms,
        )
    }
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Panel transition and pour sequence timing, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct TimingConfig {
    /// Old panel fade-out before the new one activates. Default: 450.
    pub out_transition_ms: u64,
    /// Hold after activation before new requests are accepted. Default: 500.
    pub settle_ms: u64,
    /// Delay from detail-panel entry to the start of the pour. Default: 18000.
    pub pre_drip_delay_ms: u64,
    /// Effective length of the cue clip, measured from panel entry. Default: 25000.
    pub cue_clip_ms: u64,
    /// Streams start growing. Default: 100.
    pub stream_reveal_ms: u64,
    /// Drip loop starts. Default: 300.
    pub drip_start_ms: u64,
    /// Fill starts rising. Default: 700.
    pub fill_start_ms: u64,
    /// Gap between fill end and the finishing phase. Default: 200.
    pub finish_tail_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            out_transition_ms: 450,
            settle_ms: 500,
            pre_drip_delay_ms: 18_000,
            cue_clip_ms: 25_000,
            stream_reveal_ms: 100,
            drip_start_ms: 300,
            fill_start_ms: 700,
            finish_tail_ms: 200,
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn out_transition(&self) -> Duration {
        Duration::from_millis(self.out_transition_ms)
    }

    #[must_use]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    #[must_use]
    pub fn pre_drip_delay(&self) -> Duration {
        Duration::from_millis(self.pre_drip_delay_ms)
    }

    /// Window the pour sequence has to itself: cue clip minus the lead-in.
    #[must_use]
    pub fn pour_window(&self) -> Duration {
        Duration::from_millis(self.cue_clip_ms.saturating_sub(self.pre_drip_delay_ms))
    }

    fn fixed_phases(&self) -> Duration {
        Duration::from_millis(self.fill_start_ms.saturating_add(self.finish_tail_ms))
    }

    /// Derived fill duration. Zero when the configuration leaves no room.
    #[must_use]
    pub fn fill_duration(&self) -> Duration {
        self.pour_window().saturating_sub(self.fixed_phases())
    }

    /// Offset of the finishing phase from pour start.
    #[must_use]
    pub fn finish_offset(&self) -> Duration {
        self.fixed_phases().saturating_add(self.fill_duration())
    }
}

// ---------------------------------------------------------------------------
// Pour geometry
// ---------------------------------------------------------------------------

/// Glass and stream geometry in scene units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct PourGeometry {
    /// Interior height of the glass. Default: 54.
    pub container_height: f32,
    /// `y` of the glass bottom; the fill grows upward from here. Default: 588.
    pub base_y: f32,
    /// Stream length at full reach. Default: 14.
    pub stream_reach: f32,
    /// Default: 0.85.
    pub stream_opacity: f32,
    /// Crema highlight opacity. Default: 0.9.
    pub surface_opacity: f32,
}

impl Default for PourGeometry {
    fn default() -> Self {
        Self {
            container_height: 54.0,
            base_y: 588.0,
            stream_reach: 14.0,
            stream_opacity: 0.85,
            surface_opacity: 0.9,
        }
    }
}

impl PourGeometry {
    /// Fill height for a share given in percent.
    #[must_use]
    pub fn fill_height(&self, sales_share: f64) -> f32 {
        ((sales_share / 100.0) * f64::from(self.container_height)) as f32
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// Ambient channel fade-in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct AudioConfig {
    /// Default: 0.4.
    pub ambient_target_volume: f32,
    /// Default: 3000.
    pub ambient_fade_ms: u64,
    /// Number of discrete volume steps. Default: 30.
    pub ambient_fade_steps: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ambient_target_volume: 0.4,
            ambient_fade_ms: 3000,
            ambient_fade_steps: 30,
        }
    }
}

impl AudioConfig {
    /// Interval between fade steps.
    #[must_use]
    pub fn fade_step_interval(&self) -> Duration {
        Duration::from_millis(self.ambient_fade_ms) / self.ambient_fade_steps.max(1)
    }

    /// Volume after `step` of the fade (1-based), linear in the step index.
    #[must_use]
    pub fn fade_volume(&self, step: u32) -> f32 {
        let steps = self.ambient_fade_steps.max(1);
        self.ambient_target_volume * (step.min(steps) as f32 / steps as f32)
    }
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

/// Expanded-card hover debounce.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct OverlayConfig {
    /// Delay before a card leave hides the overlay. Default: 120.
    pub hide_delay_ms: u64,
    /// Fade-out before the overlay detaches from layout. Default: 250.
    pub fade_out_ms: u64,
    /// Length of one paint frame. Default: 16.
    pub frame_interval_ms: u64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            hide_delay_ms: 120,
            fade_out_ms: 250,
            frame_interval_ms: 16,
        }
    }
}

impl OverlayConfig {
    #[must_use]
    pub fn hide_delay(&self) -> Duration {
        Duration::from_millis(self.hide_delay_ms)
    }

    #[must_use]
    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms)
    }

    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(BrewConfig::default().validate().is_empty());
    }

    #[test]
    fn derived_fill_duration_is_6100ms() {
        let t = TimingConfig::default();
        assert_eq!(t.pour_window(), Duration::from_millis(7000));
        assert_eq!(t.fill_duration(), Duration::from_millis(6100));
        assert_eq!(t.finish_offset(), Duration::from_millis(7000));
    }

    #[test]
    fn fill_tracks_cue_length() {
        let t = TimingConfig {
            cue_clip_ms: 30_000,
            ..TimingConfig::default()
        };
        assert_eq!(t.fill_duration(), Duration::from_millis(11_100));
        assert_eq!(t.finish_offset(), t.pour_window());
    }

    #[test]
    fn short_cue_is_rejected() {
        let config = BrewConfig {
            timing: TimingConfig {
                cue_clip_ms: 18_500,
                ..TimingConfig::default()
            },
            ..BrewConfig::default()
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("cue_clip_ms"));
        assert!(matches!(config.validated(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn overflowing_phase_sum_is_reported_not_panicking() {
        let t = TimingConfig {
            pre_drip_delay_ms: u64::MAX / 2 + 1,
            fill_start_ms: u64::MAX / 2 + 1,
            drip_start_ms: 300,
            ..TimingConfig::default()
        };
        let config = BrewConfig {
            timing: t.clone(),
            ..BrewConfig::default()
        };
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("overflows")), "{errors:?}");
        assert_eq!(t.fill_duration(), Duration::ZERO);
        assert_eq!(t.finish_offset(), Duration::from_millis(u64::MAX / 2 + 201));
    }

    #[test]
    fn fill_height_scales_container() {
        let g = PourGeometry::default();
        assert!((g.fill_height(22.1) - 11.934).abs() < 1e-3);
        assert_eq!(g.fill_height(0.0), 0.0);
        assert_eq!(g.fill_height(100.0), 54.0);
    }

    #[test]
    fn fade_steps_are_linear() {
        let a = AudioConfig::default();
        assert_eq!(a.fade_step_interval(), Duration::from_millis(100));
        assert!((a.fade_volume(15) - 0.2).abs() < 1e-6);
        assert!((a.fade_volume(30) - 0.4).abs() < 1e-6);
        assert!((a.fade_volume(99) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_opacity_reported() {
        let mut config = BrewConfig::default();
        config.pour.surface_opacity = 1.5;
        assert!(config.validate().iter().any(|e| e.contains("surface_opacity")));
    }

    #[test]
    fn jsonl_carries_derived_fill() {
        let line = BrewConfig::default().to_jsonl();
        assert!(line.contains(r#""fill_ms":6100"#));
    }

    #[cfg(feature = "config")]
    #[test]
    fn partial_toml_keeps_defaults() {
        let config = BrewConfig::from_toml_str("[overlay]\nhide_delay_ms = 150\n").unwrap();
        assert_eq!(config.overlay.hide_delay_ms, 150);
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[cfg(feature = "config")]
    #[test]
    fn huge_toml_timings_are_rejected() {
        let src = "[timing]\npre_drip_delay_ms = 9223372036854775807\n\
                   fill_start_ms = 9223372036854775807\nfinish_tail_ms = 9223372036854775807\n";
        let err = BrewConfig::from_toml_str(src).unwrap_err();
        let ConfigError::Invalid(errors) = err else {
            panic!("expected validation failure, got {err:?}");
        };
        assert!(errors.iter().any(|e| e.contains("overflows")));
    }

    #[cfg(feature = "config")]
    #[test]
    fn invalid_toml_values_rejected() {
        let err = BrewConfig::from_toml_str("[timing]\ncue_clip_ms = 1000\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
