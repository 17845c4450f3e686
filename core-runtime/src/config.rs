//! # Session Configuration
//!
//! Static settings for one playback session, fixed at construction time.
//!
//! ## Overview
//!
//! `SessionConfig` is assembled through [`SessionConfigBuilder`] (or
//! deserialized from the JSON the host received from its client) and
//! validated fail-fast before a session accepts any command. Durations that
//! clients send are microseconds, like every other time value on the public
//! surface; the session converts them to the engine's units when it builds the
//! engine.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{EffectDescriptor, SessionConfig};
//!
//! let config = SessionConfig::builder()
//!     .audio_effect(EffectDescriptor::LoudnessEnhancer { enabled: false, target_gain: 0.0 })
//!     .audio_effect(EffectDescriptor::Equalizer { enabled: true })
//!     .user_agent("MyPlayer/1.0")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::effects::EffectType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// User agent sent by HTTP-backed sources when neither the descriptor nor the
/// configuration provides one.
pub const DEFAULT_USER_AGENT: &str = "playback-session";

/// Static description of one post-processing effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EffectDescriptor {
    #[serde(rename_all = "camelCase")]
    LoudnessEnhancer {
        enabled: bool,
        /// Target gain in decibels.
        target_gain: f64,
    },
    Equalizer { enabled: bool },
}

impl EffectDescriptor {
    pub fn effect_type(&self) -> EffectType {
        match self {
            EffectDescriptor::LoudnessEnhancer { .. } => EffectType::LoudnessEnhancer,
            EffectDescriptor::Equalizer { .. } => EffectType::Equalizer,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            EffectDescriptor::LoudnessEnhancer { enabled, .. }
            | EffectDescriptor::Equalizer { enabled } => *enabled,
        }
    }
}

/// Buffering thresholds. Durations in microseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadControlConfig {
    #[serde(default = "default_min_buffer_duration")]
    pub min_buffer_duration: i64,
    #[serde(default = "default_max_buffer_duration")]
    pub max_buffer_duration: i64,
    #[serde(default = "default_buffer_for_playback_duration")]
    pub buffer_for_playback_duration: i64,
    #[serde(default = "default_buffer_for_playback_after_rebuffer_duration")]
    pub buffer_for_playback_after_rebuffer_duration: i64,
    #[serde(default)]
    pub back_buffer_duration: i64,
    #[serde(default = "default_true")]
    pub prioritize_time_over_size_thresholds: bool,
    #[serde(default)]
    pub target_buffer_bytes: Option<i32>,
}

impl Default for LoadControlConfig {
    fn default() -> Self {
        Self {
            min_buffer_duration: default_min_buffer_duration(),
            max_buffer_duration: default_max_buffer_duration(),
            buffer_for_playback_duration: default_buffer_for_playback_duration(),
            buffer_for_playback_after_rebuffer_duration:
                default_buffer_for_playback_after_rebuffer_duration(),
            back_buffer_duration: 0,
            prioritize_time_over_size_thresholds: true,
            target_buffer_bytes: None,
        }
    }
}

impl LoadControlConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        let durations = [
            ("minBufferDuration", self.min_buffer_duration),
            ("maxBufferDuration", self.max_buffer_duration),
            ("bufferForPlaybackDuration", self.buffer_for_playback_duration),
            (
                "bufferForPlaybackAfterRebufferDuration",
                self.buffer_for_playback_after_rebuffer_duration,
            ),
            ("backBufferDuration", self.back_buffer_duration),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, value)| *value < 0) {
            return Err(format!("{} must not be negative", name));
        }
        if self.min_buffer_duration > self.max_buffer_duration {
            return Err("minBufferDuration must not exceed maxBufferDuration".to_string());
        }
        if self.buffer_for_playback_duration > self.max_buffer_duration
            || self.buffer_for_playback_after_rebuffer_duration > self.max_buffer_duration
        {
            return Err("playback buffers must not exceed maxBufferDuration".to_string());
        }
        if matches!(self.target_buffer_bytes, Some(bytes) if bytes <= 0) {
            return Err("targetBufferBytes must be positive".to_string());
        }
        Ok(())
    }
}

/// Live-edge playback speed control. Durations in microseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePlaybackSpeedConfig {
    pub fallback_min_playback_speed: f32,
    pub fallback_max_playback_speed: f32,
    pub min_update_interval: i64,
    pub proportional_control_factor: f32,
    pub max_live_offset_error_for_unit_speed: i64,
    pub target_live_offset_increment_on_rebuffer: i64,
    pub min_possible_live_offset_smoothing_factor: f32,
}

impl Default for LivePlaybackSpeedConfig {
    fn default() -> Self {
        Self {
            fallback_min_playback_speed: 0.97,
            fallback_max_playback_speed: 1.03,
            min_update_interval: 1_000_000,
            proportional_control_factor: 0.1,
            max_live_offset_error_for_unit_speed: 20_000,
            target_live_offset_increment_on_rebuffer: 500_000,
            min_possible_live_offset_smoothing_factor: 0.999,
        }
    }
}

impl LivePlaybackSpeedConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.fallback_min_playback_speed > 0.0 && self.fallback_min_playback_speed <= 1.0) {
            return Err("fallbackMinPlaybackSpeed must be in (0, 1]".to_string());
        }
        if self.fallback_max_playback_speed < 1.0 {
            return Err("fallbackMaxPlaybackSpeed must be at least 1".to_string());
        }
        if self.min_update_interval < 0
            || self.max_live_offset_error_for_unit_speed < 0
            || self.target_live_offset_increment_on_rebuffer < 0
        {
            return Err("live speed control durations must not be negative".to_string());
        }
        if !(0.0..1.0).contains(&self.min_possible_live_offset_smoothing_factor) {
            return Err("minPossibleLiveOffsetSmoothingFactor must be in [0, 1)".to_string());
        }
        Ok(())
    }
}

/// Delays between buffered-position polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollIntervals {
    /// While the engine is buffering
    pub buffering: Duration,
    /// While ready and playing
    pub playing: Duration,
    /// While ready and paused
    pub paused: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            buffering: Duration::from_millis(200),
            playing: Duration::from_millis(500),
            paused: Duration::from_millis(1000),
        }
    }
}

/// Static configuration of a playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Effect catalog, instantiated in this order on every audio session.
    #[serde(default)]
    pub audio_effects: Vec<EffectDescriptor>,
    #[serde(default)]
    pub load_control: Option<LoadControlConfig>,
    #[serde(default)]
    pub live_playback_speed_control: Option<LivePlaybackSpeedConfig>,
    #[serde(default)]
    pub offload_scheduling_enabled: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub poll_intervals: PollIntervals,
    /// Engine errors per load after which automatic skip-ahead stops.
    #[serde(default = "default_max_recovery_errors")]
    pub max_recovery_errors: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            audio_effects: Vec::new(),
            load_control: None,
            live_playback_speed_control: None,
            offload_scheduling_enabled: false,
            user_agent: default_user_agent(),
            poll_intervals: PollIntervals::default(),
            max_recovery_errors: default_max_recovery_errors(),
        }
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Parse and validate a configuration sent by the client.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let config: SessionConfig = serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("Malformed session configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for descriptor in &self.audio_effects {
            let effect_type = descriptor.effect_type();
            if !seen.insert(effect_type) {
                return Err(Error::Config(format!(
                    "Effect {} is configured more than once",
                    effect_type
                )));
            }
        }

        if let Some(load_control) = &self.load_control {
            load_control
                .validate()
                .map_err(|e| Error::Config(format!("Invalid load control: {}", e)))?;
        }

        if let Some(live) = &self.live_playback_speed_control {
            live.validate()
                .map_err(|e| Error::Config(format!("Invalid live speed control: {}", e)))?;
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("User agent must not be empty".to_string()));
        }

        let intervals = &self.poll_intervals;
        if intervals.buffering.is_zero() || intervals.playing.is_zero() || intervals.paused.is_zero()
        {
            return Err(Error::Config("Poll intervals must be non-zero".to_string()));
        }

        Ok(())
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Append an effect to the catalog.
    pub fn audio_effect(mut self, descriptor: EffectDescriptor) -> Self {
        self.config.audio_effects.push(descriptor);
        self
    }

    pub fn load_control(mut self, load_control: LoadControlConfig) -> Self {
        self.config.load_control = Some(load_control);
        self
    }

    pub fn live_playback_speed_control(mut self, live: LivePlaybackSpeedConfig) -> Self {
        self.config.live_playback_speed_control = Some(live);
        self
    }

    pub fn offload_scheduling_enabled(mut self, enabled: bool) -> Self {
        self.config.offload_scheduling_enabled = enabled;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn poll_intervals(mut self, intervals: PollIntervals) -> Self {
        self.config.poll_intervals = intervals;
        self
    }

    pub fn max_recovery_errors(mut self, max: u32) -> Self {
        self.config.max_recovery_errors = max;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<SessionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_recovery_errors() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_min_buffer_duration() -> i64 {
    50_000_000
}

fn default_max_buffer_duration() -> i64 {
    50_000_000
}

fn default_buffer_for_playback_duration() -> i64 {
    2_500_000
}

fn default_buffer_for_playback_after_rebuffer_duration() -> i64 {
    5_000_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_recovery_errors, 5);
        assert_eq!(config.poll_intervals.buffering, Duration::from_millis(200));
        assert_eq!(config.poll_intervals.playing, Duration::from_millis(500));
        assert_eq!(config.poll_intervals.paused, Duration::from_millis(1000));
    }

    #[test]
    fn test_builder_keeps_effect_order() {
        let config = SessionConfig::builder()
            .audio_effect(EffectDescriptor::Equalizer { enabled: true })
            .audio_effect(EffectDescriptor::LoudnessEnhancer {
                enabled: false,
                target_gain: 2.5,
            })
            .build()
            .unwrap();

        let order: Vec<_> = config.audio_effects.iter().map(|d| d.effect_type()).collect();
        assert_eq!(order, vec![EffectType::Equalizer, EffectType::LoudnessEnhancer]);
    }

    #[test]
    fn test_duplicate_effects_rejected() {
        let result = SessionConfig::builder()
            .audio_effect(EffectDescriptor::Equalizer { enabled: true })
            .audio_effect(EffectDescriptor::Equalizer { enabled: false })
            .build();

        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Equalizer")));
    }

    #[test]
    fn test_load_control_validation() {
        let mut load_control = LoadControlConfig::default();
        assert!(load_control.validate().is_ok());

        load_control.min_buffer_duration = load_control.max_buffer_duration + 1;
        assert!(load_control.validate().is_err());

        let negative = LoadControlConfig {
            back_buffer_duration: -1,
            ..Default::default()
        };
        assert!(negative.validate().unwrap_err().contains("backBufferDuration"));
    }

    #[test]
    fn test_live_speed_validation() {
        let mut live = LivePlaybackSpeedConfig::default();
        assert!(live.validate().is_ok());

        live.fallback_max_playback_speed = 0.5;
        assert!(live.validate().is_err());
    }

    #[test]
    fn test_from_json() {
        let config = SessionConfig::from_json(json!({
            "audioEffects": [
                { "type": "LoudnessEnhancer", "enabled": true, "targetGain": 1.5 },
                { "type": "Equalizer", "enabled": false }
            ],
            "loadControl": { "minBufferDuration": 10000000, "maxBufferDuration": 20000000 },
            "offloadSchedulingEnabled": true
        }))
        .unwrap();

        assert_eq!(config.audio_effects.len(), 2);
        assert!(config.audio_effects[0].enabled());
        assert!(config.offload_scheduling_enabled);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        let load_control = config.load_control.unwrap();
        assert_eq!(load_control.min_buffer_duration, 10_000_000);
        assert_eq!(load_control.buffer_for_playback_duration, 2_500_000);
    }

    #[test]
    fn test_from_json_rejects_unknown_effect() {
        let result = SessionConfig::from_json(json!({
            "audioEffects": [{ "type": "Reverb", "enabled": true }]
        }));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_user_agent_rejected() {
        let result = SessionConfig::builder().user_agent("  ").build();
        assert!(result.is_err());
    }
}
