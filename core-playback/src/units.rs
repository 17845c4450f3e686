//! Unit conversions between the public surface and the host bridges.
//!
//! Clients speak microseconds and decibels. The engine speaks milliseconds,
//! effects speak thousandths of a decibel and milli-hertz. Every conversion
//! in the crate goes through this module.

use bridge_traits::engine::{EngineOptions, LiveSpeedControlOptions, LoadControlOptions};
use core_runtime::config::{LivePlaybackSpeedConfig, LoadControlConfig, SessionConfig};

/// Public microseconds to engine milliseconds. Negative input clamps to zero.
pub fn micros_to_engine(micros: i64) -> i64 {
    micros.max(0) / 1000
}

/// Engine milliseconds to public microseconds. Negative input clamps to zero.
pub fn engine_to_micros(millis: i64) -> i64 {
    millis.max(0).saturating_mul(1000)
}

/// Decibels to the integer gain unit used by effects.
pub fn decibels_to_gain(decibels: f64) -> i32 {
    (decibels * 1000.0).round() as i32
}

pub fn gain_to_decibels(gain: i32) -> f64 {
    gain as f64 / 1000.0
}

/// Band level for an equalizer, saturated to the `i16` range.
pub fn decibels_to_band_level(decibels: f64) -> i16 {
    decibels_to_gain(decibels).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

pub fn millihertz_to_hertz(millihertz: i32) -> f64 {
    millihertz as f64 / 1000.0
}

fn micros_to_engine_i32(micros: i64) -> i32 {
    micros_to_engine(micros).min(i32::MAX as i64) as i32
}

/// Build the engine construction options from a session configuration.
pub fn engine_options(config: &SessionConfig) -> EngineOptions {
    EngineOptions {
        load_control: config.load_control.as_ref().map(load_control_options),
        live_speed_control: config
            .live_playback_speed_control
            .as_ref()
            .map(live_speed_control_options),
        offload_scheduling_enabled: config.offload_scheduling_enabled,
    }
}

fn load_control_options(config: &LoadControlConfig) -> LoadControlOptions {
    LoadControlOptions {
        min_buffer_ms: micros_to_engine_i32(config.min_buffer_duration),
        max_buffer_ms: micros_to_engine_i32(config.max_buffer_duration),
        buffer_for_playback_ms: micros_to_engine_i32(config.buffer_for_playback_duration),
        buffer_for_playback_after_rebuffer_ms: micros_to_engine_i32(
            config.buffer_for_playback_after_rebuffer_duration,
        ),
        back_buffer_ms: micros_to_engine_i32(config.back_buffer_duration),
        prioritize_time_over_size_thresholds: config.prioritize_time_over_size_thresholds,
        target_buffer_bytes: config.target_buffer_bytes,
    }
}

fn live_speed_control_options(config: &LivePlaybackSpeedConfig) -> LiveSpeedControlOptions {
    LiveSpeedControlOptions {
        fallback_min_playback_speed: config.fallback_min_playback_speed,
        fallback_max_playback_speed: config.fallback_max_playback_speed,
        min_update_interval_ms: micros_to_engine(config.min_update_interval),
        proportional_control_factor: config.proportional_control_factor,
        max_live_offset_error_ms_for_unit_speed: micros_to_engine(
            config.max_live_offset_error_for_unit_speed,
        ),
        target_live_offset_increment_on_rebuffer_ms: micros_to_engine(
            config.target_live_offset_increment_on_rebuffer,
        ),
        min_possible_live_offset_smoothing_factor: config.min_possible_live_offset_smoothing_factor,
    }
}
