//! Audio post-processing effects.
//!
//! Effects are attached by the host to an [`AudioSessionId`]. The session
//! creates them through an [`AudioEffectFactory`] every time the engine reports
//! a new session id and releases them when the id changes again.
//!
//! Gain values crossing this boundary are integer thousandths of a decibel
//! and frequencies are milli-hertz, which is what native effect APIs report.

use crate::{
    engine::AudioSessionId,
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed catalog of supported effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectType {
    LoudnessEnhancer,
    Equalizer,
}

impl EffectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectType::LoudnessEnhancer => "LoudnessEnhancer",
            EffectType::Equalizer => "Equalizer",
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations shared by every effect instance.
pub trait AudioEffect: PlatformSend {
    fn set_enabled(&mut self, enabled: bool) -> Result<()>;

    fn is_enabled(&self) -> bool;

    /// Detach from the audio session. No other method is called afterwards.
    fn release(&mut self);
}

pub trait LoudnessEnhancer: AudioEffect {
    fn set_target_gain(&mut self, gain_milli_db: i32) -> Result<()>;
}

pub trait Equalizer: AudioEffect {
    fn number_of_bands(&self) -> u16;

    /// Supported `(min, max)` band level in thousandths of a decibel.
    fn band_level_range(&self) -> (i16, i16);

    /// `(lower, upper)` frequency bounds of a band in milli-hertz.
    fn band_freq_range(&self, band: u16) -> (i32, i32);

    fn center_freq(&self, band: u16) -> i32;

    fn band_level(&self, band: u16) -> i16;

    fn set_band_level(&mut self, band: u16, level_milli_db: i16) -> Result<()>;
}

/// Builds effect instances bound to an audio session.
pub trait AudioEffectFactory: PlatformSendSync {
    fn create_loudness_enhancer(
        &self,
        session_id: AudioSessionId,
    ) -> Result<Box<dyn LoudnessEnhancer>>;

    fn create_equalizer(&self, session_id: AudioSessionId) -> Result<Box<dyn Equalizer>>;
}

/// Factory for hosts without effect support. Every creation fails with
/// [`BridgeError::NotAvailable`](crate::error::BridgeError::NotAvailable).
#[derive(Debug, Clone, Default)]
pub struct NoEffects;

impl AudioEffectFactory for NoEffects {
    fn create_loudness_enhancer(
        &self,
        _session_id: AudioSessionId,
    ) -> Result<Box<dyn LoudnessEnhancer>> {
        Err(crate::error::BridgeError::NotAvailable(
            "loudness enhancer".to_string(),
        ))
    }

    fn create_equalizer(&self, _session_id: AudioSessionId) -> Result<Box<dyn Equalizer>> {
        Err(crate::error::BridgeError::NotAvailable("equalizer".to_string()))
    }
}
