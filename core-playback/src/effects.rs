//! Audio effects bound to the engine's audio session.

use crate::error::{Result, SessionError};
use crate::units;
use bridge_traits::effects::{AudioEffectFactory, EffectType, Equalizer, LoudnessEnhancer};
use bridge_traits::engine::AudioSessionId;
use core_runtime::config::EffectDescriptor;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Live effect handle.
pub enum EffectInstance {
    LoudnessEnhancer(Box<dyn LoudnessEnhancer>),
    Equalizer(Box<dyn Equalizer>),
}

impl EffectInstance {
    fn set_enabled(&mut self, enabled: bool) -> bridge_traits::error::Result<()> {
        match self {
            EffectInstance::LoudnessEnhancer(effect) => effect.set_enabled(enabled),
            EffectInstance::Equalizer(effect) => effect.set_enabled(enabled),
        }
    }

    fn release(&mut self) {
        match self {
            EffectInstance::LoudnessEnhancer(effect) => effect.release(),
            EffectInstance::Equalizer(effect) => effect.release(),
        }
    }

    fn effect_type(&self) -> EffectType {
        match self {
            EffectInstance::LoudnessEnhancer(_) => EffectType::LoudnessEnhancer,
            EffectInstance::Equalizer(_) => EffectType::Equalizer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EqualizerBand {
    pub index: u16,
    pub lower_frequency: f64,
    pub upper_frequency: f64,
    pub center_frequency: f64,
    pub gain: f64,
}

/// Equalizer capabilities and current band gains. Frequencies in hertz,
/// gains in decibels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EqualizerParameters {
    pub min_decibels: f64,
    pub max_decibels: f64,
    pub bands: Vec<EqualizerBand>,
}

/// Effects attached to the current audio session.
///
/// Rebuilt from the configured descriptors on every session id change; the
/// runtime state of released instances never carries over.
pub struct AudioSessionResources {
    factory: Arc<dyn AudioEffectFactory>,
    descriptors: Vec<EffectDescriptor>,
    session_id: Option<AudioSessionId>,
    instances: HashMap<EffectType, EffectInstance>,
}

impl AudioSessionResources {
    pub fn new(factory: Arc<dyn AudioEffectFactory>, descriptors: Vec<EffectDescriptor>) -> Self {
        Self {
            factory,
            descriptors,
            session_id: None,
            instances: HashMap::new(),
        }
    }

    pub fn session_id(&self) -> Option<AudioSessionId> {
        self.session_id
    }

    pub fn is_active(&self, effect: EffectType) -> bool {
        self.instances.contains_key(&effect)
    }

    pub fn active_count(&self) -> usize {
        self.instances.len()
    }

    /// Release every instance and, if `session_id` is set, create the
    /// configured effects against it in configuration order.
    ///
    /// An effect the host fails to create is logged and left out; the others
    /// are still created.
    pub fn bind(&mut self, session_id: Option<AudioSessionId>) {
        self.release_all();
        self.session_id = session_id;

        let Some(session_id) = session_id else {
            debug!("audio session cleared, no effects bound");
            return;
        };

        for descriptor in &self.descriptors {
            let effect_type = descriptor.effect_type();
            match self.instantiate(descriptor, session_id) {
                Ok(instance) => {
                    self.instances.insert(effect_type, instance);
                }
                Err(err) => {
                    error!(effect = %effect_type, session_id = %session_id, error = %err, "failed to create audio effect");
                }
            }
        }

        info!(session_id = %session_id, effects = self.instances.len(), "audio effects bound");
    }

    fn instantiate(
        &self,
        descriptor: &EffectDescriptor,
        session_id: AudioSessionId,
    ) -> Result<EffectInstance> {
        let mut instance = match descriptor {
            EffectDescriptor::LoudnessEnhancer { target_gain, .. } => {
                let mut enhancer = self.factory.create_loudness_enhancer(session_id)?;
                enhancer.set_target_gain(units::decibels_to_gain(*target_gain))?;
                EffectInstance::LoudnessEnhancer(enhancer)
            }
            EffectDescriptor::Equalizer { .. } => {
                EffectInstance::Equalizer(self.factory.create_equalizer(session_id)?)
            }
        };
        if descriptor.enabled() {
            instance.set_enabled(true)?;
        }
        Ok(instance)
    }

    /// Release and forget every instance.
    pub fn release_all(&mut self) {
        for (_, mut instance) in self.instances.drain() {
            debug!(effect = %instance.effect_type(), "releasing audio effect");
            instance.release();
        }
    }

    pub fn set_enabled(&mut self, effect: EffectType, enabled: bool) -> Result<()> {
        let instance = self
            .instances
            .get_mut(&effect)
            .ok_or(SessionError::EffectUnavailable(effect))?;
        instance.set_enabled(enabled)?;
        Ok(())
    }

    pub fn set_loudness_target_gain(&mut self, decibels: f64) -> Result<()> {
        match self.instances.get_mut(&EffectType::LoudnessEnhancer) {
            Some(EffectInstance::LoudnessEnhancer(enhancer)) => {
                enhancer.set_target_gain(units::decibels_to_gain(decibels))?;
                Ok(())
            }
            _ => Err(SessionError::EffectUnavailable(EffectType::LoudnessEnhancer)),
        }
    }

    pub fn equalizer_parameters(&self) -> Result<EqualizerParameters> {
        let equalizer = self.equalizer()?;
        let (min_level, max_level) = equalizer.band_level_range();
        let bands = (0..equalizer.number_of_bands())
            .map(|band| {
                let (lower, upper) = equalizer.band_freq_range(band);
                EqualizerBand {
                    index: band,
                    lower_frequency: units::millihertz_to_hertz(lower),
                    upper_frequency: units::millihertz_to_hertz(upper),
                    center_frequency: units::millihertz_to_hertz(equalizer.center_freq(band)),
                    gain: units::gain_to_decibels(equalizer.band_level(band) as i32),
                }
            })
            .collect();

        Ok(EqualizerParameters {
            min_decibels: units::gain_to_decibels(min_level as i32),
            max_decibels: units::gain_to_decibels(max_level as i32),
            bands,
        })
    }

    pub fn set_equalizer_band_gain(&mut self, band: u16, decibels: f64) -> Result<()> {
        let equalizer = self.equalizer_mut()?;
        let bands = equalizer.number_of_bands();
        if band >= bands {
            return Err(SessionError::InvalidArgument(format!(
                "equalizer band {} out of range (0..{})",
                band, bands
            )));
        }
        equalizer.set_band_level(band, units::decibels_to_band_level(decibels))?;
        Ok(())
    }

    fn equalizer(&self) -> Result<&dyn Equalizer> {
        match self.instances.get(&EffectType::Equalizer) {
            Some(EffectInstance::Equalizer(equalizer)) => Ok(equalizer.as_ref()),
            _ => Err(SessionError::EffectUnavailable(EffectType::Equalizer)),
        }
    }

    fn equalizer_mut(&mut self) -> Result<&mut Box<dyn Equalizer>> {
        match self.instances.get_mut(&EffectType::Equalizer) {
            Some(EffectInstance::Equalizer(equalizer)) => Ok(equalizer),
            _ => Err(SessionError::EffectUnavailable(EffectType::Equalizer)),
        }
    }
}
