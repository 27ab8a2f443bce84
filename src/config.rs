//! Session configuration.
//!
//! Maps to the JSON settings object passed by hosts. Every field is
//! optional in JSON and falls back to its default.

use serde::{Deserialize, Serialize};

use crate::engine::reference::ReferenceVocoder;
use crate::error::{Result, VoiceError};
use crate::params::{MIN_F0_FLOOR, transform_size_for_f0_floor};
use crate::transform::TransformSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoiceTransformConfig {
    /// F0 multiplier (1.0 = unchanged).
    pub pitch_scale: f64,
    /// Envelope frequency-axis stretch (1.0 = unchanged).
    pub formant_scale: f64,
    /// Analysis frame period in milliseconds.
    pub frame_period_ms: f64,
    /// Lowest F0 the spectral transform must resolve; fixes the transform size.
    pub f0_floor: f64,
    /// Samples per drained chunk in streaming synthesis.
    pub chunk_size: usize,
    /// Frames the streaming synthesizer may buffer.
    pub look_ahead_depth: usize,
    /// Seed for the reference vocoder's noise excitation.
    pub noise_seed: u32,
}

impl Default for VoiceTransformConfig {
    fn default() -> Self {
        VoiceTransformConfig {
            pitch_scale: 1.0,
            formant_scale: 1.0,
            frame_period_ms: 5.0,
            f0_floor: 71.0,
            chunk_size: 64,
            look_ahead_depth: 1,
            noise_seed: 0,
        }
    }
}

impl VoiceTransformConfig {
    /// Parse and validate a JSON settings object.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: VoiceTransformConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.settings().validate()?;
        if !(self.frame_period_ms.is_finite() && self.frame_period_ms > 0.0) {
            return Err(VoiceError::invalid(
                "framePeriodMs",
                format!("must be a positive number, got {}", self.frame_period_ms),
            ));
        }
        if !(self.f0_floor.is_finite() && self.f0_floor >= MIN_F0_FLOOR) {
            return Err(VoiceError::invalid(
                "f0Floor",
                format!("must be at least {MIN_F0_FLOOR} Hz, got {}", self.f0_floor),
            ));
        }
        if self.chunk_size == 0 {
            return Err(VoiceError::invalid("chunkSize", "must be at least 1"));
        }
        if self.look_ahead_depth == 0 {
            return Err(VoiceError::invalid("lookAheadDepth", "must be at least 1"));
        }
        Ok(())
    }

    pub fn settings(&self) -> TransformSettings {
        TransformSettings {
            pitch_scale: self.pitch_scale,
            formant_scale: self.formant_scale,
        }
    }

    /// Spectral transform length analysis uses at `sample_rate`.
    pub fn transform_size(&self, sample_rate: u32) -> usize {
        transform_size_for_f0_floor(sample_rate, self.f0_floor)
    }

    pub fn reference_engine(&self) -> ReferenceVocoder {
        ReferenceVocoder::new(self.noise_seed)
    }
}
