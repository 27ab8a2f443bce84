//! Parameter Transformer: pitch scaling and formant warping.
//!
//! Pitch is multiplied frame by frame. The spectral envelope is warped
//! along its frequency axis in the log-magnitude domain: each row is
//! log-transformed, resampled from a stretched frequency axis onto the
//! bin axis with linear interpolation, and exponentiated back.
//! Aperiodicity is left untouched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dsp::interp::interp1;
use crate::error::{Result, VoiceError};
use crate::params::FrameParameterSet;

/// Pitch and formant scale factors. 1.0 leaves a quantity unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformSettings {
    /// F0 multiplier.
    pub pitch_scale: f64,
    /// Frequency-axis stretch of the envelope; < 1 compresses, > 1 expands.
    pub formant_scale: f64,
}

impl Default for TransformSettings {
    fn default() -> Self {
        TransformSettings {
            pitch_scale: 1.0,
            formant_scale: 1.0,
        }
    }
}

impl TransformSettings {
    pub fn new(pitch_scale: f64, formant_scale: f64) -> Result<Self> {
        let settings = TransformSettings {
            pitch_scale,
            formant_scale,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Build from integer percentages as sent by the real-time host
    /// (100 = unity).
    pub fn from_percent(shift: i32, ratio: i32) -> Result<Self> {
        Self::new(shift as f64 / 100.0, ratio as f64 / 100.0)
    }

    pub fn validate(&self) -> Result<()> {
        check_scale("pitchScale", self.pitch_scale)?;
        check_scale("formantScale", self.formant_scale)
    }

    pub fn is_identity(&self) -> bool {
        self.pitch_scale == 1.0 && self.formant_scale == 1.0
    }
}

fn check_scale(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(VoiceError::invalid(name, format!("must be a positive number, got {value}")))
    }
}

/// Apply both transforms to every frame of `params`.
///
/// Runs to completion before returning; the set is only meaningful to a
/// synthesis driver afterwards.
///
/// # Panics
/// If either scale is not a positive finite number.
pub fn transform_parameters(params: &mut FrameParameterSet, settings: &TransformSettings) {
    assert!(
        settings.validate().is_ok(),
        "transform scales must be positive: {settings:?}"
    );
    debug!(
        frames = params.frame_count(),
        pitch_scale = settings.pitch_scale,
        formant_scale = settings.formant_scale,
        "transforming vocoder parameters"
    );
    scale_pitch(params.pitch_mut(), settings.pitch_scale);
    warp_formants(params, settings.formant_scale);
}

/// Multiply every F0 value by `pitch_scale`. Unvoiced frames stay at 0.
pub fn scale_pitch(pitch: &mut [f64], pitch_scale: f64) {
    for f0 in pitch.iter_mut() {
        *f0 *= pitch_scale;
    }
}

/// Warp each envelope row's frequency axis by `formant_scale`.
///
/// Source axis `formant_scale * j / N * fs`, target axis `j / N * fs`,
/// `N` the transform size. When compressing, the bins the source axis no
/// longer reaches are held flat at the last determined bin.
pub fn warp_formants(params: &mut FrameParameterSet, formant_scale: f64) {
    let n = params.transform_size();
    let width = params.spectral_width();
    let fs = params.sample_rate() as f64;

    let source_axis: Vec<f64> = (0..width)
        .map(|j| formant_scale * j as f64 / n as f64 * fs)
        .collect();
    let target_axis: Vec<f64> = (0..width).map(|j| j as f64 / n as f64 * fs).collect();
    let hold_from = flat_extension_start(n / 2, formant_scale);

    let mut log_spectrum = vec![0.0; width];
    let mut warped = vec![0.0; width];

    for frame in 0..params.frame_count() {
        let row = params.envelope_mut(frame);
        for (dst, &v) in log_spectrum.iter_mut().zip(row.iter()) {
            *dst = v.ln();
        }
        interp1(&source_axis, &log_spectrum, &target_axis, &mut warped);
        for (dst, &v) in row.iter_mut().zip(warped.iter()) {
            *dst = v.exp();
        }

        if let Some(start) = hold_from {
            let held = row[start - 1];
            for v in row[start..].iter_mut() {
                *v = held;
            }
        }
    }
}

/// First bin overwritten by the flat extension, or `None` when not
/// compressing. Never below 1, so bin 0 always survives.
fn flat_extension_start(half: usize, formant_scale: f64) -> Option<usize> {
    if formant_scale >= 1.0 {
        return None;
    }
    let start = (half as f64 * formant_scale) as usize;
    Some(start.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A set with a smooth, strictly positive, frame-dependent envelope.
    fn shaped_set(sample_rate: u32, transform_size: usize, frames: usize) -> FrameParameterSet {
        let mut p = FrameParameterSet::new(sample_rate, 5.0, transform_size, frames);
        for i in 0..frames {
            p.pitch_mut()[i] = if i % 4 == 3 { 0.0 } else { 100.0 + i as f64 };
            let width = p.spectral_width();
            for (j, v) in p.envelope_mut(i).iter_mut().enumerate() {
                let x = j as f64 / width as f64;
                *v = 1e-3 + (-(x * 6.0 - 1.0).powi(2)).exp() * (1.0 + 0.01 * i as f64);
            }
            for (j, v) in p.aperiodicity_mut(i).iter_mut().enumerate() {
                *v = j as f64 / width as f64;
            }
        }
        p
    }

    #[test]
    fn pitch_scales_exactly() {
        let mut p = shaped_set(16000, 64, 12);
        let original = p.pitch().to_vec();
        transform_parameters(&mut p, &TransformSettings::new(1.5, 1.0).unwrap());
        for (after, before) in p.pitch().iter().zip(&original) {
            assert_eq!(*after, before * 1.5);
        }
    }

    #[test]
    fn unvoiced_frames_stay_unvoiced() {
        let mut p = shaped_set(16000, 64, 12);
        transform_parameters(&mut p, &TransformSettings::new(3.0, 1.2).unwrap());
        for i in (3..12).step_by(4) {
            assert_eq!(p.pitch()[i], 0.0);
        }
    }

    #[test]
    fn unit_formant_scale_round_trips() {
        let mut p = shaped_set(16000, 128, 6);
        let original = p.clone();
        warp_formants(&mut p, 1.0);
        for i in 0..p.frame_count() {
            for (a, b) in p.envelope(i).iter().zip(original.envelope(i)) {
                assert!((a - b).abs() <= 1e-12 * b.abs().max(1.0), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn compression_holds_upper_bins_flat() {
        let mut p = shaped_set(16000, 64, 5);
        warp_formants(&mut p, 0.8);
        // floor(32 * 0.8) = 25
        for i in 0..p.frame_count() {
            let row = p.envelope(i);
            for j in 25..row.len() {
                assert_eq!(row[j], row[24], "frame {i} bin {j}");
            }
        }
    }

    #[test]
    fn expansion_reads_from_lower_frequencies() {
        let mut p = FrameParameterSet::new(8000, 5.0, 16, 1);
        // log-linear ramp: ln(env[j]) = j
        for (j, v) in p.envelope_mut(0).iter_mut().enumerate() {
            *v = (j as f64).exp();
        }
        warp_formants(&mut p, 2.0);
        let row = p.envelope(0);
        // Target bin j reads source position j / 2.
        for j in 0..9 {
            let expected = (j as f64 / 2.0).exp();
            assert!((row[j] - expected).abs() < 1e-9 * expected, "bin {j}");
        }
    }

    #[test]
    fn compression_maps_bins_upwards() {
        let mut p = FrameParameterSet::new(8000, 5.0, 16, 1);
        for (j, v) in p.envelope_mut(0).iter_mut().enumerate() {
            *v = (j as f64).exp();
        }
        warp_formants(&mut p, 0.5);
        let row = p.envelope(0);
        // Target bin j reads source position 2j, available for j < 4.
        for j in 0..4 {
            let expected = (2.0 * j as f64).exp();
            assert!((row[j] - expected).abs() < 1e-9 * expected, "bin {j}");
        }
        for j in 4..9 {
            assert_eq!(row[j], row[3]);
        }
    }

    #[test]
    fn aperiodicity_untouched() {
        let mut p = shaped_set(16000, 64, 4);
        let original = p.clone();
        transform_parameters(&mut p, &TransformSettings::new(0.7, 0.6).unwrap());
        for i in 0..p.frame_count() {
            assert_eq!(p.aperiodicity(i), original.aperiodicity(i));
        }
    }

    #[test]
    fn concrete_scenario_sixteen_khz() {
        let mut p = shaped_set(16000, 1024, 200);
        let original = p.pitch().to_vec();
        transform_parameters(&mut p, &TransformSettings::new(1.5, 0.8).unwrap());
        for (after, before) in p.pitch().iter().zip(&original) {
            if *before > 0.0 {
                assert!((after / before - 1.5).abs() < 1e-12);
            } else {
                assert_eq!(*after, 0.0);
            }
        }
        for i in 0..p.frame_count() {
            let row = p.envelope(i);
            for j in 409..=512 {
                assert_eq!(row[j], row[408]);
            }
        }
    }

    #[test]
    fn extreme_compression_keeps_bin_zero() {
        assert_eq!(flat_extension_start(8, 0.01), Some(1));
        assert_eq!(flat_extension_start(512, 0.8), Some(409));
        assert_eq!(flat_extension_start(512, 1.0), None);
        let mut p = shaped_set(8000, 16, 2);
        warp_formants(&mut p, 0.01);
        for i in 0..2 {
            let row = p.envelope(i);
            assert!(row.iter().all(|&v| v == row[0]));
        }
    }

    #[test]
    fn percent_settings() {
        let s = TransformSettings::from_percent(150, 80).unwrap();
        assert!((s.pitch_scale - 1.5).abs() < 1e-12);
        assert!((s.formant_scale - 0.8).abs() < 1e-12);
        assert!(TransformSettings::from_percent(100, 100).unwrap().is_identity());
    }

    #[test]
    fn rejects_non_positive_scales() {
        assert!(TransformSettings::new(0.0, 1.0).is_err());
        assert!(TransformSettings::new(1.0, -0.5).is_err());
        assert!(TransformSettings::new(f64::NAN, 1.0).is_err());
        assert!(TransformSettings::from_percent(100, 0).is_err());
    }

    #[test]
    #[should_panic(expected = "must be positive")]
    fn transform_panics_on_bad_scale() {
        let mut p = shaped_set(8000, 16, 1);
        let bad = TransformSettings {
            pitch_scale: -1.0,
            formant_scale: 1.0,
        };
        transform_parameters(&mut p, &bad);
    }
}
