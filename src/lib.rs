pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod params;
pub mod synthesis;
pub mod transform;

use serde::Serialize;
use tracing::debug;
use wasm_bindgen::prelude::*;

use crate::config::VoiceTransformConfig;
use crate::engine::{Analyzer, VocoderEngine};
use crate::error::{Result, VoiceError};
use crate::params::FrameParameterSet;
use crate::synthesis::streaming::stream_to_vec;
use crate::synthesis::{StreamReport, synthesize_batch};
use crate::transform::transform_parameters;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the voice-transformer-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Transform analysed parameters in place and render them in one pass.
///
/// The waveform covers every frame (`params.duration_samples()` long).
pub fn transform_voice<E: VocoderEngine>(
    params: &mut FrameParameterSet,
    config: &VoiceTransformConfig,
    engine: &E,
) -> Result<Vec<f64>> {
    config.validate()?;
    transform_parameters(params, &config.settings());
    Ok(synthesize_batch(engine, params, params.duration_samples()))
}

/// Transform analysed parameters in place and render them through the
/// streaming driver.
pub fn stream_voice<E: VocoderEngine>(
    params: &mut FrameParameterSet,
    config: &VoiceTransformConfig,
    engine: &E,
) -> Result<(Vec<f64>, StreamReport)> {
    config.validate()?;
    transform_parameters(params, &config.settings());
    stream_to_vec(engine, params, config.chunk_size, config.look_ahead_depth)
}

/// Full pipeline on a raw waveform: analyse, transform, resynthesize.
///
/// The output has the same length as `x`. F0 is only rescaled after the
/// analyser has produced every parameter.
pub fn transform_waveform<A, E>(
    analyzer: &A,
    engine: &E,
    x: &[f64],
    sample_rate: u32,
    config: &VoiceTransformConfig,
) -> Result<Vec<f64>>
where
    A: Analyzer,
    E: VocoderEngine,
{
    config.validate()?;
    if sample_rate == 0 {
        return Err(VoiceError::invalid("sampleRate", "must be positive"));
    }
    let mut params = analyzer.analyze(x, sample_rate, config.frame_period_ms);
    debug!(
        samples = x.len(),
        frames = params.frame_count(),
        transform_size = params.transform_size(),
        "analysed waveform"
    );
    transform_parameters(&mut params, &config.settings());
    Ok(synthesize_batch(engine, &params, x.len()))
}

#[derive(Serialize)]
struct StreamOutput {
    samples: Vec<f64>,
    report: StreamReport,
}

fn parse_config(config_json: &str) -> std::result::Result<VoiceTransformConfig, JsValue> {
    if config_json.trim().is_empty() {
        return Ok(VoiceTransformConfig::default());
    }
    VoiceTransformConfig::from_json(config_json).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: transform flattened frame parameters and render them with
/// the reference vocoder. `config_json` may be empty for defaults.
#[wasm_bindgen]
pub fn transform_frames(
    sample_rate: u32,
    frame_period_ms: f64,
    transform_size: usize,
    pitch: Vec<f64>,
    envelope: Vec<f64>,
    aperiodicity: Vec<f64>,
    config_json: &str,
) -> std::result::Result<Vec<f64>, JsValue> {
    let config = parse_config(config_json)?;
    let mut params = FrameParameterSet::from_flat(
        sample_rate,
        frame_period_ms,
        transform_size,
        pitch,
        &envelope,
        &aperiodicity,
    )
    .map_err(|e| JsValue::from_str(&format!("{e}")))?;
    transform_voice(&mut params, &config, &config.reference_engine()).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: like `transform_frames`, but rendered through the
/// streaming driver. Returns `{ samples, report }`.
#[wasm_bindgen]
pub fn stream_frames(
    sample_rate: u32,
    frame_period_ms: f64,
    transform_size: usize,
    pitch: Vec<f64>,
    envelope: Vec<f64>,
    aperiodicity: Vec<f64>,
    config_json: &str,
) -> std::result::Result<JsValue, JsValue> {
    let config = parse_config(config_json)?;
    let mut params = FrameParameterSet::from_flat(
        sample_rate,
        frame_period_ms,
        transform_size,
        pitch,
        &envelope,
        &aperiodicity,
    )
    .map_err(|e| JsValue::from_str(&format!("{e}")))?;
    let (samples, report) = stream_voice(&mut params, &config, &config.reference_engine())
        .map_err(|e| JsValue::from_str(&format!("{e}")))?;
    serde_wasm_bindgen::to_value(&StreamOutput { samples, report }).map_err(|e| JsValue::from_str(&format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::ring_buffer::{BLOCK_QUANTA, RENDER_QUANTUM, RING_LENGTH, RingBufferBridge};
    use crate::engine::reference::ReferenceVocoder;
    use crate::params::frame_count_for_length;
    use std::f64::consts::PI;

    /// Analyser stand-in: a fixed 150 Hz voiced contour with one formant
    /// bump, shaped to the input length.
    struct SteadyVowel;

    impl Analyzer for SteadyVowel {
        fn analyze(&self, x: &[f64], sample_rate: u32, frame_period_ms: f64) -> FrameParameterSet {
            let frames = frame_count_for_length(sample_rate, x.len(), frame_period_ms);
            let transform_size = VoiceTransformConfig::default().transform_size(sample_rate);
            let mut p = FrameParameterSet::new(sample_rate, frame_period_ms, transform_size, frames);
            let width = p.spectral_width();
            for i in 0..frames {
                p.pitch_mut()[i] = 150.0;
                for (j, v) in p.envelope_mut(i).iter_mut().enumerate() {
                    let hz = j as f64 * sample_rate as f64 / transform_size as f64;
                    *v = 1e-4 + (-((hz - 700.0) / 300.0).powi(2)).exp();
                }
                for (j, v) in p.aperiodicity_mut(i).iter_mut().enumerate() {
                    *v = 0.05 + 0.9 * j as f64 / width as f64;
                }
            }
            p
        }
    }

    fn sine(freq: f64, sample_rate: u32, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    #[test]
    fn version_matches_cargo() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn waveform_pipeline_keeps_length() {
        let x = sine(150.0, 16000, 4000);
        let config = VoiceTransformConfig {
            pitch_scale: 1.5,
            formant_scale: 0.8,
            ..Default::default()
        };
        let y = transform_waveform(&SteadyVowel, &ReferenceVocoder::default(), &x, 16000, &config).unwrap();
        assert_eq!(y.len(), x.len());
        assert!(y.iter().any(|&s| s.abs() > 1e-4));
        assert!(y.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn waveform_pipeline_rejects_bad_config() {
        let config = VoiceTransformConfig {
            formant_scale: 0.0,
            ..Default::default()
        };
        let result = transform_waveform(&SteadyVowel, &ReferenceVocoder::default(), &[0.0; 100], 16000, &config);
        assert!(result.is_err());
    }

    #[test]
    fn waveform_pipeline_rejects_zero_sample_rate() {
        let result = transform_waveform(
            &SteadyVowel,
            &ReferenceVocoder::default(),
            &[0.0; 100],
            0,
            &VoiceTransformConfig::default(),
        );
        assert!(matches!(result, Err(VoiceError::InvalidParameter { .. })));
    }

    #[test]
    fn batch_and_stream_entry_points_agree() {
        let config = VoiceTransformConfig {
            pitch_scale: 0.75,
            formant_scale: 1.2,
            chunk_size: 128,
            look_ahead_depth: 2,
            noise_seed: 11,
            ..Default::default()
        };
        let analysed = SteadyVowel.analyze(&[0.0; 3200], 16000, config.frame_period_ms);
        let engine = config.reference_engine();

        let mut a = analysed.clone();
        let batch = transform_voice(&mut a, &config, &engine).unwrap();
        let mut b = analysed.clone();
        let (streamed, report) = stream_voice(&mut b, &config, &engine).unwrap();

        assert_eq!(a, b);
        assert!(report.is_complete());
        assert_eq!(streamed.len(), batch.len() / 128 * 128);
        for (s, t) in streamed.iter().zip(&batch) {
            assert!((s - t).abs() < 1e-9);
        }
    }

    #[test]
    fn realtime_bridge_runs_block_transform() {
        let sample_rate = 48000;
        let config = VoiceTransformConfig {
            pitch_scale: 1.2,
            frame_period_ms: crate::params::frame_period_for_block(BLOCK_QUANTA, sample_rate),
            ..Default::default()
        };
        let engine = config.reference_engine();
        let input = sine(200.0, sample_rate, RING_LENGTH * RENDER_QUANTUM * 2);
        let mut bridge = RingBufferBridge::new();
        let mut out = vec![0.0f32; RENDER_QUANTUM];
        let mut heard = 0.0f64;

        for quantum in input.chunks(RENDER_QUANTUM) {
            let q: Vec<f32> = quantum.iter().map(|&s| s as f32).collect();
            let ready = bridge.process(&q, &mut out, |x, y| {
                let rendered = transform_waveform(&SteadyVowel, &engine, x, sample_rate, &config)
                    .expect("valid config");
                y.copy_from_slice(&rendered);
            });
            if ready {
                heard += out.iter().map(|&s| (s as f64).abs()).sum::<f64>();
            }
        }

        assert_eq!(bridge.blocks_rendered(), 4);
        assert!(heard > 0.0);
    }
}
