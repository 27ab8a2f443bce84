//! Reference vocoder: harmonic-plus-noise synthesis from frame parameters.
//!
//! Voiced frames are rendered as a bank of harmonics of F0 whose
//! amplitudes are read from the spectral envelope and attenuated by the
//! aperiodicity at each harmonic's bin. A noise component scaled by the
//! frame's mean aperiodic energy is added to every frame. Phase and the
//! noise generator carry across frames, so the batch and incremental
//! paths render the same frames into the same samples.

use std::collections::VecDeque;
use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::{IncrementalSynthesizer, SynthesizerConfig, VocoderEngine};
use crate::params::FrameParameterSet;

/// Deterministic harmonic-plus-noise vocoder.
#[derive(Debug, Clone)]
pub struct ReferenceVocoder {
    /// Seed for the noise excitation.
    pub seed: u32,
    /// Upper bound on rendered harmonics per voiced frame.
    pub max_harmonics: usize,
    /// Output gain.
    pub gain: f64,
}

impl Default for ReferenceVocoder {
    fn default() -> Self {
        ReferenceVocoder {
            seed: 0,
            max_harmonics: 64,
            gain: 0.1,
        }
    }
}

impl ReferenceVocoder {
    pub fn new(seed: u32) -> Self {
        ReferenceVocoder {
            seed,
            ..Default::default()
        }
    }

    fn renderer(&self, sample_rate: u32, frame_period_ms: f64, transform_size: usize) -> FrameRenderer {
        FrameRenderer {
            sample_rate: sample_rate as f64,
            samples_per_frame: frame_period_ms * sample_rate as f64 / 1000.0,
            transform_size,
            max_harmonics: self.max_harmonics,
            gain: self.gain,
            phase: 0.0,
            rng: create_rng(self.seed),
            frames_rendered: 0,
            samples_rendered: 0,
            amplitudes: Vec::with_capacity(self.max_harmonics),
        }
    }
}

impl VocoderEngine for ReferenceVocoder {
    type Synthesizer = ReferenceSynthesizer;

    fn synthesize(&self, params: &FrameParameterSet, output: &mut [f64]) {
        let mut renderer = self.renderer(
            params.sample_rate(),
            params.frame_period_ms(),
            params.transform_size(),
        );
        let mut cursor = 0;
        for frame in params.frames() {
            if cursor >= output.len() {
                break;
            }
            renderer.render_frame(frame.pitch, frame.envelope, frame.aperiodicity, |s| {
                if let Some(slot) = output.get_mut(cursor) {
                    *slot = s;
                }
                cursor += 1;
            });
        }
    }

    fn create_synthesizer(&self, config: &SynthesizerConfig) -> ReferenceSynthesizer {
        assert!(config.chunk_size > 0, "chunk size must be positive");
        assert!(config.look_ahead_depth > 0, "look-ahead depth must be positive");
        ReferenceSynthesizer {
            renderer: self.renderer(config.sample_rate, config.frame_period_ms, config.transform_size),
            queue: VecDeque::with_capacity(config.look_ahead_depth),
            depth: config.look_ahead_depth,
            spectral_width: config.transform_size / 2 + 1,
            pending: VecDeque::new(),
            chunk: Vec::with_capacity(config.chunk_size),
            chunk_size: config.chunk_size,
        }
    }
}

/// PCG32 seeded from a 32-bit value duplicated into both halves.
fn create_rng(seed: u32) -> Pcg32 {
    let seed64 = (seed as u64) | ((seed as u64) << 32);
    Pcg32::seed_from_u64(seed64)
}

/// Sequential frame renderer shared by both synthesis paths.
struct FrameRenderer {
    sample_rate: f64,
    samples_per_frame: f64,
    transform_size: usize,
    max_harmonics: usize,
    gain: f64,
    phase: f64,
    rng: Pcg32,
    frames_rendered: usize,
    samples_rendered: usize,
    amplitudes: Vec<f64>,
}

impl FrameRenderer {
    /// Emit the samples of the next frame. Frame `i` spans output samples
    /// `round(i * spf) .. round((i + 1) * spf)`.
    fn render_frame(&mut self, pitch: f64, envelope: &[f64], aperiodicity: &[f64], mut emit: impl FnMut(f64)) {
        let end = ((self.frames_rendered + 1) as f64 * self.samples_per_frame).round() as usize;
        let count = end.saturating_sub(self.samples_rendered);

        self.harmonic_amplitudes(pitch, envelope, aperiodicity);
        let noise_gain = envelope
            .iter()
            .zip(aperiodicity)
            .map(|(e, a)| e.sqrt() * a)
            .sum::<f64>()
            / envelope.len() as f64;
        let phase_inc = 2.0 * PI * pitch / self.sample_rate;

        for _ in 0..count {
            let mut periodic = 0.0;
            for (k, amp) in self.amplitudes.iter().enumerate() {
                periodic += amp * ((k + 1) as f64 * self.phase).sin();
            }
            let noise: f64 = self.rng.gen_range(-1.0..1.0);
            emit(self.gain * (periodic + noise * noise_gain));

            self.phase += phase_inc;
            if self.phase >= 2.0 * PI {
                self.phase -= 2.0 * PI;
            }
        }

        self.frames_rendered += 1;
        self.samples_rendered += count;
    }

    /// Fill `amplitudes` for a frame; empty when unvoiced.
    fn harmonic_amplitudes(&mut self, pitch: f64, envelope: &[f64], aperiodicity: &[f64]) {
        self.amplitudes.clear();
        if pitch <= 0.0 {
            return;
        }
        let nyquist = self.sample_rate / 2.0;
        let count = ((nyquist / pitch) as usize).min(self.max_harmonics);
        let last_bin = envelope.len() - 1;
        for k in 1..=count {
            let freq = k as f64 * pitch;
            let bin = ((freq * self.transform_size as f64 / self.sample_rate).round() as usize).min(last_bin);
            let periodic = (1.0 - aperiodicity[bin]).clamp(0.0, 1.0);
            self.amplitudes.push(envelope[bin].sqrt() * periodic);
        }
    }
}

struct QueuedFrame {
    pitch: f64,
    envelope: Vec<f64>,
    aperiodicity: Vec<f64>,
}

/// Incremental counterpart of [`ReferenceVocoder`].
///
/// Accepted frames wait in a queue of `look_ahead_depth` slots and are
/// rendered on demand when a chunk is drained. Rendering needs no future
/// frames, so a drain empties the queue as far as it must to fill a chunk.
/// The queue only fills, and feeding is only refused, while frames are fed
/// without draining in between.
pub struct ReferenceSynthesizer {
    renderer: FrameRenderer,
    queue: VecDeque<QueuedFrame>,
    depth: usize,
    spectral_width: usize,
    pending: VecDeque<f64>,
    chunk: Vec<f64>,
    chunk_size: usize,
}

impl ReferenceSynthesizer {
    /// Frames accepted but not yet rendered.
    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    /// Rendered samples not yet handed out in a chunk.
    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }
}

impl IncrementalSynthesizer for ReferenceSynthesizer {
    fn feed_frame(&mut self, pitch: f64, envelope: &[f64], aperiodicity: &[f64]) -> bool {
        assert_eq!(envelope.len(), self.spectral_width, "envelope row width");
        assert_eq!(aperiodicity.len(), self.spectral_width, "aperiodicity row width");
        if self.queue.len() >= self.depth {
            return false;
        }
        self.queue.push_back(QueuedFrame {
            pitch,
            envelope: envelope.to_vec(),
            aperiodicity: aperiodicity.to_vec(),
        });
        true
    }

    fn drain_chunk(&mut self) -> Option<&[f64]> {
        while self.pending.len() < self.chunk_size {
            let frame = self.queue.pop_front()?;
            let pending = &mut self.pending;
            self.renderer
                .render_frame(frame.pitch, &frame.envelope, &frame.aperiodicity, |s| pending.push_back(s));
        }
        self.chunk.clear();
        self.chunk.extend(self.pending.drain(..self.chunk_size));
        Some(self.chunk.as_slice())
    }

    fn is_locked(&self) -> bool {
        self.queue.len() >= self.depth && self.pending.len() < self.chunk_size
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voiced_set(frames: usize) -> FrameParameterSet {
        let mut p = FrameParameterSet::new(16000, 5.0, 256, frames);
        for i in 0..frames {
            p.pitch_mut()[i] = if i % 5 == 4 { 0.0 } else { 120.0 + 2.0 * i as f64 };
            for v in p.aperiodicity_mut(i).iter_mut() {
                *v = 0.1;
            }
        }
        p
    }

    #[test]
    fn batch_fills_duration_and_is_not_silent() {
        let p = voiced_set(10);
        let mut out = vec![0.0; p.duration_samples()];
        ReferenceVocoder::default().synthesize(&p, &mut out);
        assert!(out.iter().any(|&s| s.abs() > 1e-3));
        assert!(out.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn batch_is_deterministic_per_seed() {
        let p = voiced_set(6);
        let mut a = vec![0.0; p.duration_samples()];
        let mut b = vec![0.0; p.duration_samples()];
        let mut c = vec![0.0; p.duration_samples()];
        ReferenceVocoder::new(7).synthesize(&p, &mut a);
        ReferenceVocoder::new(7).synthesize(&p, &mut b);
        ReferenceVocoder::new(8).synthesize(&p, &mut c);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn batch_short_buffer_is_truncated() {
        let p = voiced_set(4);
        let mut full = vec![0.0; p.duration_samples()];
        let mut short = vec![0.0; 100];
        let engine = ReferenceVocoder::default();
        engine.synthesize(&p, &mut full);
        engine.synthesize(&p, &mut short);
        assert_eq!(&full[..100], &short[..]);
    }

    #[test]
    fn queue_refuses_past_depth() {
        let p = voiced_set(3);
        let engine = ReferenceVocoder::default();
        let mut synth = engine.create_synthesizer(&SynthesizerConfig::for_params(&p, 64, 2));
        let f = p.frame(0);
        assert!(synth.feed_frame(f.pitch, f.envelope, f.aperiodicity));
        assert!(synth.feed_frame(f.pitch, f.envelope, f.aperiodicity));
        assert!(!synth.feed_frame(f.pitch, f.envelope, f.aperiodicity));
        assert_eq!(synth.queued_frames(), 2);
        assert!(synth.is_locked());

        // 160 samples rendered from two frames: two chunks, 32 left over.
        assert!(synth.drain_chunk().is_some());
        assert!(synth.drain_chunk().is_some());
        assert!(synth.drain_chunk().is_none());
        assert_eq!(synth.pending_samples(), 32);
        assert!(!synth.is_locked());
    }

    #[test]
    fn silent_envelope_without_noise_is_silent() {
        let mut p = FrameParameterSet::new(8000, 10.0, 64, 2);
        for i in 0..2 {
            p.pitch_mut()[i] = 200.0;
            for v in p.envelope_mut(i).iter_mut() {
                *v = 1e-300;
            }
            for v in p.aperiodicity_mut(i).iter_mut() {
                *v = 0.0;
            }
        }
        let mut out = vec![0.0; p.duration_samples()];
        ReferenceVocoder::default().synthesize(&p, &mut out);
        assert!(out.iter().all(|s| s.abs() < 1e-100));
    }
}
