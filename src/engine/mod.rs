//! Vocoder engine contract.
//!
//! Analysis and the synthesis kernels live behind these traits. The
//! drivers in [`crate::synthesis`] only ever talk to an engine through
//! them; [`reference::ReferenceVocoder`] is the built-in implementation.

pub mod reference;

use crate::params::FrameParameterSet;

/// Settings an incremental synthesizer is created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesizerConfig {
    pub sample_rate: u32,
    pub frame_period_ms: f64,
    pub transform_size: usize,
    /// Samples handed out per drained chunk.
    pub chunk_size: usize,
    /// Frames the synthesizer may hold before it refuses input.
    pub look_ahead_depth: usize,
}

impl SynthesizerConfig {
    /// Take the shape metadata from `params`.
    pub fn for_params(params: &FrameParameterSet, chunk_size: usize, look_ahead_depth: usize) -> Self {
        SynthesizerConfig {
            sample_rate: params.sample_rate(),
            frame_period_ms: params.frame_period_ms(),
            transform_size: params.transform_size(),
            chunk_size,
            look_ahead_depth,
        }
    }
}

/// A synthesizer fed one frame at a time and drained in fixed-size chunks.
///
/// Dropping the value releases the engine-side instance.
pub trait IncrementalSynthesizer {
    /// Offer a frame. Returns `false` when the internal buffer is full and
    /// the frame was not taken.
    fn feed_frame(&mut self, pitch: f64, envelope: &[f64], aperiodicity: &[f64]) -> bool;

    /// Produce the next chunk if enough input is buffered for it.
    fn drain_chunk(&mut self) -> Option<&[f64]>;

    /// The synthesizer can neither take frames nor make progress on its own.
    fn is_locked(&self) -> bool;

    fn chunk_size(&self) -> usize;
}

/// Analysis stage: decomposes a waveform into frame parameters.
pub trait Analyzer {
    fn analyze(&self, x: &[f64], sample_rate: u32, frame_period_ms: f64) -> FrameParameterSet;
}

/// Batch and incremental synthesis entry points of a vocoder.
pub trait VocoderEngine {
    type Synthesizer: IncrementalSynthesizer;

    /// Render every frame of `params` into `output`.
    ///
    /// `output` arrives zeroed; samples past its end are dropped and any
    /// tail the engine does not reach stays silent.
    fn synthesize(&self, params: &FrameParameterSet, output: &mut [f64]);

    fn create_synthesizer(&self, config: &SynthesizerConfig) -> Self::Synthesizer;
}
