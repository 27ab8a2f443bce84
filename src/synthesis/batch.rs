//! Batch Synthesis Driver.

use tracing::debug;

use crate::engine::VocoderEngine;
use crate::params::FrameParameterSet;

/// Render `params` into a fresh waveform of exactly `output_len` samples.
///
/// The buffer is zeroed before the engine writes, so anything the engine
/// does not reach is silence.
pub fn synthesize_batch<E: VocoderEngine>(engine: &E, params: &FrameParameterSet, output_len: usize) -> Vec<f64> {
    debug!(frames = params.frame_count(), output_len, "batch synthesis");
    let mut output = vec![0.0; output_len];
    engine.synthesize(params, &mut output);
    output
}
