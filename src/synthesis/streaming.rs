//! Streaming Synthesis Driver: feed/drain loop over an incremental synthesizer.
//!
//! Each cycle offers the next frame to the synthesizer, drains every chunk
//! it has ready, then checks the lock flag. A rejected frame is offered
//! again on the next cycle. Chunks are delivered at offsets
//! `0, chunk_size, 2 * chunk_size, ...` with no gaps.
//!
//! ```text
//! Idle -> Feeding -> Draining -> Feeding ... -> Finished
//!                        \-> Locked -> Finished
//! ```

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::engine::{IncrementalSynthesizer, SynthesizerConfig, VocoderEngine};
use crate::error::{Result, VoiceError};
use crate::params::FrameParameterSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Synthesizer created, nothing fed yet.
    Idle,
    /// Offering the frame at the cursor.
    Feeding,
    /// Pulling ready chunks.
    Draining,
    /// The engine reported a lock; the next step finishes the session.
    Locked,
    Finished,
}

/// Outcome of a streaming session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamReport {
    pub frame_count: usize,
    /// Frames the synthesizer accepted.
    pub frames_fed: usize,
    pub produced_samples: usize,
    pub chunks: usize,
    /// Feed attempts refused because the synthesizer was full.
    pub rejections: usize,
    /// The session stopped on a lock.
    pub locked: bool,
}

impl StreamReport {
    /// Every frame reached the synthesizer.
    pub fn is_complete(&self) -> bool {
        self.frames_fed == self.frame_count
    }
}

/// One streaming session. Owns the synthesizer and releases it when
/// dropped, whichever way the session ends.
pub struct StreamingSession<S: IncrementalSynthesizer> {
    synth: S,
    state: StreamState,
    next_frame_index: usize,
    chunk_size: usize,
    produced_sample_count: usize,
    chunks: usize,
    rejections: usize,
    locked: bool,
}

impl<S: IncrementalSynthesizer> StreamingSession<S> {
    /// Wrap an already created synthesizer.
    pub fn new(synth: S) -> Self {
        let chunk_size = synth.chunk_size();
        assert!(chunk_size > 0, "chunk size must be positive");
        StreamingSession {
            synth,
            state: StreamState::Idle,
            next_frame_index: 0,
            chunk_size,
            produced_sample_count: 0,
            chunks: 0,
            rejections: 0,
            locked: false,
        }
    }

    /// Create a synthesizer shaped for `params` and wrap it.
    pub fn open<E>(engine: &E, params: &FrameParameterSet, chunk_size: usize, look_ahead_depth: usize) -> Result<Self>
    where
        E: VocoderEngine<Synthesizer = S>,
    {
        if chunk_size == 0 {
            return Err(VoiceError::invalid("chunkSize", "must be at least 1"));
        }
        if look_ahead_depth == 0 {
            return Err(VoiceError::invalid("lookAheadDepth", "must be at least 1"));
        }
        debug!(
            frames = params.frame_count(),
            chunk_size,
            look_ahead_depth,
            "opening streaming session"
        );
        let config = SynthesizerConfig::for_params(params, chunk_size, look_ahead_depth);
        Ok(Self::new(engine.create_synthesizer(&config)))
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn next_frame_index(&self) -> usize {
        self.next_frame_index
    }

    pub fn produced_sample_count(&self) -> usize {
        self.produced_sample_count
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn synthesizer(&self) -> &S {
        &self.synth
    }

    /// Run one feed/drain cycle, passing each drained chunk to `sink`
    /// together with its output offset. Returns the state after the cycle.
    pub fn step<F>(&mut self, params: &FrameParameterSet, sink: &mut F) -> Result<StreamState>
    where
        F: FnMut(usize, &[f64]),
    {
        match self.state {
            StreamState::Finished => return Ok(StreamState::Finished),
            StreamState::Locked => {
                self.finish(params);
                return Ok(self.state);
            }
            _ => {}
        }
        if self.next_frame_index >= params.frame_count() {
            self.finish(params);
            return Ok(self.state);
        }

        self.state = StreamState::Feeding;
        let frame = params.frame(self.next_frame_index);
        let accepted = self.synth.feed_frame(frame.pitch, frame.envelope, frame.aperiodicity);
        if accepted {
            self.next_frame_index += 1;
        } else {
            self.rejections += 1;
            trace!(frame = frame.index, "synthesizer full");
        }

        self.state = StreamState::Draining;
        let mut drained = 0;
        while let Some(chunk) = self.synth.drain_chunk() {
            assert_eq!(chunk.len(), self.chunk_size, "synthesizer returned a short chunk");
            trace!(offset = self.produced_sample_count, "chunk");
            sink(self.produced_sample_count, chunk);
            self.produced_sample_count += self.chunk_size;
            self.chunks += 1;
            drained += 1;
        }

        if self.synth.is_locked() {
            self.locked = true;
            self.state = StreamState::Locked;
            if self.next_frame_index < params.frame_count() {
                warn!(
                    fed = self.next_frame_index,
                    frames = params.frame_count(),
                    "synthesizer locked before all frames were fed"
                );
            }
            return Ok(self.state);
        }

        if !accepted && drained == 0 {
            return Err(VoiceError::EngineStalled {
                frame_index: self.next_frame_index,
            });
        }

        if self.next_frame_index == params.frame_count() {
            self.finish(params);
        } else {
            self.state = StreamState::Feeding;
        }
        Ok(self.state)
    }

    /// Drive the session to `Finished`, handing every chunk to `sink`.
    pub fn run_with<F>(mut self, params: &FrameParameterSet, mut sink: F) -> Result<StreamReport>
    where
        F: FnMut(usize, &[f64]),
    {
        while self.step(params, &mut sink)? != StreamState::Finished {}
        Ok(self.report(params))
    }

    /// Drive the session to `Finished`, writing chunks into `output`.
    ///
    /// # Panics
    /// If `output` is too short for a drained chunk. Size it with
    /// [`required_output_len`].
    pub fn run(self, params: &FrameParameterSet, output: &mut [f64]) -> Result<StreamReport> {
        self.run_with(params, |offset, chunk| {
            output[offset..offset + chunk.len()].copy_from_slice(chunk);
        })
    }

    pub fn report(&self, params: &FrameParameterSet) -> StreamReport {
        StreamReport {
            frame_count: params.frame_count(),
            frames_fed: self.next_frame_index,
            produced_samples: self.produced_sample_count,
            chunks: self.chunks,
            rejections: self.rejections,
            locked: self.locked,
        }
    }

    fn finish(&mut self, params: &FrameParameterSet) {
        if self.state != StreamState::Finished {
            debug!(
                fed = self.next_frame_index,
                frames = params.frame_count(),
                produced = self.produced_sample_count,
                locked = self.locked,
                "streaming session finished"
            );
        }
        self.state = StreamState::Finished;
    }
}

/// Output length that is always large enough for [`StreamingSession::run`]:
/// every frame's samples rounded up to whole chunks.
pub fn required_output_len(params: &FrameParameterSet, chunk_size: usize) -> usize {
    params.duration_samples().div_ceil(chunk_size) * chunk_size + chunk_size
}

/// Stream `params` through a fresh synthesizer into a growing buffer.
pub fn stream_to_vec<E: VocoderEngine>(
    engine: &E,
    params: &FrameParameterSet,
    chunk_size: usize,
    look_ahead_depth: usize,
) -> Result<(Vec<f64>, StreamReport)> {
    let session = StreamingSession::open(engine, params, chunk_size, look_ahead_depth)?;
    let mut output = Vec::with_capacity(params.duration_samples());
    let report = session.run_with(params, |offset, chunk| {
        debug_assert_eq!(offset, output.len());
        output.extend_from_slice(chunk);
    })?;
    Ok((output, report))
}
