//! Frame Parameter Store: per-frame vocoder parameters for one utterance.
//!
//! Holds the pitch contour, the spectral envelope matrix and the
//! aperiodicity matrix produced by analysis, together with the metadata
//! that fixes their shape (sample rate, frame period, transform size).
//! Rows are stored contiguously; every row is `transform_size / 2 + 1`
//! bins wide. Indexing outside the allocated shape panics.

use std::ops::Range;

use crate::error::{Result, VoiceError};

/// Number of analysis frames a signal of `x_len` samples yields.
///
/// One frame sits at t = 0 and one more every `frame_period_ms`.
pub fn frame_count_for_length(sample_rate: u32, x_len: usize, frame_period_ms: f64) -> usize {
    assert!(sample_rate > 0, "sample rate must be positive");
    (1000.0 * x_len as f64 / sample_rate as f64 / frame_period_ms) as usize + 1
}

/// Frame period (ms) that makes one frame span exactly `block_len` samples.
pub fn frame_period_for_block(block_len: usize, sample_rate: u32) -> f64 {
    block_len as f64 / sample_rate as f64 * 1000.0
}

/// Smallest power-of-two transform length whose window covers three
/// periods of `f0_floor`.
///
/// # Panics
/// If the length does not fit in `usize`. Floors of at least
/// [`MIN_F0_FLOOR`] always fit.
pub fn transform_size_for_f0_floor(sample_rate: u32, f0_floor: f64) -> usize {
    let periods = 3.0 * sample_rate as f64 / f0_floor + 1.0;
    let exponent = 1 + periods.log2().floor() as u32;
    1usize
        .checked_shl(exponent)
        .unwrap_or_else(|| panic!("f0 floor {f0_floor} Hz too low for {sample_rate} Hz"))
}

/// Lowest F0 floor (Hz) accepted by configuration.
pub const MIN_F0_FLOOR: f64 = 1.0;

/// Borrowed view of one frame: pitch plus its two spectral rows.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub index: usize,
    /// F0 in Hz, 0 for unvoiced.
    pub pitch: f64,
    pub envelope: &'a [f64],
    pub aperiodicity: &'a [f64],
}

impl FrameView<'_> {
    pub fn is_voiced(&self) -> bool {
        self.pitch > 0.0
    }
}

/// Pitch, spectral envelope and aperiodicity for every analysis frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameParameterSet {
    sample_rate: u32,
    frame_period_ms: f64,
    transform_size: usize,
    pitch: Vec<f64>,
    envelope: Vec<f64>,
    aperiodicity: Vec<f64>,
}

impl FrameParameterSet {
    /// Allocate a set of `frame_count` frames.
    ///
    /// Every frame starts unvoiced with a flat unit envelope and full
    /// aperiodicity; analysis overwrites the rows in place.
    ///
    /// # Panics
    /// If any dimension is zero, the transform size is odd, or the frame
    /// period is not a positive finite number.
    pub fn new(sample_rate: u32, frame_period_ms: f64, transform_size: usize, frame_count: usize) -> Self {
        assert!(sample_rate > 0, "sample rate must be positive");
        assert!(
            frame_period_ms.is_finite() && frame_period_ms > 0.0,
            "frame period must be positive, got {frame_period_ms}"
        );
        assert!(
            transform_size > 0 && transform_size % 2 == 0,
            "transform size must be positive and even, got {transform_size}"
        );
        assert!(frame_count > 0, "frame count must be positive");

        let width = transform_size / 2 + 1;
        FrameParameterSet {
            sample_rate,
            frame_period_ms,
            transform_size,
            pitch: vec![0.0; frame_count],
            envelope: vec![1.0; frame_count * width],
            aperiodicity: vec![1.0; frame_count * width],
        }
    }

    /// Build a set from analysis output, checking every shape and range.
    pub fn from_parts(
        sample_rate: u32,
        frame_period_ms: f64,
        transform_size: usize,
        pitch: Vec<f64>,
        envelope: Vec<Vec<f64>>,
        aperiodicity: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if sample_rate == 0 {
            return Err(VoiceError::invalid("sampleRate", "must be positive"));
        }
        if !(frame_period_ms.is_finite() && frame_period_ms > 0.0) {
            return Err(VoiceError::invalid(
                "framePeriodMs",
                format!("must be positive, got {frame_period_ms}"),
            ));
        }
        if transform_size == 0 || transform_size % 2 != 0 {
            return Err(VoiceError::invalid(
                "transformSize",
                format!("must be positive and even, got {transform_size}"),
            ));
        }
        if pitch.is_empty() {
            return Err(VoiceError::invalid("pitch", "at least one frame is required"));
        }

        let frame_count = pitch.len();
        let width = transform_size / 2 + 1;
        check_rows("envelope", &envelope, frame_count, width)?;
        check_rows("aperiodicity", &aperiodicity, frame_count, width)?;

        if let Some(f0) = pitch.iter().find(|f0| !(f0.is_finite() && **f0 >= 0.0)) {
            return Err(VoiceError::invalid("pitch", format!("must be non-negative, got {f0}")));
        }
        if let Some(v) = envelope.iter().flatten().find(|v| !(v.is_finite() && **v > 0.0)) {
            return Err(VoiceError::invalid("envelope", format!("must be positive, got {v}")));
        }
        if let Some(v) = aperiodicity.iter().flatten().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(VoiceError::invalid("aperiodicity", format!("must lie in [0, 1], got {v}")));
        }

        Ok(FrameParameterSet {
            sample_rate,
            frame_period_ms,
            transform_size,
            pitch,
            envelope: envelope.into_iter().flatten().collect(),
            aperiodicity: aperiodicity.into_iter().flatten().collect(),
        })
    }

    /// Build a set from row-major flattened matrices, as passed across an
    /// FFI boundary.
    pub fn from_flat(
        sample_rate: u32,
        frame_period_ms: f64,
        transform_size: usize,
        pitch: Vec<f64>,
        envelope: &[f64],
        aperiodicity: &[f64],
    ) -> Result<Self> {
        if transform_size == 0 || transform_size % 2 != 0 {
            return Err(VoiceError::invalid(
                "transformSize",
                format!("must be positive and even, got {transform_size}"),
            ));
        }
        let width = transform_size / 2 + 1;
        let rows = |flat: &[f64]| flat.chunks(width).map(<[f64]>::to_vec).collect::<Vec<_>>();
        Self::from_parts(
            sample_rate,
            frame_period_ms,
            transform_size,
            pitch,
            rows(envelope),
            rows(aperiodicity),
        )
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_period_ms(&self) -> f64 {
        self.frame_period_ms
    }

    pub fn transform_size(&self) -> usize {
        self.transform_size
    }

    pub fn frame_count(&self) -> usize {
        self.pitch.len()
    }

    /// Bins per envelope/aperiodicity row: `transform_size / 2 + 1`.
    pub fn spectral_width(&self) -> usize {
        self.transform_size / 2 + 1
    }

    pub fn pitch(&self) -> &[f64] {
        &self.pitch
    }

    pub fn pitch_mut(&mut self) -> &mut [f64] {
        &mut self.pitch
    }

    pub fn envelope(&self, frame: usize) -> &[f64] {
        let range = self.row_range(frame);
        &self.envelope[range]
    }

    pub fn envelope_mut(&mut self, frame: usize) -> &mut [f64] {
        let range = self.row_range(frame);
        &mut self.envelope[range]
    }

    pub fn aperiodicity(&self, frame: usize) -> &[f64] {
        let range = self.row_range(frame);
        &self.aperiodicity[range]
    }

    pub fn aperiodicity_mut(&mut self, frame: usize) -> &mut [f64] {
        let range = self.row_range(frame);
        &mut self.aperiodicity[range]
    }

    pub fn frame(&self, index: usize) -> FrameView<'_> {
        FrameView {
            index,
            pitch: self.pitch[index],
            envelope: self.envelope(index),
            aperiodicity: self.aperiodicity(index),
        }
    }

    pub fn frames(&self) -> impl Iterator<Item = FrameView<'_>> {
        (0..self.frame_count()).map(move |i| self.frame(i))
    }

    /// Frame centre times in seconds.
    pub fn time_axis(&self) -> Vec<f64> {
        (0..self.frame_count())
            .map(|i| i as f64 * self.frame_period_ms / 1000.0)
            .collect()
    }

    /// Output samples per frame; fractional when the period is not a
    /// whole number of samples.
    pub fn samples_per_frame(&self) -> f64 {
        self.frame_period_ms * self.sample_rate as f64 / 1000.0
    }

    /// First output sample belonging to frame `index`.
    pub fn frame_start_sample(&self, index: usize) -> usize {
        (index as f64 * self.samples_per_frame()).round() as usize
    }

    /// Length of the waveform all frames cover.
    pub fn duration_samples(&self) -> usize {
        self.frame_start_sample(self.frame_count())
    }

    fn row_range(&self, frame: usize) -> Range<usize> {
        assert!(
            frame < self.frame_count(),
            "frame index {frame} out of range (frame count {})",
            self.frame_count()
        );
        let width = self.spectral_width();
        frame * width..(frame + 1) * width
    }
}

fn check_rows(what: &'static str, rows: &[Vec<f64>], frame_count: usize, width: usize) -> Result<()> {
    if rows.len() != frame_count {
        return Err(VoiceError::ShapeMismatch {
            what,
            expected: frame_count,
            found: rows.len(),
        });
    }
    if let Some(row) = rows.iter().find(|r| r.len() != width) {
        return Err(VoiceError::ShapeMismatch {
            what,
            expected: width,
            found: row.len(),
        });
    }
    Ok(())
}
