//! Real-time block bridge between an audio callback and the transformer.
//!
//! The audio callback delivers fixed render quanta of 128 samples. They
//! are written into an input ring of 512 quanta. Each time half the ring
//! (256 quanta) has filled, a render is requested: that half is handed to
//! a block transform and the result lands in the same half of the output
//! ring. Output is read back once a full ring of input has been written,
//! so the bridge adds one ring of latency.

/// Samples per audio callback.
pub const RENDER_QUANTUM: usize = 128;
/// Ring capacity in quanta.
pub const RING_LENGTH: usize = 512;
/// Quanta per transformed block.
pub const BLOCK_QUANTA: usize = RING_LENGTH / 2;
/// Samples per transformed block.
pub const BLOCK_SAMPLES: usize = BLOCK_QUANTA * RENDER_QUANTUM;

#[derive(Debug, Clone)]
pub struct RingBufferBridge {
    input: Vec<f64>,
    output: Vec<f64>,
    /// Quanta written so far.
    input_index: usize,
    /// Quanta read so far.
    output_index: usize,
    blocks_rendered: usize,
    render_requested: bool,
}

impl Default for RingBufferBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl RingBufferBridge {
    pub fn new() -> Self {
        RingBufferBridge {
            input: vec![0.0; RING_LENGTH * RENDER_QUANTUM],
            output: vec![0.0; RING_LENGTH * RENDER_QUANTUM],
            input_index: 0,
            output_index: 0,
            blocks_rendered: 0,
            render_requested: false,
        }
    }

    pub fn input_index(&self) -> usize {
        self.input_index
    }

    pub fn output_index(&self) -> usize {
        self.output_index
    }

    pub fn blocks_rendered(&self) -> usize {
        self.blocks_rendered
    }

    pub fn render_requested(&self) -> bool {
        self.render_requested
    }

    /// Output is available once one full ring of input has been written.
    pub fn output_ready(&self) -> bool {
        self.input_index >= RING_LENGTH
    }

    /// Store one render quantum. Returns `true` when this quantum completed
    /// a block and a render is now due.
    ///
    /// # Panics
    /// If `quantum` is not exactly [`RENDER_QUANTUM`] samples.
    pub fn push_quantum(&mut self, quantum: &[f32]) -> bool {
        assert_eq!(quantum.len(), RENDER_QUANTUM, "render quantum length");
        let offset = (self.input_index % RING_LENGTH) * RENDER_QUANTUM;
        for (dst, &s) in self.input[offset..offset + RENDER_QUANTUM].iter_mut().zip(quantum) {
            *dst = s as f64;
        }
        self.input_index += 1;
        if self.input_index % BLOCK_QUANTA == 0 {
            self.render_requested = true;
        }
        self.render_requested
    }

    /// Run `transform` on the pending block, if any.
    ///
    /// `transform` receives [`BLOCK_SAMPLES`] input samples and must fill
    /// the same number of output samples.
    pub fn render_pending<F>(&mut self, transform: F) -> bool
    where
        F: FnOnce(&[f64], &mut [f64]),
    {
        if !self.render_requested {
            return false;
        }
        let offset = (self.blocks_rendered % 2) * BLOCK_SAMPLES;
        let range = offset..offset + BLOCK_SAMPLES;
        transform(&self.input[range.clone()], &mut self.output[range]);
        self.blocks_rendered += 1;
        self.render_requested = false;
        true
    }

    /// Copy the pending block straight through.
    pub fn pass_through(&mut self) -> bool {
        self.render_pending(|x, y| y.copy_from_slice(x))
    }

    /// Read the next output quantum. Writes silence and returns `false`
    /// until output is ready.
    ///
    /// # Panics
    /// If `quantum` is not exactly [`RENDER_QUANTUM`] samples.
    pub fn pull_quantum(&mut self, quantum: &mut [f32]) -> bool {
        assert_eq!(quantum.len(), RENDER_QUANTUM, "render quantum length");
        if !self.output_ready() {
            quantum.fill(0.0);
            return false;
        }
        let offset = (self.output_index % RING_LENGTH) * RENDER_QUANTUM;
        for (dst, &s) in quantum.iter_mut().zip(&self.output[offset..offset + RENDER_QUANTUM]) {
            *dst = s as f32;
        }
        self.output_index += 1;
        true
    }

    /// One audio callback: store input, render if due, read output.
    pub fn process<F>(&mut self, input: &[f32], output: &mut [f32], transform: F) -> bool
    where
        F: FnOnce(&[f64], &mut [f64]),
    {
        if self.push_quantum(input) {
            self.render_pending(transform);
        }
        self.pull_quantum(output)
    }
}
