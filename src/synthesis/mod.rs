//! Synthesis drivers: turn a transformed parameter set into a waveform.
//!
//! [`batch`] hands the whole set to the engine in one call; [`streaming`]
//! feeds frames one at a time and drains fixed-size chunks.

pub mod batch;
pub mod streaming;

pub use batch::synthesize_batch;
pub use streaming::{StreamReport, StreamState, StreamingSession};
