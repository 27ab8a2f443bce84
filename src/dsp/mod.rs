//! DSP helpers: numeric primitives and real-time buffering.
//!
//! The same code backs the WebAudio path (AudioWorklet + WASM) and native
//! offline rendering.

pub mod interp;
pub mod ring_buffer;
