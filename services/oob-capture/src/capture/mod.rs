//! Logic-analyser capture and OOB decoding pipeline
//!
//! 1. Stream raw logic samples (sigrok-cli binary output or a replay file)
//! 2. Reassemble 8- or 16-bit samples
//! 3. Recover bits on CRX falling edges, assemble bytes
//! 4. Track 192-byte packet sync, emit aligned transport-stream bytes

mod format;
pub mod source;
mod stats;

pub use format::SampleFormat;
pub use source::{CaptureConfig, CaptureSource, LogicCapture};
