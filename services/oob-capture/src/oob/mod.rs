//! OOB transport-stream decoding module

mod decoder;
mod sink;
mod types;

pub use decoder::OobDecoder;
pub use sink::DecodeSink;
pub use types::{ChannelMasks, DecodeError, DecodeEvent};
