//! Output side of the decoder

use super::types::DecodeEvent;

/// Receives accepted transport-stream bytes and diagnostic events
pub trait DecodeSink {
    fn on_byte(&mut self, byte: u8);

    fn on_event(&mut self, _event: DecodeEvent) {}
}

/// Collects bytes only; events are discarded
impl DecodeSink for Vec<u8> {
    fn on_byte(&mut self, byte: u8) {
        self.push(byte);
    }
}
