//! CRX/DRX bit recovery and transport packet synchronization
//!
//! Data on DRX is valid on the falling edge of CRX. Bits are shifted in
//! MSB-first; every completed byte is checked against the packet structure:
//!
//! - Synchronized, mid-packet: byte is emitted, cursor advances, wraps at 192
//! - Sync byte expected (or unsynchronized): 0x47/0x64 is emitted and starts
//!   a packet, anything else drops one bit and retries on the next bit

use super::sink::DecodeSink;
use super::types::{
    is_sync_byte, ChannelMasks, DecodeEvent, DecoderStats, StrobeState, SyncState, PACKET_LEN,
};

/// Streaming OOB decoder. One instance per capture session; all state
/// survives between `feed` calls.
pub struct OobDecoder {
    masks: ChannelMasks,
    strobe: StrobeState,
    /// Byte being received
    input_byte: u8,
    /// Bits received into `input_byte` (0-7)
    bit_count: u8,
    sync: SyncState,
    /// Statistics
    pub stats: DecoderStats,
}

impl OobDecoder {
    pub fn new(masks: ChannelMasks) -> Self {
        Self {
            masks,
            strobe: StrobeState::Idle,
            input_byte: 0,
            bit_count: 0,
            sync: SyncState::Unsynchronized,
            stats: DecoderStats::default(),
        }
    }

    /// Process a chunk of samples, pushing accepted bytes and events to `sink`
    pub fn feed<S, K>(&mut self, samples: &[S], sink: &mut K)
    where
        S: Copy + Into<u16>,
        K: DecodeSink + ?Sized,
    {
        let crx_mask = self.masks.crx();
        let drx_mask = self.masks.drx();

        for &sample in samples {
            let level: u16 = sample.into();
            let crx = level & crx_mask != 0;

            match (crx, self.strobe) {
                (true, StrobeState::Idle) => {
                    self.strobe = StrobeState::Asserted;
                }
                (false, StrobeState::Asserted) => {
                    self.strobe = StrobeState::Idle;
                    self.push_bit(level & drx_mask != 0, sink);
                }
                _ => {}
            }
        }

        self.stats.samples_processed += samples.len() as u64;
    }

    fn push_bit<K: DecodeSink + ?Sized>(&mut self, bit: bool, sink: &mut K) {
        self.stats.bits_received += 1;
        self.input_byte = (self.input_byte << 1) | bit as u8;
        self.bit_count += 1;

        if self.bit_count > 7 {
            self.complete_byte(sink);
        }
    }

    fn complete_byte<K: DecodeSink + ?Sized>(&mut self, sink: &mut K) {
        let byte = self.input_byte;

        match self.sync {
            SyncState::Synchronized { cursor } if cursor != 0 => {
                sink.on_byte(byte);
                self.stats.bytes_emitted += 1;

                let next = cursor + 1;
                self.sync = if next >= PACKET_LEN {
                    self.stats.packets_completed += 1;
                    SyncState::Synchronized { cursor: 0 }
                } else {
                    SyncState::Synchronized { cursor: next }
                };
            }
            _ if is_sync_byte(byte) => {
                sink.on_byte(byte);
                self.stats.bytes_emitted += 1;

                if !self.sync.is_synchronized() {
                    self.stats.sync_acquired += 1;
                    sink.on_event(DecodeEvent::SyncAcquired { sync_byte: byte });
                }
                self.sync = SyncState::Synchronized { cursor: 1 };
            }
            _ => {
                // Drop the oldest bit: the low 7 bits start the next byte
                self.input_byte = byte & 0x7F;
                self.bit_count = 7;

                if self.sync.is_synchronized() {
                    self.stats.sync_lost += 1;
                    sink.on_event(DecodeEvent::SyncLost);
                }
                self.sync = SyncState::Unsynchronized;

                self.stats.bytes_rejected += 1;
                sink.on_event(DecodeEvent::ByteRejected { byte });
                return;
            }
        }

        self.input_byte = 0;
        self.bit_count = 0;
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync
    }

    pub fn is_synchronized(&self) -> bool {
        self.sync.is_synchronized()
    }
}

impl Default for OobDecoder {
    fn default() -> Self {
        Self::new(ChannelMasks::default())
    }
}
