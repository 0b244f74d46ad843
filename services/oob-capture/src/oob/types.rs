//! OOB transport-stream data types

use thiserror::Error;

/// Transport packet length including FEC bytes
pub const PACKET_LEN: usize = 192;

/// Leading byte of every packet. The stream randomization alternates
/// between these two values.
pub const SYNC_BYTES: [u8; 2] = [0x47, 0x64];

/// Default DRX mask (channel 0)
pub const DEFAULT_DRX_MASK: u16 = 0x01;

/// Default CRX mask (channel 1)
pub const DEFAULT_CRX_MASK: u16 = 0x02;

/// Returns true if `byte` is one of the recognized sync values
pub fn is_sync_byte(byte: u8) -> bool {
    SYNC_BYTES.contains(&byte)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{0} mask must select at least one channel")]
    EmptyMask(&'static str),
    #[error("DRX mask {drx:#06x} overlaps CRX mask {crx:#06x}")]
    OverlappingMasks { drx: u16, crx: u16 },
}

/// Bits of a sample carrying the DRX (data) and CRX (strobe) lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMasks {
    drx: u16,
    crx: u16,
}

impl ChannelMasks {
    pub fn new(drx: u16, crx: u16) -> Result<Self, DecodeError> {
        if drx == 0 {
            return Err(DecodeError::EmptyMask("DRX"));
        }
        if crx == 0 {
            return Err(DecodeError::EmptyMask("CRX"));
        }
        if drx & crx != 0 {
            return Err(DecodeError::OverlappingMasks { drx, crx });
        }
        Ok(Self { drx, crx })
    }

    /// Masks for single channel indices (bit n = channel n)
    pub fn from_channels(drx_channel: u8, crx_channel: u8) -> Result<Self, DecodeError> {
        let bit = |ch: u8| 1u16.checked_shl(ch as u32).unwrap_or(0);
        Self::new(bit(drx_channel), bit(crx_channel))
    }

    pub fn drx(&self) -> u16 {
        self.drx
    }

    pub fn crx(&self) -> u16 {
        self.crx
    }
}

impl Default for ChannelMasks {
    fn default() -> Self {
        Self {
            drx: DEFAULT_DRX_MASK,
            crx: DEFAULT_CRX_MASK,
        }
    }
}

/// CRX latch. Data on DRX is valid on the Asserted -> Idle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrobeState {
    #[default]
    Idle,
    Asserted,
}

/// Packet synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Unsynchronized,
    /// `cursor` is the index of the next byte within the packet (0..192).
    /// Zero means a sync byte is expected next.
    Synchronized { cursor: usize },
}

impl SyncState {
    pub fn is_synchronized(&self) -> bool {
        matches!(self, SyncState::Synchronized { .. })
    }
}

/// Diagnostic events raised while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeEvent {
    /// Entered sync on the given sync byte
    SyncAcquired { sync_byte: u8 },
    /// Expected a sync byte while synchronized and did not get one
    SyncLost,
    /// A completed byte failed the sync check; one bit was dropped
    ByteRejected { byte: u8 },
}

/// Decoder counters
#[derive(Debug, Default, Clone)]
pub struct DecoderStats {
    pub samples_processed: u64,
    pub bits_received: u64,
    pub bytes_emitted: u64,
    pub packets_completed: u64,
    pub bytes_rejected: u64,
    pub sync_acquired: u64,
    pub sync_lost: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_bytes() {
        assert!(is_sync_byte(0x47));
        assert!(is_sync_byte(0x64));
        assert!(!is_sync_byte(0x00));
        assert!(!is_sync_byte(0xB8)); // inverted 0x47
    }

    #[test]
    fn test_masks_reject_empty() {
        assert_eq!(ChannelMasks::new(0, 0x02), Err(DecodeError::EmptyMask("DRX")));
        assert_eq!(ChannelMasks::new(0x01, 0), Err(DecodeError::EmptyMask("CRX")));
    }

    #[test]
    fn test_masks_reject_overlap() {
        assert!(matches!(
            ChannelMasks::new(0x03, 0x02),
            Err(DecodeError::OverlappingMasks { .. })
        ));
        assert!(ChannelMasks::from_channels(4, 4).is_err());
    }

    #[test]
    fn test_masks_from_channels() {
        let masks = ChannelMasks::from_channels(0, 1).unwrap();
        assert_eq!(masks, ChannelMasks::default());

        let wide = ChannelMasks::from_channels(9, 15).unwrap();
        assert_eq!(wide.drx(), 0x0200);
        assert_eq!(wide.crx(), 0x8000);

        // Out of range channel yields an empty mask
        assert_eq!(
            ChannelMasks::from_channels(16, 1),
            Err(DecodeError::EmptyMask("DRX"))
        );
    }
}
