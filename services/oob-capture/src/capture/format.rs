//! Raw logic-analyser sample formats
//!
//! 8-channel analysers emit one byte per sample, 16-channel analysers two
//! bytes (little-endian). Bit n of a sample is channel n.

/// Sample layout of the capture stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Logic8,
    Logic16,
}

impl SampleFormat {
    /// Format for a sample width in bytes
    pub fn from_width(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(Self::Logic8),
            2 => Some(Self::Logic16),
            _ => None,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Logic8 => 1,
            Self::Logic16 => 2,
        }
    }

    pub fn channels(&self) -> u32 {
        self.bytes_per_sample() as u32 * 8
    }
}

/// Reassembles 16-bit samples from arbitrary reads, carrying a split
/// sample over to the next read
#[derive(Debug, Default)]
pub struct SampleAssembler {
    pending: Option<u8>,
}

impl SampleAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the complete samples in `raw` to `out`
    pub fn push(&mut self, raw: &[u8], out: &mut Vec<u16>) {
        let mut rest = raw;

        if let Some(low) = self.pending.take() {
            match rest.split_first() {
                Some((&high, tail)) => {
                    out.push(u16::from_le_bytes([low, high]));
                    rest = tail;
                }
                None => {
                    self.pending = Some(low);
                    return;
                }
            }
        }

        let mut pairs = rest.chunks_exact(2);
        out.extend(pairs.by_ref().map(|p| u16::from_le_bytes([p[0], p[1]])));
        self.pending = pairs.remainder().first().copied();
    }

    /// True if half a sample is waiting for its second byte
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_width() {
        assert_eq!(SampleFormat::from_width(1), Some(SampleFormat::Logic8));
        assert_eq!(SampleFormat::from_width(2), Some(SampleFormat::Logic16));
        assert_eq!(SampleFormat::from_width(0), None);
        assert_eq!(SampleFormat::from_width(4), None);
        assert_eq!(SampleFormat::Logic16.channels(), 16);
    }

    #[test]
    fn test_assembler_little_endian() {
        let mut asm = SampleAssembler::new();
        let mut out = Vec::new();
        asm.push(&[0x02, 0x80, 0x01, 0x00], &mut out);
        assert_eq!(out, vec![0x8002, 0x0001]);
        assert!(!asm.has_pending());
    }

    #[test]
    fn test_assembler_split_reads() {
        let raw: Vec<u8> = (0u8..=40).collect();

        let mut whole = Vec::new();
        SampleAssembler::new().push(&raw, &mut whole);
        assert_eq!(whole.len(), 20);

        for split in [1, 3, 7] {
            let mut asm = SampleAssembler::new();
            let mut out = Vec::new();
            for chunk in raw.chunks(split) {
                asm.push(chunk, &mut out);
            }
            assert_eq!(out, whole, "split size {}", split);
            // 41 bytes: the last byte is still waiting
            assert!(asm.has_pending());
        }
    }

    #[test]
    fn test_assembler_empty_read_keeps_pending() {
        let mut asm = SampleAssembler::new();
        let mut out = Vec::new();
        asm.push(&[0x34], &mut out);
        asm.push(&[], &mut out);
        assert!(out.is_empty());
        asm.push(&[0x12], &mut out);
        assert_eq!(out, vec![0x1234]);
    }
}
