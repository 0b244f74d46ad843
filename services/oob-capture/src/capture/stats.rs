//! Capture session counters shared between the capture thread and main loop

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::oob::DecodeEvent;

/// Statistics for a capture session (atomic for thread-safe access)
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub samples_captured: AtomicU64,
    pub chunks_processed: AtomicU64,
    pub bytes_decoded: AtomicU64,
    pub packets_decoded: AtomicU64,
    pub bytes_rejected: AtomicU64,
    pub sync_acquired: AtomicU64,
    pub sync_lost: AtomicU64,
    pub restarts: AtomicU64,
    pub synchronized: AtomicBool,
}

impl CaptureStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_chunk(&self, samples: usize) {
        self.samples_captured.fetch_add(samples as u64, Ordering::Relaxed);
        self.chunks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, bytes: usize) {
        self.bytes_decoded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_event(&self, event: &DecodeEvent) {
        match event {
            DecodeEvent::SyncAcquired { .. } => {
                self.sync_acquired.fetch_add(1, Ordering::Relaxed);
                self.synchronized.store(true, Ordering::Relaxed);
            }
            DecodeEvent::SyncLost => {
                self.sync_lost.fetch_add(1, Ordering::Relaxed);
                self.synchronized.store(false, Ordering::Relaxed);
            }
            DecodeEvent::ByteRejected { .. } => {
                self.bytes_rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn set_packets(&self, packets: u64) {
        self.packets_decoded.store(packets, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples: self.samples_captured.load(Ordering::Relaxed),
            chunks: self.chunks_processed.load(Ordering::Relaxed),
            bytes: self.bytes_decoded.load(Ordering::Relaxed),
            packets: self.packets_decoded.load(Ordering::Relaxed),
            rejected: self.bytes_rejected.load(Ordering::Relaxed),
            sync_acquired: self.sync_acquired.load(Ordering::Relaxed),
            sync_lost: self.sync_lost.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            synchronized: self.is_synchronized(),
        }
    }
}

/// Point-in-time copy of [`CaptureStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub samples: u64,
    pub chunks: u64,
    pub bytes: u64,
    pub packets: u64,
    pub rejected: u64,
    pub sync_acquired: u64,
    pub sync_lost: u64,
    pub restarts: u64,
    pub synchronized: bool,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sync: {} | Samples: {} | Bytes: {} | Packets: {} | Rejected: {} | Resyncs: {}/{} | Restarts: {}",
            if self.synchronized { "OK" } else { "searching" },
            self.samples,
            self.bytes,
            self.packets,
            self.rejected,
            self.sync_acquired,
            self.sync_lost,
            self.restarts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_events() {
        let stats = CaptureStats::new();
        stats.record_event(&DecodeEvent::SyncAcquired { sync_byte: 0x47 });
        assert!(stats.is_synchronized());

        stats.record_event(&DecodeEvent::SyncLost);
        stats.record_event(&DecodeEvent::ByteRejected { byte: 0x12 });
        stats.record_event(&DecodeEvent::ByteRejected { byte: 0x24 });

        let snap = stats.snapshot();
        assert!(!snap.synchronized);
        assert_eq!(snap.sync_acquired, 1);
        assert_eq!(snap.sync_lost, 1);
        assert_eq!(snap.rejected, 2);
    }

    #[test]
    fn test_record_chunks() {
        let stats = CaptureStats::new();
        stats.record_chunk(100);
        stats.record_chunk(50);
        stats.record_bytes(7);
        stats.set_packets(3);

        let snap = stats.snapshot();
        assert_eq!(snap.samples, 150);
        assert_eq!(snap.chunks, 2);
        assert_eq!(snap.bytes, 7);
        assert_eq!(snap.packets, 3);
        assert!(snap.to_string().starts_with("Sync: searching"));
    }
}
